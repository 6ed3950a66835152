use std::io::{self, Read, Write};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::error::Error;

/// Let a human choose one of `items`, returning its index.
pub trait Picker {
    fn choose(&self, items: &[String]) -> Result<usize>;
}

/// Picker backed by an external fuzzy finder (`fzf` by default): candidates
/// go in on stdin, one per line, the chosen line comes back on stdout.
pub struct FzfPicker {
    program: String,
}

impl FzfPicker {
    pub fn new<S: Into<String>>(program: S) -> FzfPicker {
        FzfPicker {
            program: program.into(),
        }
    }
}

impl Picker for FzfPicker {
    fn choose(&self, items: &[String]) -> Result<usize> {
        let mut input = String::with_capacity(items.len());
        for item in items {
            input.push_str(item);
            input.push('\n');
        }

        let mut cmd = Command::new(&self.program);
        cmd.stdin(Stdio::piped());
        cmd.stderr(Stdio::inherit());
        cmd.stdout(Stdio::piped());

        debug!("Launch picker '{}' with {} items", self.program, items.len());
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::PickerUnavailable(self.program.clone()).into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to launch {}", self.program));
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            write!(stdin, "{input}").with_context(|| format!("write input to {}", self.program))?;
        }

        let mut stdout = child.stdout.take();

        let status = child
            .wait()
            .with_context(|| format!("wait {} done", self.program))?;

        match status.code() {
            Some(0) => {
                let mut out = String::new();
                match stdout.as_mut() {
                    Some(stdout) => {
                        stdout
                            .read_to_string(&mut out)
                            .with_context(|| format!("read {} output", self.program))?;
                    }
                    None => bail!("{} did not output anything", self.program),
                }
                match_output(items, &out)
            }
            Some(1) => bail!("{} no match found", self.program),
            Some(2) => bail!("{} returned an error", self.program),
            Some(130) => bail!("{} canceled", self.program),
            Some(128..=254) | None => bail!("{} was terminated", self.program),
            _ => bail!("{} returned an unknown error", self.program),
        }
    }
}

fn match_output(items: &[String], out: &str) -> Result<usize> {
    let result = out.trim();
    match items.iter().position(|s| s == result) {
        Some(idx) => Ok(idx),
        None => bail!("cannot find key '{result}' from picker output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<String> {
        vec!["dev".to_string(), "prod".to_string()]
    }

    #[test]
    fn output_matched_to_index() {
        assert_eq!(match_output(&items(), "prod\n").unwrap(), 1);
        assert!(match_output(&items(), "staging\n").is_err());
    }

    #[test]
    fn missing_program_is_unavailable() {
        let picker = FzfPicker::new("kubeswitch-no-such-picker");
        let err = picker.choose(&items()).unwrap_err();
        assert_eq!(
            crate::error::kind(&err),
            Some(&Error::PickerUnavailable(
                "kubeswitch-no-such-picker".to_string()
            ))
        );
    }
}
