use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use tempfile::Builder as TempBuilder;
use tracing::debug;

use crate::error::Error;

/// Let a human edit a text document, returning the edited text.
pub trait Editor {
    fn edit(&self, doc: &str) -> Result<String>;
}

/// Edits through an external program operating on a temporary yaml file.
/// The command (`$EDITOR` by default) is env-expanded only when an edit
/// is requested, and may carry arguments, e.g. `code --wait`.
pub struct CommandEditor {
    editor: String,
}

impl CommandEditor {
    pub fn new<S: Into<String>>(editor: S) -> CommandEditor {
        CommandEditor {
            editor: editor.into(),
        }
    }

    fn command(&self) -> Result<(String, Vec<String>)> {
        let editor = match shellexpand::full(&self.editor) {
            Ok(editor) => editor.into_owned(),
            Err(err) => return Err(Error::MissingEditor(err.var_name).into()),
        };

        let mut fields = editor.split_whitespace().map(String::from);
        match fields.next() {
            Some(program) => Ok((program, fields.collect())),
            None => {
                let name = self.editor.trim_start_matches('$').to_string();
                Err(Error::MissingEditor(name).into())
            }
        }
    }
}

impl Editor for CommandEditor {
    fn edit(&self, doc: &str) -> Result<String> {
        let (program, args) = self.command()?;
        eprintln!("Use editor '{program}' to edit kube config content.");

        let mut file = TempBuilder::new()
            .prefix("edit-kubeconfig-")
            .suffix(".yaml")
            .tempfile()
            .context("create edit temp file")?;
        file.write_all(doc.as_bytes())
            .context("write raw content to edit temp file")?;
        file.flush().context("flush edit temp file")?;

        let path = file.path().to_path_buf();
        debug!("Edit temp file '{}' with {program} {args:?}", path.display());

        let mut cmd = Command::new(&program);
        cmd.args(&args);
        cmd.arg(&path);
        cmd.stdin(Stdio::inherit());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        let status = cmd
            .status()
            .with_context(|| format!("run edit command '{program} {}'", path.display()))?;
        if !status.success() {
            bail!("use editor '{program}' to edit temp file failed: {status}");
        }

        fs::read_to_string(&path).context("read temp file after editing")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn command_splits_arguments() {
        let editor = CommandEditor::new("code --wait");
        let (program, args) = editor.command().unwrap();
        assert_eq!(program, "code");
        assert_eq!(args, vec!["--wait".to_string()]);
    }

    #[test]
    fn unset_env_is_missing_editor() {
        let editor = CommandEditor::new("$KUBESWITCH_TEST_UNSET_EDITOR");
        let err = editor.edit("").unwrap_err();
        assert_eq!(
            crate::error::kind(&err),
            Some(&Error::MissingEditor(
                "KUBESWITCH_TEST_UNSET_EDITOR".to_string()
            ))
        );
    }

    #[test]
    fn unchanged_when_editor_touches_nothing() {
        let editor = CommandEditor::new("true");
        let out = editor.edit("clusters: []\n").unwrap();
        assert_eq!(out, "clusters: []\n");
    }

    #[test]
    fn editor_failure_reported() {
        let editor = CommandEditor::new("false");
        assert!(editor.edit("").is_err());
    }
}
