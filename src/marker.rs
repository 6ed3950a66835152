use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// The durable record of the previously active selection, one file per
/// kind. Absence of the file means there was no prior selection.
pub struct Marker {
    kind: MarkerKind,
    path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Context,
    Namespace,
}

impl MarkerKind {
    fn file_name(self) -> &'static str {
        match self {
            MarkerKind::Context => ".last_switch_cluster",
            MarkerKind::Namespace => ".last_switch_ns",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MarkerKind::Context => "cluster",
            MarkerKind::Namespace => "namespace",
        }
    }
}

impl Marker {
    pub fn new<P: AsRef<Path>>(dir: P, kind: MarkerKind) -> Marker {
        Marker {
            kind,
            path: dir.as_ref().join(kind.file_name()),
        }
    }

    pub fn kind(&self) -> MarkerKind {
        self.kind
    }

    pub fn read(&self) -> Result<Option<String>> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read last file '{}'", self.path.display()))
            }
        };

        if data.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(data))
    }

    pub fn write(&self, value: &str) -> Result<()> {
        fs::write(&self.path, value)
            .with_context(|| format!("write last file '{}'", self.path.display()))?;
        debug!("Saved last {} '{value}'", self.kind.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn absent_means_none() {
        let dir = tempfile::tempdir().unwrap();
        let marker = Marker::new(dir.path(), MarkerKind::Context);
        assert_eq!(marker.read().unwrap(), None);

        fs::write(dir.path().join(".last_switch_cluster"), " \n").unwrap();
        assert_eq!(marker.read().unwrap(), None);
    }

    #[test]
    fn kinds_use_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Marker::new(dir.path(), MarkerKind::Context);
        let ns = Marker::new(dir.path(), MarkerKind::Namespace);

        ctx.write("prod").unwrap();
        ns.write("kube-system").unwrap();
        ctx.write("dev").unwrap();

        assert_eq!(ctx.read().unwrap().as_deref(), Some("dev"));
        assert_eq!(ns.read().unwrap().as_deref(), Some("kube-system"));

        let raw = fs::read_to_string(dir.path().join(".last_switch_ns")).unwrap();
        assert_eq!(raw, "kube-system");
    }

    #[test]
    fn value_read_back_unframed() {
        let dir = tempfile::tempdir().unwrap();
        let marker = Marker::new(dir.path(), MarkerKind::Namespace);

        fs::write(dir.path().join(".last_switch_ns"), "team a\n").unwrap();
        assert_eq!(marker.read().unwrap().as_deref(), Some("team a\n"));
    }
}
