use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::kubeconfig::KubeConfig;

/// Load/replace access to the kubeconfig document. No caching happens
/// between calls; every command loads a fresh copy.
pub trait ConfigStore {
    fn load(&self) -> Result<KubeConfig>;

    fn save(&self, cfg: &KubeConfig) -> Result<()>;

    /// Path of the kubeconfig file. Marker and alias files live beside it.
    fn path(&self) -> &Path;

    fn dir(&self) -> PathBuf {
        self.path()
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> FileStore {
        FileStore { path: path.into() }
    }

    /// The file a save replaces. Symlinks are followed so the link itself
    /// survives; a file that does not exist yet is written at `path`.
    fn resolve(&self) -> Result<PathBuf> {
        match fs::canonicalize(&self.path) {
            Ok(path) => Ok(path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(self.path.clone()),
            Err(err) => Err(err)
                .with_context(|| format!("resolve kubeconfig path '{}'", self.path.display())),
        }
    }
}

impl ConfigStore for FileStore {
    fn load(&self) -> Result<KubeConfig> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("Kubeconfig '{}' not found, use empty", self.path.display());
                return Ok(KubeConfig::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read kubeconfig file '{}'", self.path.display()))
            }
        };
        KubeConfig::from_yaml(&data)
            .with_context(|| format!("load kubeconfig file '{}'", self.path.display()))
    }

    fn save(&self, cfg: &KubeConfig) -> Result<()> {
        let data = cfg.to_yaml()?;

        let target = self.resolve()?;
        let dir = match target.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        ensure_dir(&dir)?;

        let mut file = NamedTempFile::new_in(&dir)
            .with_context(|| format!("create temp file in '{}'", dir.display()))?;
        file.write_all(data.as_bytes())
            .context("write kubeconfig to temp file")?;
        file.flush().context("flush kubeconfig temp file")?;
        file.persist(&target)
            .with_context(|| format!("replace kubeconfig file '{}'", target.display()))?;

        debug!("Saved kubeconfig to '{}'", target.display());
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    match fs::metadata(dir) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).with_context(|| format!("create dir '{}'", dir.display()))
        }
        Err(err) => {
            Err(err).with_context(|| format!("read metadata for dir '{}'", dir.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("config"));

        let cfg = store.load().unwrap();
        assert!(cfg.is_empty());
        assert_eq!(store.dir(), dir.path());
    }

    #[test]
    fn save_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("config"));

        let mut cfg = KubeConfig::from_yaml(indoc! {r#"
            clusters:
              - name: dev
                cluster:
                  server: https://dev:6443
            contexts:
              - name: dev
                context:
                  cluster: dev
                  user: dev
            users:
              - name: dev
                user:
                  token: abc
        "#})
        .unwrap();
        cfg.current_context = Some(String::from("dev"));
        store.save(&cfg).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.current_context.as_deref(), Some("dev"));
        assert_eq!(loaded.context_names(), vec!["dev"]);

        let leftovers: Vec<_> = fs::read_dir(store.dir())
            .unwrap()
            .map(|ent| ent.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("config")]);
    }

    #[cfg(unix)]
    #[test]
    fn save_writes_through_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("dotfiles").join("kubeconfig");
        fs::create_dir_all(real.parent().unwrap()).unwrap();
        fs::write(&real, "current-context: a\n").unwrap();
        let link = dir.path().join("config");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let store = FileStore::new(&link);
        let mut cfg = store.load().unwrap();
        assert_eq!(cfg.current_context.as_deref(), Some("a"));
        cfg.current_context = Some(String::from("b"));
        store.save(&cfg).unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        let reloaded = KubeConfig::from_yaml(&fs::read_to_string(&real).unwrap()).unwrap();
        assert_eq!(reloaded.current_context.as_deref(), Some("b"));
        assert_eq!(store.dir(), dir.path());
    }

    #[test]
    fn bad_yaml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, "contexts: [").unwrap();

        let err = FileStore::new(&path).load().unwrap_err();
        assert!(format!("{err:#}").contains("load kubeconfig file"));
    }
}
