use std::fs;
use std::io;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_yaml::{Mapping, Value};
use tracing::debug;

/// Namespace shortlists keyed by context name prefix, read from
/// `ns_alias.yaml` beside the kubeconfig. Entries keep file order and the
/// first matching prefix wins.
#[derive(Debug, Default)]
pub struct AliasTable {
    entries: Vec<(String, Vec<String>)>,
}

impl AliasTable {
    const FILE_NAME: &'static str = "ns_alias.yaml";

    pub fn load<P: AsRef<Path>>(dir: P) -> Result<AliasTable> {
        let path = dir.as_ref().join(Self::FILE_NAME);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(AliasTable::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("open alias file '{}'", path.display()))
            }
        };
        let table = Self::parse(&data)
            .with_context(|| format!("decode alias file '{}'", path.display()))?;
        debug!("Loaded {} alias entries from '{}'", table.entries.len(), path.display());
        Ok(table)
    }

    pub fn parse(s: &str) -> Result<AliasTable> {
        if s.trim().is_empty() {
            return Ok(AliasTable::default());
        }

        let mapping: Option<Mapping> = serde_yaml::from_str(s).context("parse alias yaml")?;
        let mut entries = Vec::new();
        for (key, value) in mapping.unwrap_or_default() {
            let prefix = match key {
                Value::String(prefix) => prefix,
                key => bail!("alias key must be a string, found {key:?}"),
            };
            let namespaces: Option<Vec<String>> = serde_yaml::from_value(value)
                .with_context(|| format!("alias '{prefix}' must be a list of namespaces"))?;
            let namespaces = namespaces.unwrap_or_default();
            entries.push((prefix, namespaces));
        }
        Ok(AliasTable { entries })
    }

    /// Namespaces of the first prefix matching `context`. Entries with an
    /// empty list never match.
    pub fn lookup(&self, context: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .filter(|(_, namespaces)| !namespaces.is_empty())
            .find(|(prefix, _)| context.starts_with(prefix.as_str()))
            .map(|(_, namespaces)| namespaces.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn first_prefix_in_file_order() {
        let table = AliasTable::parse(indoc! {r#"
            prod-: [a, b]
            prod-east: [c]
            dev:
              - tools
        "#})
        .unwrap();

        assert_eq!(
            table.lookup("prod-east").unwrap(),
            &["a".to_string(), "b".to_string()]
        );
        assert_eq!(table.lookup("dev-1").unwrap(), &["tools".to_string()]);
        assert!(table.lookup("staging").is_none());
    }

    #[test]
    fn empty_entries_are_skipped() {
        let table = AliasTable::parse(indoc! {r#"
            prod-east: []
            prod-:
            prod: [app]
        "#})
        .unwrap();

        assert_eq!(table.lookup("prod-east").unwrap(), &["app".to_string()]);
        assert_eq!(table.lookup("prod-west").unwrap(), &["app".to_string()]);
        assert!(AliasTable::parse("dev: []\n").unwrap().lookup("dev").is_none());
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let table = AliasTable::load(dir.path()).unwrap();
        assert!(table.lookup("anything").is_none());
    }

    #[test]
    fn rejects_non_list_value() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ns_alias.yaml"), "prod: 3\n").unwrap();

        let err = AliasTable::load(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("decode alias file"));
    }
}
