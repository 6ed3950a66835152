use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::alias::AliasTable;
use crate::config::Config;
use crate::editor::Editor;
use crate::error::Error;
use crate::kube::NamespaceLister;
use crate::kubeconfig::{KubeConfig, KubeContext};
use crate::marker::{Marker, MarkerKind};
use crate::picker::Picker;
use crate::store::ConfigStore;

/// The selection commands, wired to their collaborators.
pub struct Switcher<'a> {
    pub cfg: &'a Config,
    pub store: &'a dyn ConfigStore,
    pub picker: &'a dyn Picker,
    pub lister: &'a dyn NamespaceLister,
    pub editor: &'a dyn Editor,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Current {
    pub context: String,
    pub namespace: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ListRow {
    pub current: bool,
    pub name: String,
    pub namespace: String,
    pub server: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SetOutcome {
    Updated,
    Cancelled,
}

impl Switcher<'_> {
    pub fn current(&self) -> Result<Current> {
        let kubeconfig = self.store.load()?;
        let (name, ctx) = kubeconfig.current().ok_or(Error::NoCurrentContext)?;
        let ctx = ctx.ok_or_else(|| Error::NotFound(name.to_string()))?;
        Ok(Current {
            context: name.to_string(),
            namespace: ctx.namespace().to_string(),
        })
    }

    /// Switch the current context, returning its new name.
    pub fn use_context(&self, query: Option<&str>) -> Result<String> {
        let mut kubeconfig = self.store.load()?;
        let marker = self.marker(MarkerKind::Context);

        let name = match query {
            Some("-") => self.read_marker(&marker)?,
            Some(name) => name.to_string(),
            None => {
                if kubeconfig.is_empty() {
                    return Err(Error::EmptyConfig.into());
                }
                let mut names = kubeconfig.context_names();
                let idx = self.picker.choose(&names)?;
                names.swap_remove(idx)
            }
        };
        if !kubeconfig.contexts.contains_key(&name) {
            return Err(Error::NotFound(name).into());
        }

        let last = kubeconfig.current_context.replace(name.clone());
        if let Some(last) = last.filter(|last| last != &name) {
            marker.write(&last)?;
        }
        self.store.save(&kubeconfig).context("modify config")?;

        info!("Switched context to '{name}'");
        Ok(name)
    }

    /// Switch the namespace of the current context, returning the new one.
    pub fn use_namespace(&self, query: Option<&str>) -> Result<String> {
        let mut kubeconfig = self.store.load()?;
        let current = kubeconfig
            .current_context
            .clone()
            .ok_or(Error::NoCurrentContext)?;
        if !kubeconfig.contexts.contains_key(&current) {
            return Err(Error::NotFound(current).into());
        }
        let marker = self.marker(MarkerKind::Namespace);

        let ns = match query {
            Some("-") => self.read_marker(&marker)?,
            Some(ns) => ns.to_string(),
            None => {
                let mut namespaces = self.namespace_candidates(&current)?;
                let idx = self.picker.choose(&namespaces)?;
                namespaces.swap_remove(idx)
            }
        };

        let ctx = kubeconfig
            .contexts
            .get_mut(&current)
            .ok_or_else(|| Error::NotFound(current.clone()))?;
        let last = ctx.namespace().to_string();
        ctx.namespace = Some(ns.clone());

        if last != ns {
            marker.write(&last)?;
        }
        self.store.save(&kubeconfig).context("update config")?;

        info!("Switched namespace of '{current}' to '{ns}'");
        Ok(ns)
    }

    /// Namespace candidates for `context`: the alias file first, then the
    /// configured alias rules, then a live listing.
    pub fn namespace_candidates(&self, context: &str) -> Result<Vec<String>> {
        let aliases = AliasTable::load(self.store.dir())?;
        let namespaces = if let Some(namespaces) = aliases.lookup(context) {
            debug!("Use alias file namespaces for '{context}'");
            namespaces.to_vec()
        } else if let Some(namespaces) = self.cfg.match_ns_alias(context) {
            debug!("Use config ns_alias namespaces for '{context}'");
            namespaces.to_vec()
        } else {
            self.lister
                .list(self.store.path(), context)
                .map_err(|err| Error::BackendUnavailable(format!("{err:#}")))?
        };

        if namespaces.is_empty() {
            return Err(Error::NoNamespaces.into());
        }
        Ok(namespaces)
    }

    /// Register the cluster/user/context triple `name` from an edited
    /// document. The document is read from `file` when given, otherwise the
    /// editor is opened on the existing entry (or a blank document).
    pub fn set_cluster(&self, name: &str, file: Option<&Path>) -> Result<SetOutcome> {
        let mut kubeconfig = self.store.load()?;

        let edited = match file {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("read config file '{}'", path.display()))?,
            None => {
                let doc = match kubeconfig.extract(name) {
                    Some(doc) => doc.to_yaml()?,
                    None => String::new(),
                };
                self.editor.edit(&doc)?
            }
        };
        let edited = KubeConfig::from_yaml(&edited).context("load edited config")?;

        if edited.clusters.is_empty() || edited.users.is_empty() {
            return Ok(SetOutcome::Cancelled);
        }
        if edited.clusters.len() != 1 || edited.users.len() != 1 {
            return Err(Error::InvalidEdit.into());
        }

        let namespace = match kubeconfig.contexts.get(name) {
            Some(ctx) => ctx.namespace.clone(),
            None => Some(String::from("default")),
        };
        let (cluster, user) = match (
            edited.clusters.into_values().next(),
            edited.users.into_values().next(),
        ) {
            (Some(cluster), Some(user)) => (cluster, user),
            _ => return Err(Error::InvalidEdit.into()),
        };

        kubeconfig.upsert(name, cluster, user, KubeContext::new(name, namespace));
        self.store.save(&kubeconfig).context("write config")?;

        info!("Set cluster '{name}'");
        Ok(SetOutcome::Updated)
    }

    pub fn delete_cluster(&self, name: &str) -> Result<()> {
        let mut kubeconfig = self.store.load()?;
        kubeconfig.remove(name);
        self.store.save(&kubeconfig).context("modify config")?;

        info!("Deleted cluster '{name}'");
        Ok(())
    }

    pub fn list(&self, wide: bool) -> Result<Vec<ListRow>> {
        let kubeconfig = self.store.load()?;
        if kubeconfig.is_empty() {
            return Err(Error::EmptyConfig.into());
        }

        let current = kubeconfig.current_context.as_deref();
        Ok(kubeconfig
            .contexts
            .iter()
            .map(|(name, ctx)| ListRow {
                current: current == Some(name.as_str()),
                name: name.clone(),
                namespace: ctx.namespace().to_string(),
                server: wide.then(|| kubeconfig.server(ctx).to_string()),
            })
            .collect())
    }

    /// Context names starting with `prefix`. Never fails: any problem
    /// yields no suggestions.
    pub fn complete_contexts(&self, args: &[String], prefix: &str) -> Vec<String> {
        if !args.is_empty() {
            return Vec::new();
        }
        match self.store.load() {
            Ok(kubeconfig) => filter_prefix(kubeconfig.context_names(), prefix),
            Err(err) => {
                debug!("Complete contexts: {err:#}");
                Vec::new()
            }
        }
    }

    /// Namespace names for the current context starting with `prefix`,
    /// resolved like the interactive `ns` candidates. Never fails.
    pub fn complete_namespaces(&self, args: &[String], prefix: &str) -> Vec<String> {
        if !args.is_empty() {
            return Vec::new();
        }
        let namespaces = self.store.load().and_then(|kubeconfig| {
            let current = kubeconfig
                .current_context
                .ok_or(Error::NoCurrentContext)?;
            self.namespace_candidates(&current)
        });
        match namespaces {
            Ok(namespaces) => filter_prefix(namespaces, prefix),
            Err(err) => {
                debug!("Complete namespaces: {err:#}");
                Vec::new()
            }
        }
    }

    fn marker(&self, kind: MarkerKind) -> Marker {
        Marker::new(self.store.dir(), kind)
    }

    fn read_marker(&self, marker: &Marker) -> Result<String> {
        let last = marker
            .read()
            .with_context(|| format!("read last {}", marker.kind().as_str()))?;
        last.ok_or_else(|| Error::NoPriorSelection(marker.kind().as_str()).into())
    }
}

fn filter_prefix(items: Vec<String>, prefix: &str) -> Vec<String> {
    let mut items: Vec<String> = items
        .into_iter()
        .filter(|item| item.starts_with(prefix))
        .collect();
    items.sort();
    items
}

/// Render `rows` as an aligned table with a leading current marker column.
pub fn render_table(rows: &[ListRow]) -> String {
    let wide = rows.iter().any(|row| row.server.is_some());

    let mut table: Vec<Vec<&str>> = Vec::with_capacity(rows.len() + 1);
    let mut titles = vec!["", "NAME", "NAMESPACE"];
    if wide {
        titles.push("SERVER");
    }
    table.push(titles);
    for row in rows {
        let mut line = vec![
            if row.current { "*" } else { "" },
            row.name.as_str(),
            row.namespace.as_str(),
        ];
        if wide {
            line.push(row.server.as_deref().unwrap_or(""));
        }
        table.push(line);
    }

    let columns = table[0].len();
    let widths: Vec<usize> = (0..columns)
        .map(|col| table.iter().map(|line| line[col].len()).max().unwrap_or(0))
        .collect();

    let mut out = String::new();
    for line in table {
        let mut text = String::new();
        for (col, cell) in line.iter().enumerate() {
            if col > 0 {
                text.push_str("  ");
            }
            text.push_str(&format!("{cell:<width$}", width = widths[col]));
        }
        out.push_str(text.trim_end());
        out.push('\n');
    }
    out
}
