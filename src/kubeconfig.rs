use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::warn;

/// The kubeconfig document. Clusters, users and contexts are kept in
/// ordered maps so that every listing is sorted by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KubeConfig {
    pub clusters: BTreeMap<String, Value>,
    pub users: BTreeMap<String, Value>,
    pub contexts: BTreeMap<String, KubeContext>,

    pub current_context: Option<String>,

    header: Header,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KubeContext {
    #[serde(default)]
    pub cluster: String,

    #[serde(default)]
    pub user: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Header {
    api_version: Option<String>,
    kind: Option<String>,
    preferences: Option<Value>,
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawKubeConfig {
    #[serde(rename = "apiVersion", default, skip_serializing_if = "Option::is_none")]
    api_version: Option<String>,

    #[serde(default)]
    clusters: Option<Vec<NamedCluster>>,

    #[serde(default)]
    contexts: Option<Vec<NamedContext>>,

    #[serde(rename = "current-context", default)]
    current_context: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    preferences: Option<Value>,

    #[serde(default)]
    users: Option<Vec<NamedUser>>,

    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NamedCluster {
    name: String,
    #[serde(default)]
    cluster: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct NamedUser {
    name: String,
    #[serde(default)]
    user: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct NamedContext {
    name: String,
    #[serde(default)]
    context: Option<KubeContext>,
}

impl KubeContext {
    pub fn new<S: Into<String>>(name: S, namespace: Option<String>) -> KubeContext {
        let name = name.into();
        KubeContext {
            cluster: name.clone(),
            user: name,
            namespace,
            extra: BTreeMap::new(),
        }
    }

    /// The namespace as kubectl sees it: unset means `default`.
    pub fn namespace(&self) -> &str {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => ns,
            _ => "default",
        }
    }
}

impl KubeConfig {
    /// Parse a kubeconfig document. Blank input is an empty document.
    pub fn from_yaml(s: &str) -> Result<KubeConfig> {
        if s.trim().is_empty() {
            return Ok(KubeConfig::default());
        }
        let raw: RawKubeConfig = serde_yaml::from_str(s).context("parse kubeconfig yaml")?;
        Ok(raw.into())
    }

    pub fn to_yaml(&self) -> Result<String> {
        let raw = RawKubeConfig::from(self);
        serde_yaml::to_string(&raw).context("encode kubeconfig yaml")
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn context_names(&self) -> Vec<String> {
        self.contexts.keys().cloned().collect()
    }

    pub fn current(&self) -> Option<(&str, Option<&KubeContext>)> {
        let name = self.current_context.as_deref()?;
        Some((name, self.contexts.get(name)))
    }

    /// Server endpoint of the cluster referenced by `ctx`, empty when the
    /// cluster entry or its `server` field is missing.
    pub fn server(&self, ctx: &KubeContext) -> &str {
        self.clusters
            .get(&ctx.cluster)
            .and_then(|cluster| cluster.get("server"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Extract the cluster/user/context triple registered under `name` as a
    /// standalone document. `None` unless all three exist.
    pub fn extract(&self, name: &str) -> Option<KubeConfig> {
        let cluster = self.clusters.get(name)?;
        let user = self.users.get(name)?;
        let ctx = self.contexts.get(name)?;

        let mut doc = KubeConfig::default();
        doc.clusters.insert(name.to_string(), cluster.clone());
        doc.users.insert(name.to_string(), user.clone());
        doc.contexts.insert(name.to_string(), ctx.clone());
        Some(doc)
    }

    pub fn upsert(&mut self, name: &str, cluster: Value, user: Value, ctx: KubeContext) {
        self.clusters.insert(name.to_string(), cluster);
        self.users.insert(name.to_string(), user);
        self.contexts.insert(name.to_string(), ctx);
    }

    /// Remove the triple registered under `name`, clearing current-context
    /// when it points at it. Absent entries are skipped.
    pub fn remove(&mut self, name: &str) {
        self.contexts.remove(name);
        self.users.remove(name);
        self.clusters.remove(name);
        if self.current_context.as_deref() == Some(name) {
            self.current_context = None;
        }
    }
}

fn collect_named<T>(kind: &str, items: Option<Vec<(String, T)>>) -> BTreeMap<String, T> {
    let mut map = BTreeMap::new();
    for (name, item) in items.unwrap_or_default() {
        if map.contains_key(&name) {
            warn!("Duplicate {kind} '{name}' in kubeconfig, keep the first one");
            continue;
        }
        map.insert(name, item);
    }
    map
}

impl From<RawKubeConfig> for KubeConfig {
    fn from(raw: RawKubeConfig) -> Self {
        let clusters = raw
            .clusters
            .map(|items| items.into_iter().map(|c| (c.name, c.cluster)).collect::<Vec<_>>());
        let users = raw
            .users
            .map(|items| items.into_iter().map(|u| (u.name, u.user)).collect::<Vec<_>>());
        let contexts = raw.contexts.map(|items| {
            items
                .into_iter()
                .map(|c| (c.name, c.context.unwrap_or_default()))
                .collect::<Vec<_>>()
        });

        KubeConfig {
            clusters: collect_named("cluster", clusters),
            users: collect_named("user", users),
            contexts: collect_named("context", contexts),
            current_context: raw.current_context.filter(|name| !name.is_empty()),
            header: Header {
                api_version: raw.api_version,
                kind: raw.kind,
                preferences: raw.preferences,
                extra: raw.extra,
            },
        }
    }
}

impl From<&KubeConfig> for RawKubeConfig {
    fn from(cfg: &KubeConfig) -> Self {
        let clusters = cfg
            .clusters
            .iter()
            .map(|(name, cluster)| NamedCluster {
                name: name.clone(),
                cluster: cluster.clone(),
            })
            .collect();
        let users = cfg
            .users
            .iter()
            .map(|(name, user)| NamedUser {
                name: name.clone(),
                user: user.clone(),
            })
            .collect();
        let contexts = cfg
            .contexts
            .iter()
            .map(|(name, ctx)| NamedContext {
                name: name.clone(),
                context: Some(ctx.clone()),
            })
            .collect();

        RawKubeConfig {
            api_version: Some(
                cfg.header
                    .api_version
                    .clone()
                    .unwrap_or_else(|| String::from("v1")),
            ),
            clusters: Some(clusters),
            contexts: Some(contexts),
            current_context: Some(cfg.current_context.clone().unwrap_or_default()),
            kind: Some(
                cfg.header
                    .kind
                    .clone()
                    .unwrap_or_else(|| String::from("Config")),
            ),
            preferences: cfg.header.preferences.clone(),
            users: Some(users),
            extra: cfg.header.extra.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    const CONFIG: &str = indoc! {r#"
        apiVersion: v1
        clusters:
          - cluster:
              certificate-authority-data: Q0E=
              server: https://prod.example.com:6443
            name: prod
          - cluster:
              server: https://dev.example.com:6443
            name: dev
        contexts:
          - context:
              cluster: prod
              namespace: app
              user: prod
            name: prod
          - context:
              cluster: dev
              user: dev
            name: dev
          - context:
              cluster: gone
              user: gone
            name: orphan
        current-context: prod
        kind: Config
        preferences: {}
        users:
          - name: prod
            user:
              token: secret
          - name: dev
            user:
              client-certificate-data: Q0VSVA==
    "#};

    #[test]
    fn parse_sorted_by_name() {
        let cfg = KubeConfig::from_yaml(CONFIG).unwrap();

        assert_eq!(cfg.context_names(), vec!["dev", "orphan", "prod"]);
        assert_eq!(cfg.current_context.as_deref(), Some("prod"));

        let prod = cfg.contexts.get("prod").unwrap();
        assert_eq!(prod.namespace(), "app");
        assert_eq!(cfg.server(prod), "https://prod.example.com:6443");

        let dev = cfg.contexts.get("dev").unwrap();
        assert_eq!(dev.namespace, None);
        assert_eq!(dev.namespace(), "default");

        let orphan = cfg.contexts.get("orphan").unwrap();
        assert_eq!(cfg.server(orphan), "");
    }

    #[test]
    fn blank_document_is_empty() {
        let cfg = KubeConfig::from_yaml("  \n").unwrap();
        assert!(cfg.is_empty());
        assert!(cfg.current().is_none());
    }

    #[test]
    fn empty_current_context_is_unset() {
        let cfg = KubeConfig::from_yaml(indoc! {r#"
            apiVersion: v1
            clusters: null
            contexts: []
            current-context: ""
            kind: Config
            users: null
        "#})
        .unwrap();
        assert_eq!(cfg.current_context, None);
        assert!(cfg.is_empty());
    }

    #[test]
    fn yaml_keeps_opaque_payloads() {
        let mut cfg = KubeConfig::from_yaml(CONFIG).unwrap();
        cfg.current_context = Some(String::from("dev"));

        let reloaded = KubeConfig::from_yaml(&cfg.to_yaml().unwrap()).unwrap();
        assert_eq!(reloaded, cfg);
        assert_eq!(
            reloaded.users["prod"].get("token").and_then(Value::as_str),
            Some("secret")
        );
        assert_eq!(reloaded.header.preferences, cfg.header.preferences);
    }

    #[test]
    fn extract_requires_full_triple() {
        let cfg = KubeConfig::from_yaml(CONFIG).unwrap();

        let doc = cfg.extract("prod").unwrap();
        assert_eq!(doc.context_names(), vec!["prod"]);
        assert_eq!(doc.clusters.len(), 1);
        assert_eq!(doc.users.len(), 1);

        assert!(cfg.extract("orphan").is_none());
        assert!(cfg.extract("missing").is_none());
    }

    #[test]
    fn remove_clears_current() {
        let mut cfg = KubeConfig::from_yaml(CONFIG).unwrap();

        cfg.remove("prod");
        assert_eq!(cfg.current_context, None);
        assert!(!cfg.clusters.contains_key("prod"));
        assert!(!cfg.users.contains_key("prod"));
        assert_eq!(cfg.context_names(), vec!["dev", "orphan"]);

        cfg.current_context = Some(String::from("dev"));
        cfg.remove("missing");
        assert_eq!(cfg.current_context.as_deref(), Some("dev"));
        assert_eq!(cfg.context_names(), vec!["dev", "orphan"]);
    }
}
