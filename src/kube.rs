use std::path::Path;

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Namespace as ApiCoreV1Namespace;
use kube::api::ListParams;
use kube::config::Config as ApiConfig;
use kube::config::KubeConfigOptions as ApiConfigOptions;
use kube::config::Kubeconfig as ApiKubeconfig;
use kube::Api;
use kube::Client as KubeClient;
use tokio::runtime::Builder as RuntimeBuilder;
use tracing::debug;

/// Live namespace listing against the cluster behind a kubeconfig context.
pub trait NamespaceLister {
    fn list(&self, kubeconfig: &Path, context: &str) -> Result<Vec<String>>;
}

pub struct ApiNamespaceLister;

impl NamespaceLister for ApiNamespaceLister {
    fn list(&self, kubeconfig: &Path, context: &str) -> Result<Vec<String>> {
        let runtime = RuntimeBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("build tokio runtime")?;
        runtime.block_on(list_namespaces(kubeconfig, context))
    }
}

async fn list_namespaces(path: &Path, context: &str) -> Result<Vec<String>> {
    let kubeconfig = ApiKubeconfig::read_from(path)
        .with_context(|| format!("read kubeconfig file '{}'", path.display()))?;
    let kubeconfig_opts = ApiConfigOptions {
        context: Some(context.to_string()),
        ..Default::default()
    };
    let kubeconfig = ApiConfig::from_custom_kubeconfig(kubeconfig, &kubeconfig_opts)
        .await
        .context("build kube api config")?;
    debug!("List namespaces from '{}'", kubeconfig.cluster_url);

    let client = KubeClient::try_from(kubeconfig).context("build kube client")?;

    let ns_api: Api<ApiCoreV1Namespace> = Api::all(client);
    let namespaces = ns_api
        .list(&ListParams::default())
        .await
        .context("list kube namespace")?;

    let mut names: Vec<String> = namespaces
        .into_iter()
        .filter_map(|ns| ns.metadata.name)
        .collect();
    names.sort();
    Ok(names)
}
