use thiserror::Error as TError;

/// Failures the selection commands report by kind. Everything else (I/O,
/// parse, process errors) travels as a plain `anyhow::Error` with context.
#[derive(Debug, TError, PartialEq, Eq)]
pub enum Error {
    #[error("no cluster to use, the kubeconfig has no context")]
    EmptyConfig,

    #[error("cannot find cluster '{0}'")]
    NotFound(String),

    #[error("you have not switched to any {0} yet")]
    NoPriorSelection(&'static str),

    #[error("no context selected")]
    NoCurrentContext,

    #[error("no namespace to use")]
    NoNamespaces,

    #[error("list namespaces from server: {0}")]
    BackendUnavailable(String),

    #[error("invalid edit config, the number of cluster and user should be one")]
    InvalidEdit,

    #[error("cannot find {0} in your system, please install it first")]
    PickerUnavailable(String),

    #[error("missing env {0} to edit file")]
    MissingEditor(String),
}

/// Returns the taxonomy kind carried by `err`, if any.
#[cfg(test)]
pub fn kind(err: &anyhow::Error) -> Option<&Error> {
    err.chain().find_map(|cause| cause.downcast_ref::<Error>())
}
