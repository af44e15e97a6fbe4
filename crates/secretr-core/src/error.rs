//! Error types for `secretr-core`.
//!
//! Each variant carries enough context to diagnose the problem without a
//! debugger. Errors never include credential material — only which field
//! or secret identifier was involved.

use std::path::PathBuf;

/// Errors from connection-configuration resolution.
///
/// All of these are fatal: they occur before any network activity, and
/// the CLI turns them into a non-zero exit.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No WSDL endpoint was found in any source.
    #[error(
        "no secret server WSDL configured — pass --wsdl, set SECRETR_WSDL, \
         or add a `wsdl` key to the batch config"
    )]
    MissingWsdl,

    /// A credential was still empty after flags, environment, and prompt.
    #[error("no {field} provided after flags, environment, and prompt")]
    MissingCredential {
        /// Which credential field was unresolved (`username` or `password`).
        field: &'static str,
    },

    /// Reading from the interactive prompt failed.
    #[error("prompt failed: {0}")]
    Prompt(#[from] std::io::Error),
}

/// Errors from loading a declarative batch config file.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The config file could not be read.
    #[error("failed to read batch config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid YAML of the expected shape.
    #[error("invalid batch config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The config file parsed but lists no secrets to retrieve.
    #[error("batch config {path} lists no secrets")]
    Empty { path: PathBuf },
}

/// Errors from a [`SecretSource`](crate::source::SecretSource) fetch.
///
/// At the orchestrator boundary every variant is a per-item failure: it
/// becomes an error record for that one secret and never aborts sibling
/// retrievals.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The server rejected the supplied credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The server reported an error for this secret (not found, access
    /// denied, ...).
    #[error("{0}")]
    Server(String),

    /// The request could not be delivered or the response not received.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response arrived but could not be understood.
    #[error("unexpected server response: {0}")]
    Protocol(String),
}
