use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the deployment pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem scan, read or write failure.
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Unknown network, missing artifacts or accounts.
    #[error("not found: {0}")]
    NotFound(String),
    /// Dial or RPC failure against a node.
    #[error("connection to {url} failed: {reason}")]
    Connection { url: String, reason: String },
    /// Keystore path missing or a key could not be unlocked.
    #[error("keystore error: {0}")]
    Keystore(String),
    /// On-chain submission of a contract failed.
    #[error("deployment of {contract} failed: {reason}")]
    Deployment { contract: String, reason: String },
    /// `config.json` could not be parsed.
    #[error("invalid config {path}: {reason}")]
    Config { path: PathBuf, reason: String },
    /// Sender address that is not 20 bytes of hex.
    #[error("invalid address `{0}`")]
    InvalidAddress(String),
    /// Compiler or binding generator failure.
    #[error("compilation failed: {0}")]
    Compile(String),
    /// Bytecode or ABI file with invalid contents.
    #[error("invalid artifact {path}: {reason}")]
    Artifact { path: PathBuf, reason: String },
    /// Deployment record that is not a name-to-address map.
    #[error("invalid deployment record {path}: {reason}")]
    Record { path: PathBuf, reason: String },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn connection(url: &str, reason: impl ToString) -> Self {
        Self::Connection {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn deployment(contract: &str, reason: impl ToString) -> Self {
        Self::Deployment {
            contract: contract.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
