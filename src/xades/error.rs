use std::path::PathBuf;

use crate::{crypto, xml};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Crypto tool invocation failed: {0}")]
    ToolInvocation(#[source] crypto::Error),

    #[error("No certificate found in key file {}", .0.display())]
    MissingCertificate(PathBuf),

    #[error("No element with Id '{0}'")]
    TargetNotFound(String),

    #[error("Id '{id}' matches {count} elements")]
    AmbiguousTarget { id: String, count: usize },

    #[error("Malformed input: {0}")]
    MalformedInput(#[from] xml::Error),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Signature context error: {0}")]
    Context(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<crypto::Error> for Error {
    fn from(err: crypto::Error) -> Self {
        match err {
            crypto::Error::MissingCertificate { path } => Error::MissingCertificate(path),
            crypto::Error::Io(e) => Error::Io(e),
            other => Error::ToolInvocation(other),
        }
    }
}
