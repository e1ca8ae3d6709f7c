use openssl::error::ErrorStack;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type CryptoResult<T> = Result<T, Error>;

/// Error type for cryptographic operations
#[derive(Error, Debug)]
pub enum Error {
    /// The external tool exited unsuccessfully or complained on stderr
    #[error("`{command}` failed ({status}): {stderr}")]
    ToolFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The external tool could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external tool did not finish in time
    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// The tool succeeded but printed something we cannot interpret
    #[error("Unexpected output from `{command}`: {reason}")]
    UnexpectedOutput { command: String, reason: String },

    /// The key file holds no PEM certificate block
    #[error("No certificate found in {}", path.display())]
    MissingCertificate { path: PathBuf },

    /// Digest not available in the linked OpenSSL
    #[error("Unsupported digest: {0}")]
    UnsupportedDigest(&'static str),

    /// Invalid data format or corrupted data
    #[error("Invalid data: {0}")]
    Invalid(String),

    /// Internal OpenSSL error
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
