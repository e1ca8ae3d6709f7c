pub mod cert;
pub mod cli;
mod errors;
pub mod native;

pub use cert::{CertificateFacts, CertificateInfo, NameEntry};
pub use cli::OpensslCli;
pub use errors::{CryptoResult, Error};
pub use native::OpensslNative;

use async_trait::async_trait;
use openssl::hash::{Hasher, MessageDigest as Digest};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::config::{CryptoBackendKind, CryptoConfig};

/// Digest algorithms a signature can be produced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlg {
    /// GOST R 34.11-94
    #[default]
    Gost94,
    /// SHA-1
    Sha1,
    /// SHA-256
    Sha256,
    /// SHA-512
    Sha512,
}

impl HashAlg {
    /// Hash the given data with this hash algorithm
    pub fn hash(&self, data: impl AsRef<[u8]>) -> CryptoResult<Vec<u8>> {
        let mut hasher = Hasher::new(self.message_digest()?)?;
        hasher.update(data.as_ref())?;
        Ok(hasher.finish()?.to_vec())
    }

    /// Resolve the OpenSSL digest. GOST is only available when the linked
    /// OpenSSL has the GOST engine loaded.
    pub fn message_digest(&self) -> CryptoResult<Digest> {
        match self {
            HashAlg::Gost94 => Digest::from_name("md_gost94")
                .ok_or(Error::UnsupportedDigest(self.openssl_name())),
            HashAlg::Sha1 => Ok(Digest::sha1()),
            HashAlg::Sha256 => Ok(Digest::sha256()),
            HashAlg::Sha512 => Ok(Digest::sha512()),
        }
    }

    /// Name accepted by `openssl dgst -<name>`.
    pub fn openssl_name(&self) -> &'static str {
        match self {
            HashAlg::Gost94 => "md_gost94",
            HashAlg::Sha1 => "sha1",
            HashAlg::Sha256 => "sha256",
            HashAlg::Sha512 => "sha512",
        }
    }

    /// `ds:DigestMethod` algorithm URI.
    pub fn digest_uri(&self) -> &'static str {
        match self {
            HashAlg::Gost94 => "http://www.w3.org/2001/04/xmldsig-more#gostr3411",
            HashAlg::Sha1 => "http://www.w3.org/2000/09/xmldsig#sha1",
            HashAlg::Sha256 => "http://www.w3.org/2001/04/xmlenc#sha256",
            HashAlg::Sha512 => "http://www.w3.org/2001/04/xmlenc#sha512",
        }
    }

    /// `ds:SignatureMethod` algorithm URI for a key matching this digest.
    pub fn signature_uri(&self) -> &'static str {
        match self {
            HashAlg::Gost94 => "http://www.w3.org/2001/04/xmldsig-more#gostr34102001-gostr3411",
            HashAlg::Sha1 => "http://www.w3.org/2000/09/xmldsig#rsa-sha1",
            HashAlg::Sha256 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
            HashAlg::Sha512 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512",
        }
    }
}

impl fmt::Display for HashAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashAlg::Gost94 => "GOST R 34.11-94",
            HashAlg::Sha1 => "SHA-1",
            HashAlg::Sha256 => "SHA-256",
            HashAlg::Sha512 => "SHA-512",
        };
        write!(f, "{name}")
    }
}

/// The cryptographic capabilities the signer depends on.
///
/// `key_path` always names a PEM file holding both the private key and the
/// signer certificate.
#[async_trait]
pub trait CryptoBackend: Send + Sync {
    /// Raw digest bytes of `data`.
    async fn digest(&self, data: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Raw signature bytes over `data` with the key in `key_path`.
    async fn sign(&self, data: &[u8], key_path: &Path) -> CryptoResult<Vec<u8>>;

    /// Issuer and serial of the certificate in `key_path`.
    async fn inspect_certificate(&self, key_path: &Path) -> CryptoResult<CertificateInfo>;

    fn hash_alg(&self) -> HashAlg;
}

/// Build the backend selected in the configuration.
pub fn backend_from_config(config: &CryptoConfig) -> Box<dyn CryptoBackend> {
    match config.backend {
        CryptoBackendKind::OpensslCli => Box::new(
            OpensslCli::new(&config.openssl_bin, config.digest)
                .with_timeout(Duration::from_secs(config.timeout_secs))
                .with_strict_stderr(config.strict_stderr),
        ),
        CryptoBackendKind::OpensslNative => Box::new(OpensslNative::new(config.digest)),
    }
}

#[async_trait]
impl<B: CryptoBackend + ?Sized> CryptoBackend for Box<B> {
    async fn digest(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        (**self).digest(data).await
    }

    async fn sign(&self, data: &[u8], key_path: &Path) -> CryptoResult<Vec<u8>> {
        (**self).sign(data, key_path).await
    }

    async fn inspect_certificate(&self, key_path: &Path) -> CryptoResult<CertificateInfo> {
        (**self).inspect_certificate(key_path).await
    }

    fn hash_alg(&self) -> HashAlg {
        (**self).hash_alg()
    }
}
