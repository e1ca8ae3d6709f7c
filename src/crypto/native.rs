//! In-process backend over the `openssl` crate.

use async_trait::async_trait;
use openssl::pkey::PKey;
use openssl::sign::Signer;
use openssl::x509::X509;
use std::path::Path;

use crate::crypto::cert::{CertificateInfo, NameEntry, extract_certificate_body};
use crate::crypto::errors::{CryptoResult, Error};
use crate::crypto::{CryptoBackend, HashAlg};

#[derive(Debug, Clone, Copy)]
pub struct OpensslNative {
    hash_alg: HashAlg,
}

impl OpensslNative {
    pub fn new(hash_alg: HashAlg) -> Self {
        Self { hash_alg }
    }

    fn load_certificate(pem: &str, path: &Path) -> CryptoResult<X509> {
        // fail with MissingCertificate rather than a bare PEM error
        extract_certificate_body(pem, path)?;
        Ok(X509::from_pem(pem.as_bytes())?)
    }
}

#[async_trait]
impl CryptoBackend for OpensslNative {
    async fn digest(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        self.hash_alg.hash(data)
    }

    async fn sign(&self, data: &[u8], key_path: &Path) -> CryptoResult<Vec<u8>> {
        let pem = tokio::fs::read(key_path).await?;
        let key = PKey::private_key_from_pem(&pem)?;
        let mut signer = Signer::new(self.hash_alg.message_digest()?, &key)?;
        signer.update(data)?;
        Ok(signer.sign_to_vec()?)
    }

    async fn inspect_certificate(&self, key_path: &Path) -> CryptoResult<CertificateInfo> {
        let pem = tokio::fs::read_to_string(key_path).await?;
        let cert = Self::load_certificate(&pem, key_path)?;

        let issuer = cert
            .issuer_name()
            .entries()
            .map(|entry| -> CryptoResult<NameEntry> {
                let object = entry.object();
                let key = object
                    .nid()
                    .short_name()
                    .map(str::to_string)
                    .unwrap_or_else(|_| object.to_string());
                let value = entry
                    .data()
                    .to_string()
                    .map_err(|e| Error::Invalid(format!("issuer {key}: {e}")))?;
                Ok(NameEntry::new(key, value))
            })
            .collect::<CryptoResult<Vec<_>>>()?;
        let serial_hex = cert.serial_number().to_bn()?.to_hex_str()?.to_string();

        Ok(CertificateInfo { issuer, serial_hex })
    }

    fn hash_alg(&self) -> HashAlg {
        self.hash_alg
    }
}
