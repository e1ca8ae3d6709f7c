use std::{collections::HashMap, path::PathBuf};

use config::{Config as ConfigLib, ConfigError, Environment, File};
use serde::Deserialize;

use crate::crypto::HashAlg;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub signer: SignerConfig,
    pub crypto: CryptoConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignerConfig {
    /// IANA zone the signing time is expressed in.
    pub timezone: String,
    /// Replaces the built-in XAdES template when set.
    #[serde(default)]
    pub template_path: Option<PathBuf>,
    pub output_with_comments: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CryptoBackendKind {
    OpensslCli,
    OpensslNative,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CryptoConfig {
    pub backend: CryptoBackendKind,
    pub openssl_bin: PathBuf,
    pub digest: HashAlg,
    pub timeout_secs: u64,
    /// Treat any stderr output from the openssl tool as a failure.
    pub strict_stderr: bool,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("signer.timezone", "Asia/Krasnoyarsk")?
            .set_default("signer.output_with_comments", true)?
            .set_default("crypto.backend", "openssl_cli")?
            .set_default("crypto.openssl_bin", "openssl")?
            .set_default("crypto.digest", "gost94")?
            .set_default("crypto.timeout_secs", 30)?
            .set_default("crypto.strict_stderr", true)?
            .add_source(File::with_name("config/settings").required(false));

        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Should be in the format APP_CRYPTO__DIGEST or APP_SIGNER__TIMEZONE
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}
