//! Backend driving the `openssl` command line tool.

use async_trait::async_trait;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::crypto::cert::{CertificateInfo, parse_multiline_name, parse_serial_output};
use crate::crypto::errors::{CryptoResult, Error};
use crate::crypto::{CryptoBackend, HashAlg};

/// Runs each operation as a child `openssl` process.
///
/// Children are killed when the call is dropped or times out. Any stderr
/// output fails the call unless strict mode is turned off.
#[derive(Debug, Clone)]
pub struct OpensslCli {
    program: PathBuf,
    hash_alg: HashAlg,
    timeout: Duration,
    strict_stderr: bool,
}

impl OpensslCli {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(program: impl Into<PathBuf>, hash_alg: HashAlg) -> Self {
        Self {
            program: program.into(),
            hash_alg,
            timeout: Self::DEFAULT_TIMEOUT,
            strict_stderr: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_strict_stderr(mut self, strict: bool) -> Self {
        self.strict_stderr = strict;
        self
    }

    fn describe(&self, args: &[&OsStr]) -> String {
        let mut command = self.program.display().to_string();
        for arg in args {
            command.push(' ');
            command.push_str(&arg.to_string_lossy());
        }
        command
    }

    async fn run(&self, args: &[&OsStr], input: Option<&[u8]>) -> CryptoResult<Vec<u8>> {
        let command = self.describe(args);
        debug!(%command, "running openssl");

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let stdin = child.stdin.take();
        let data = input.map(<[u8]>::to_vec).unwrap_or_default();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(&data).await {
                    // the tool may exit before reading everything
                    Err(e) if e.kind() != ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
            }
            Ok::<(), std::io::Error>(())
        };

        let output = tokio::time::timeout(self.timeout, async {
            tokio::try_join!(feed, child.wait_with_output())
        })
        .await
        .map_err(|_| Error::Timeout {
            command: command.clone(),
            timeout: self.timeout,
        })??
        .1;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(Error::ToolFailed {
                command,
                status: output.status.to_string(),
                stderr,
            });
        }
        if !stderr.is_empty() {
            if self.strict_stderr {
                return Err(Error::ToolFailed {
                    command,
                    status: "wrote to stderr".into(),
                    stderr,
                });
            }
            warn!(%command, %stderr, "openssl wrote to stderr");
        }
        Ok(output.stdout)
    }

    fn text_output(command: &str, stdout: Vec<u8>) -> CryptoResult<String> {
        String::from_utf8(stdout).map_err(|e| Error::UnexpectedOutput {
            command: command.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl CryptoBackend for OpensslCli {
    async fn digest(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let flag = format!("-{}", self.hash_alg.openssl_name());
        let args = [OsStr::new("dgst"), OsStr::new("-binary"), OsStr::new(&flag)];
        self.run(&args, Some(data)).await
    }

    async fn sign(&self, data: &[u8], key_path: &Path) -> CryptoResult<Vec<u8>> {
        let flag = format!("-{}", self.hash_alg.openssl_name());
        let args = [
            OsStr::new("dgst"),
            OsStr::new("-sign"),
            key_path.as_os_str(),
            OsStr::new("-binary"),
            OsStr::new(&flag),
        ];
        self.run(&args, Some(data)).await
    }

    async fn inspect_certificate(&self, key_path: &Path) -> CryptoResult<CertificateInfo> {
        let issuer_args = [
            OsStr::new("x509"),
            OsStr::new("-noout"),
            OsStr::new("-issuer"),
            OsStr::new("-nameopt"),
            OsStr::new("sep_multiline,utf8"),
            OsStr::new("-in"),
            key_path.as_os_str(),
        ];
        let issuer = Self::text_output("x509 -issuer", self.run(&issuer_args, None).await?)?;

        let serial_args = [
            OsStr::new("x509"),
            OsStr::new("-noout"),
            OsStr::new("-serial"),
            OsStr::new("-in"),
            key_path.as_os_str(),
        ];
        let serial = Self::text_output("x509 -serial", self.run(&serial_args, None).await?)?;
        let serial_hex = parse_serial_output(&serial).ok_or_else(|| Error::UnexpectedOutput {
            command: "x509 -serial".into(),
            reason: format!("no serial in {serial:?}"),
        })?;

        Ok(CertificateInfo {
            issuer: parse_multiline_name(&issuer),
            serial_hex,
        })
    }

    fn hash_alg(&self) -> HashAlg {
        self.hash_alg
    }
}
