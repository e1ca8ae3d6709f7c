use chrono::Utc;
use chrono_tz::Tz;
use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::xades::{Error, Result};

/// Everything a signing run needs from the caller.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    key_path: PathBuf,
    document: Vec<u8>,
    signed_id: String,
}

impl SigningRequest {
    pub fn new(
        key_path: impl Into<PathBuf>,
        document: impl Into<Vec<u8>>,
        signed_id: impl Into<String>,
    ) -> Self {
        Self {
            key_path: key_path.into(),
            document: document.into(),
            signed_id: signed_id.into(),
        }
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// The document as read, in its declared encoding.
    pub fn document(&self) -> &[u8] {
        &self.document
    }

    pub fn signed_id(&self) -> &str {
        &self.signed_id
    }
}

/// Per-run identifiers: the signature id and the signing time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureIdentity {
    pub signature_id: String,
    pub signing_time: String,
}

impl SignatureIdentity {
    /// Fresh random id and the current time in `tz`, ISO-8601 with offset.
    pub fn generate(tz: &Tz) -> Self {
        Self {
            signature_id: Uuid::new_v4().to_string(),
            signing_time: Utc::now()
                .with_timezone(tz)
                .format("%Y-%m-%dT%H:%M:%S%.6f%:z")
                .to_string(),
        }
    }

    pub fn new(signature_id: impl Into<String>, signing_time: impl Into<String>) -> Self {
        Self {
            signature_id: signature_id.into(),
            signing_time: signing_time.into(),
        }
    }

    /// `Id` of the `xades:SignedProperties` element.
    pub fn signed_props_id(&self) -> String {
        format!("xmldsig-{}-signedprops", self.signature_id)
    }

    /// `URI` of the `ds:Reference` covering the signed properties.
    pub fn signed_props_uri(&self) -> String {
        format!("#{}", self.signed_props_id())
    }
}

/// Values computed during one run. Each one can be set exactly once.
#[derive(Debug)]
pub struct SignatureContext {
    identity: SignatureIdentity,
    signed_id: String,
    digest1: OnceCell<String>,
    digest2: OnceCell<String>,
    digest3: OnceCell<String>,
    signature: OnceCell<String>,
}

macro_rules! write_once {
    ($set:ident, $get:ident, $field:ident, $label:literal) => {
        pub fn $set(&self, value: String) -> Result<()> {
            self.$field
                .set(value)
                .map_err(|_| Error::Context(concat!($label, " already set").into()))
        }

        pub fn $get(&self) -> Option<&str> {
            self.$field.get().map(String::as_str)
        }
    };
}

impl SignatureContext {
    pub fn new(identity: SignatureIdentity, signed_id: impl Into<String>) -> Self {
        Self {
            identity,
            signed_id: signed_id.into(),
            digest1: OnceCell::new(),
            digest2: OnceCell::new(),
            digest3: OnceCell::new(),
            signature: OnceCell::new(),
        }
    }

    pub fn identity(&self) -> &SignatureIdentity {
        &self.identity
    }

    pub fn signed_id(&self) -> &str {
        &self.signed_id
    }

    write_once!(set_digest1, digest1, digest1, "digest1");
    write_once!(set_digest2, digest2, digest2, "digest2");
    write_once!(set_digest3, digest3, digest3, "digest3");
    write_once!(set_signature, signature, signature, "signature");

    /// Read a value that an earlier step must have set.
    pub fn require<'a>(&self, value: Option<&'a str>, name: &str) -> Result<&'a str> {
        value.ok_or_else(|| Error::Context(format!("{name} not computed yet")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_are_write_once() {
        let ctx = SignatureContext::new(SignatureIdentity::new("abc", "now"), "inv1");
        assert_eq!(ctx.digest1(), None);
        ctx.set_digest1("d1".into()).unwrap();
        assert_eq!(ctx.digest1(), Some("d1"));
        assert!(matches!(
            ctx.set_digest1("other".into()),
            Err(Error::Context(_))
        ));
        assert_eq!(ctx.digest1(), Some("d1"));
        assert!(ctx.require(ctx.signature(), "signature").is_err());
    }

    #[test]
    fn test_signed_props_identifiers() {
        let identity = SignatureIdentity::new("1234", "now");
        assert_eq!(identity.signed_props_id(), "xmldsig-1234-signedprops");
        assert_eq!(identity.signed_props_uri(), "#xmldsig-1234-signedprops");
    }

    #[test]
    fn test_generated_identity() {
        let tz: Tz = "Asia/Krasnoyarsk".parse().unwrap();
        let a = SignatureIdentity::generate(&tz);
        let b = SignatureIdentity::generate(&tz);
        assert_ne!(a.signature_id, b.signature_id);
        assert!(Uuid::parse_str(&a.signature_id).is_ok());
        assert!(a.signing_time.ends_with("+07:00"), "{}", a.signing_time);
        assert!(chrono::DateTime::parse_from_rfc3339(&a.signing_time).is_ok());
    }
}
