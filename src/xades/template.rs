//! The XAdES block template and its `{slot}` renderer.

use quick_xml::escape::escape;
use std::path::Path;

use crate::xades::{Error, Result};

const DEFAULT_TEMPLATE: &str = include_str!("../../templates/xades.xml");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    SignedId,
    SignatureId,
    SigningTime,
    IssuerName,
    SerialNumber,
    Digest1,
    Digest2,
    Digest3,
    SignatureValue,
    Certificate,
    DigestMethod,
    SignatureMethod,
}

impl Slot {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "signed_id" => Slot::SignedId,
            "signature_id" => Slot::SignatureId,
            "signing_time" => Slot::SigningTime,
            "x509_issuer_name" => Slot::IssuerName,
            "x509_sn" => Slot::SerialNumber,
            "digest1" => Slot::Digest1,
            "digest2" => Slot::Digest2,
            "digest3" => Slot::Digest3,
            "signature_value" => Slot::SignatureValue,
            "x590_cert" => Slot::Certificate,
            "digest_method" => Slot::DigestMethod,
            "signature_method" => Slot::SignatureMethod,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(Slot),
}

/// Values substituted into the template.
///
/// `digest3` and `signature_value` are computed after the block is embedded,
/// so the first render leaves them empty.
#[derive(Debug, Clone, Default)]
pub struct XadesFields<'a> {
    pub signed_id: &'a str,
    pub signature_id: &'a str,
    pub signing_time: &'a str,
    pub x509_issuer_name: &'a str,
    pub x509_sn: &'a str,
    pub digest1: &'a str,
    pub digest2: &'a str,
    pub digest3: Option<&'a str>,
    pub signature_value: Option<&'a str>,
    pub x509_cert: &'a str,
    pub digest_method: &'a str,
    pub signature_method: &'a str,
}

impl XadesFields<'_> {
    fn value(&self, slot: Slot) -> &str {
        match slot {
            Slot::SignedId => self.signed_id,
            Slot::SignatureId => self.signature_id,
            Slot::SigningTime => self.signing_time,
            Slot::IssuerName => self.x509_issuer_name,
            Slot::SerialNumber => self.x509_sn,
            Slot::Digest1 => self.digest1,
            Slot::Digest2 => self.digest2,
            Slot::Digest3 => self.digest3.unwrap_or_default(),
            Slot::SignatureValue => self.signature_value.unwrap_or_default(),
            Slot::Certificate => self.x509_cert,
            Slot::DigestMethod => self.digest_method,
            Slot::SignatureMethod => self.signature_method,
        }
    }
}

/// A parsed template: literal XML text interleaved with slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XadesTemplate {
    segments: Vec<Segment>,
}

impl XadesTemplate {
    /// The template shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::new(DEFAULT_TEMPLATE)
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let source = tokio::fs::read_to_string(path).await?;
        Self::new(&source)
    }

    pub fn new(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(open) = rest.find(['{', '}']) {
            if rest[open..].starts_with('}') {
                return Err(Error::Template(format!(
                    "unmatched '}}' at {:?}",
                    excerpt(&rest[open..])
                )));
            }
            let close = rest[open..].find('}').map(|i| open + i).ok_or_else(|| {
                Error::Template(format!("unclosed slot {:?}", excerpt(&rest[open..])))
            })?;
            let name = &rest[open + 1..close];
            let slot = Slot::from_name(name)
                .ok_or_else(|| Error::Template(format!("unknown slot {{{name}}}")))?;

            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            segments.push(Segment::Slot(slot));
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Substitute `fields`, XML-escaping every value.
    pub fn render(&self, fields: &XadesFields<'_>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(slot) => out.push_str(&escape(fields.value(*slot))),
            }
        }
        out.trim().to_string()
    }
}

fn excerpt(s: &str) -> &str {
    let end = s.char_indices().nth(24).map_or(s.len(), |(i, _)| i);
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::XmlDocument;

    fn fields() -> XadesFields<'static> {
        XadesFields {
            signed_id: "inv1",
            signature_id: "sig",
            signing_time: "2024-01-01T00:00:00+07:00",
            x509_issuer_name: r#"cn=Acme\, "Inc""#,
            x509_sn: "4660",
            digest1: "ZDE=",
            digest2: "ZDI=",
            x509_cert: "MIIB",
            digest_method: "urn:digest",
            signature_method: "urn:signature",
            ..Default::default()
        }
    }

    #[test]
    fn test_render_substitutes_and_escapes() {
        let template = XadesTemplate::new(r#"<a id="{signed_id}">{x509_issuer_name}|{digest3}</a>"#)
            .unwrap();
        assert_eq!(
            template.render(&fields()),
            r#"<a id="inv1">cn=Acme\, &quot;Inc&quot;|</a>"#
        );

        let with_digest3 = XadesFields {
            digest3: Some("ZDM="),
            ..fields()
        };
        assert_eq!(
            template.render(&with_digest3),
            r#"<a id="inv1">cn=Acme\, &quot;Inc&quot;|ZDM=</a>"#
        );
    }

    #[test]
    fn test_unknown_slot_is_rejected() {
        assert!(matches!(
            XadesTemplate::new("<a>{nope}</a>"),
            Err(Error::Template(_))
        ));
        assert!(matches!(
            XadesTemplate::new("<a>{digest1</a>"),
            Err(Error::Template(_))
        ));
        assert!(matches!(
            XadesTemplate::new("<a>}</a>"),
            Err(Error::Template(_))
        ));
    }

    #[test]
    fn test_builtin_template_renders_well_formed_xml() {
        let template = XadesTemplate::builtin().unwrap();

        let rendered = template.render(&fields());
        let doc = XmlDocument::parse(rendered.as_str()).unwrap();
        let tree = doc.parse_doc().unwrap();
        assert_eq!(tree.root_element().attribute("Id"), Some("xmldsig-sig"));
        assert!(rendered.contains(r##"URI="#inv1""##));
        assert!(rendered.contains(r#"Id="xmldsig-sig-signedprops""#));
        assert!(rendered.contains("<ds:DigestValue></ds:DigestValue>"));
        assert!(rendered.contains(r#"Algorithm="urn:digest""#));
    }

    #[tokio::test]
    async fn test_template_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("xades.xml");
        std::fs::write(&path, "<x>{signature_id}</x>\n").unwrap();

        let template = XadesTemplate::from_file(&path).await.unwrap();
        assert_eq!(template.render(&fields()), "<x>sig</x>");
    }
}
