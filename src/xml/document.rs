//! Owned XML text, parsed on demand with `roxmltree`.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use quick_xml::Reader;
use quick_xml::events::Event;
use roxmltree::ParsingOptions;

use crate::xml::{Error, Result};

/// An owned, well-formed XML document.
///
/// To work with the tree, call [`XmlDocument::parse_doc`], which returns a
/// `roxmltree::Document` borrowing the text. Internal DTD entities are
/// expanded on every parse.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    text: String,
}

impl XmlDocument {
    /// Take ownership of `text` once it parses.
    pub fn parse(text: impl Into<String>) -> Result<Self> {
        let document = Self { text: text.into() };
        document.parse_doc()?;
        Ok(document)
    }

    /// Decode `bytes` with the encoding named by the byte order mark or the
    /// XML declaration, then parse.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::parse(decode(bytes)?.into_owned())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parse_doc(&self) -> Result<roxmltree::Document<'_>> {
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        Ok(roxmltree::Document::parse_with_options(&self.text, options)?)
    }
}

/// Decode raw document bytes to text.
///
/// A byte order mark wins over the declaration. Without either the bytes
/// must be UTF-8.
pub fn decode(bytes: &[u8]) -> Result<Cow<'_, str>> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((encoding, bom_len)) => (encoding, &bytes[bom_len..]),
        None => (declared_encoding(bytes)?, bytes),
    };
    let (text, malformed) = encoding.decode_without_bom_handling(body);
    if malformed {
        return Err(Error::Malformed(format!(
            "byte sequence not valid in {}",
            encoding.name()
        )));
    }
    Ok(text)
}

fn declared_encoding(bytes: &[u8]) -> Result<&'static Encoding> {
    let mut reader = Reader::from_reader(bytes);
    let label = match reader.read_event() {
        Ok(Event::Decl(decl)) => match decl.encoding() {
            Some(label) => label?.into_owned(),
            None => return Ok(UTF_8),
        },
        // No declaration, or one the parser will report later
        _ => return Ok(UTF_8),
    };
    Encoding::for_label(&label)
        .ok_or_else(|| Error::Encoding(String::from_utf8_lossy(&label).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // "Привет" in windows-1251
    const CP1251_GREETING: &[u8] = &[0xCF, 0xF0, 0xE8, 0xE2, 0xE5, 0xF2];

    #[test]
    fn test_parse_valid_document() {
        let doc = XmlDocument::parse("<r><a>1</a></r>").unwrap();
        let tree = doc.parse_doc().unwrap();
        assert_eq!(tree.root_element().tag_name().name(), "r");
        assert_eq!(doc.text(), "<r><a>1</a></r>");
    }

    #[test]
    fn test_parse_rejects_malformed_xml() {
        let err = XmlDocument::parse("<Invoice Id=\"inv1\">").unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }

    #[test]
    fn test_internal_entities_are_expanded() {
        let doc =
            XmlDocument::parse(r#"<!DOCTYPE r [<!ENTITY co "Acme Corp">]><r>&co;</r>"#).unwrap();
        let tree = doc.parse_doc().unwrap();
        assert_eq!(tree.root_element().text(), Some("Acme Corp"));
    }

    #[test]
    fn test_declared_windows_1251_is_decoded() {
        let mut bytes = br#"<?xml version="1.0" encoding="windows-1251"?><r>"#.to_vec();
        bytes.extend_from_slice(CP1251_GREETING);
        bytes.extend_from_slice(b"</r>");

        let doc = XmlDocument::from_bytes(&bytes).unwrap();
        let tree = doc.parse_doc().unwrap();
        assert_eq!(tree.root_element().text(), Some("Привет"));
    }

    #[test]
    fn test_byte_order_mark_wins() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(r#"<?xml version="1.0" encoding="windows-1251"?><r>é</r>"#.as_bytes());
        assert_eq!(
            decode(&bytes).unwrap(),
            r#"<?xml version="1.0" encoding="windows-1251"?><r>é</r>"#
        );
    }

    #[test]
    fn test_undeclared_document_must_be_utf8() {
        let mut bytes = b"<r>".to_vec();
        bytes.extend_from_slice(CP1251_GREETING);
        bytes.extend_from_slice(b"</r>");
        assert!(matches!(
            XmlDocument::from_bytes(&bytes),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_encoding_label() {
        let err = decode(br#"<?xml version="1.0" encoding="x-no-such"?><r/>"#).unwrap_err();
        assert!(matches!(err, Error::Encoding(label) if label == "x-no-such"));
    }
}
