#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed XML: {0}")]
    Malformed(String),

    #[error("Unsupported document encoding: {0}")]
    Encoding(String),

    #[error("Unbound namespace prefix: {0}")]
    UnboundPrefix(String),
}

impl From<roxmltree::Error> for Error {
    fn from(err: roxmltree::Error) -> Self {
        Error::Malformed(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Malformed(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::Malformed(err.to_string())
    }
}
