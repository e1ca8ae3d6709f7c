//! XML parsing, element lookups and canonicalization used by the signer.
//!
//! Documents are parsed with `roxmltree`. Canonicalization renders the
//! parsed nodes itself and applies [`Rewrites`] for the changes a read-only
//! tree cannot hold.

pub mod c14n;
pub mod document;
mod error;
pub mod lookup;

pub use c14n::{C14nMode, Rewrites, canonical_string, canonicalize, canonicalize_with};
pub use document::{XmlDocument, decode};
pub use error::Error;
pub use lookup::{
    NamespaceMap, child_elements_named, elements_named, elements_with_attribute, has_name,
};

pub type Result<T> = std::result::Result<T, Error>;

pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
}
