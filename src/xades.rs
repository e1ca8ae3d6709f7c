//! XAdES-BES enveloped signatures.
//!
//! A [`XadesSigner`] takes a [`SigningRequest`] and returns the canonical
//! signed document. The XAdES block comes from a [`XadesTemplate`] and is
//! inserted as the first child of the signed element.

mod context;
mod error;
mod signer;
mod template;


pub use context::{SignatureContext, SignatureIdentity, SigningRequest};
pub use error::Error;
pub use signer::XadesSigner;
pub use template::{XadesFields, XadesTemplate};

pub type Result<T> = std::result::Result<T, Error>;

pub mod ns {
    pub const DS: &str = "http://www.w3.org/2000/09/xmldsig#";
    pub const XADES: &str = "http://uri.etsi.org/01903/v1.3.2#";
}
