use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::{X509, X509NameBuilder};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// A PEM key file holding an RSA private key followed by its certificate.
pub struct KeyFile {
    file: NamedTempFile,
    cert: X509,
}

impl KeyFile {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn certificate(&self) -> &X509 {
        &self.cert
    }

    pub fn certificate_der(&self) -> Vec<u8> {
        self.cert.to_der().unwrap()
    }
}

/// Self-signed RSA certificate with serial 0x1234 and issuer
/// `C=RU, O=Acme, "Inc", CN=Test CA, emailAddress=ca@example.com`.
pub fn write_key_file() -> KeyFile {
    let rsa = Rsa::generate(2048).unwrap();
    let pkey = PKey::from_rsa(rsa).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("C", "RU").unwrap();
    name.append_entry_by_text("O", "Acme, \"Inc\"").unwrap();
    name.append_entry_by_text("CN", "Test CA").unwrap();
    name.append_entry_by_text("emailAddress", "ca@example.com")
        .unwrap();
    let name = name.build();

    let serial = Asn1Integer::from_bn(&BigNum::from_u32(0x1234).unwrap()).unwrap();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder
        .set_not_before(Asn1Time::days_from_now(0).unwrap().as_ref())
        .unwrap();
    builder
        .set_not_after(Asn1Time::days_from_now(365).unwrap().as_ref())
        .unwrap();
    builder.set_pubkey(&pkey).unwrap();
    builder.sign(&pkey, MessageDigest::sha256()).unwrap();
    let cert = builder.build();

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&pkey.private_key_to_pem_pkcs8().unwrap())
        .unwrap();
    file.write_all(&cert.to_pem().unwrap()).unwrap();
    file.flush().unwrap();

    KeyFile { file, cert }
}

/// A key file with only the private key.
pub fn write_key_without_certificate() -> NamedTempFile {
    let rsa = Rsa::generate(2048).unwrap();
    let pkey = PKey::from_rsa(rsa).unwrap();
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&pkey.private_key_to_pem_pkcs8().unwrap())
        .unwrap();
    file.flush().unwrap();
    file
}
