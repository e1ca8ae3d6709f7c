use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::{X509, X509NameBuilder};
use std::collections::HashMap;
use std::io::Write;
use tempfile::NamedTempFile;
use xades_signer::config::Config;
use xades_signer::telemetry;

pub const INVOICE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Invoice xmlns="urn:example:invoice" xmlns:c="urn:example:common" Id="inv1">
  <c:Number>42</c:Number>
  <Amount currency="RUB">100.00</Amount>
</Invoice>
"#;

// Helper function to write an RSA key and a self-signed certificate into one PEM file
pub fn write_key_file() -> (NamedTempFile, X509) {
    let pkey = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("C", "RU").unwrap();
    name.append_entry_by_text("O", "Integration Test").unwrap();
    name.append_entry_by_text("CN", "Signer").unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder
        .set_serial_number(&Asn1Integer::from_bn(&BigNum::from_u32(0xBEEF).unwrap()).unwrap())
        .unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder
        .set_not_before(Asn1Time::days_from_now(0).unwrap().as_ref())
        .unwrap();
    builder
        .set_not_after(Asn1Time::days_from_now(30).unwrap().as_ref())
        .unwrap();
    builder.set_pubkey(&pkey).unwrap();
    builder.sign(&pkey, MessageDigest::sha256()).unwrap();
    let cert = builder.build();

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&pkey.private_key_to_pem_pkcs8().unwrap())
        .unwrap();
    file.write_all(&cert.to_pem().unwrap()).unwrap();
    file.flush().unwrap();
    (file, cert)
}

// Configuration with the given overrides and no system environment
pub fn config(overrides: &[(&str, &str)]) -> Config {
    telemetry::init_tracing();

    let vars: HashMap<String, String> = overrides
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::load_with_sources(Some(vars)).unwrap()
}

pub fn openssl_available() -> bool {
    std::process::Command::new("openssl")
        .arg("version")
        .output()
        .is_ok_and(|out| out.status.success())
}
