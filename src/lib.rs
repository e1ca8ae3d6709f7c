pub mod config;
pub mod crypto;
pub mod telemetry;
pub mod xades;
pub mod xml;

#[cfg(test)]
mod test_utils;
