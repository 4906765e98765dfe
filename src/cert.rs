//! Signing-authority certificates and RSA modulus extraction

use std::path::Path;

use num_bigint_dig::BigUint;
use rsa::RsaPublicKey;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

use crate::config::ProverConfig;
use crate::error::{ProverError, Result};

/// Raw RSA components read from a certificate's SubjectPublicKeyInfo.
struct RsaComponents {
    modulus: BigUint,
    exponent: BigUint,
}

fn rsa_components(certificate_pem: &str) -> Result<RsaComponents> {
    let (_, pem) = parse_x509_pem(certificate_pem.as_bytes())
        .map_err(|e| ProverError::InvalidCertificate(format!("Failed to parse PEM: {}", e)))?;

    let (_, cert) = X509Certificate::from_der(&pem.contents).map_err(|e| {
        ProverError::InvalidCertificate(format!("Failed to parse certificate: {}", e))
    })?;

    tracing::debug!("Certificate subject: {}", cert.subject());
    tracing::debug!("Certificate issuer: {}", cert.issuer());

    match cert.public_key().parsed()? {
        PublicKey::RSA(key) => Ok(RsaComponents {
            modulus: BigUint::from_bytes_be(key.modulus),
            exponent: BigUint::from_bytes_be(key.exponent),
        }),
        other => Err(ProverError::UnsupportedPublicKey(format!(
            "expected RSA public key, found {}",
            key_kind(&other)
        ))),
    }
}

fn key_kind(key: &PublicKey<'_>) -> &'static str {
    match key {
        PublicKey::RSA(_) => "RSA",
        PublicKey::EC(_) => "EC",
        PublicKey::DSA(_) => "DSA",
        _ => "unknown",
    }
}

/// Read the RSA modulus out of a PEM-encoded X.509 certificate.
pub fn public_key_modulus(certificate_pem: &str) -> Result<BigUint> {
    let modulus = rsa_components(certificate_pem)?.modulus;
    tracing::debug!("Extracted RSA modulus: {} bits", modulus.bits());
    Ok(modulus)
}

/// Build an `RsaPublicKey` usable for PKCS#1 v1.5 verification.
pub fn rsa_public_key(certificate_pem: &str) -> Result<RsaPublicKey> {
    let RsaComponents { modulus, exponent } = rsa_components(certificate_pem)?;
    RsaPublicKey::new(modulus, exponent)
        .map_err(|e| ProverError::UnsupportedPublicKey(format!("Invalid RSA key: {}", e)))
}

/// The two certificates a QR signature may be checked against.
#[derive(Clone, Debug)]
pub struct TrustRoots {
    production: String,
    testing: String,
}

impl TrustRoots {
    pub fn new(production: impl Into<String>, testing: impl Into<String>) -> Self {
        Self {
            production: production.into(),
            testing: testing.into(),
        }
    }

    /// Load both certificates from the paths named in the configuration.
    pub fn load(config: &ProverConfig) -> Result<Self> {
        Ok(Self::new(
            read_certificate(&config.production_certificate)?,
            read_certificate(&config.testing_certificate)?,
        ))
    }

    /// Pick the certificate a payload is expected to be signed under.
    pub fn select(&self, use_testing_key: bool) -> &str {
        if use_testing_key {
            &self.testing
        } else {
            &self.production
        }
    }
}

fn read_certificate(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        ProverError::InvalidCertificate(format!(
            "Failed to read certificate at {}: {}",
            path.display(),
            e
        ))
    })
}
