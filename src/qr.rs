//! Secure QR payload decoding and local signature check
//!
//! A scanned QR code yields a (very long) decimal number. Its big-endian byte
//! representation is a gzip or zlib stream; once inflated, the last 256 bytes
//! are an RSA PKCS#1 v1.5 / SHA-256 signature over everything before them.

use std::io::Read;

use flate2::read::{GzDecoder, ZlibDecoder};
use num_bigint_dig::BigUint;
use rsa::Pkcs1v15Sign;
use sha2::{Digest, Sha256};

use crate::cert::{rsa_public_key, TrustRoots};
use crate::error::{ProverError, Result};

/// Length of the trailing RSA-2048 signature.
pub const SIGNATURE_LEN: usize = 256;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decompressed QR bytes, split into signed region and signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QrData {
    bytes: Vec<u8>,
}

impl QrData {
    /// Decode the numeric string produced by a QR scanner.
    pub fn decode(payload: &str) -> Result<Self> {
        let compressed = payload_to_bytes(payload)?;
        tracing::debug!("QR payload: {} compressed bytes", compressed.len());

        let bytes = inflate(&compressed)?;
        tracing::debug!("QR payload: {} decompressed bytes", bytes.len());

        Self::from_bytes(bytes)
    }

    /// Wrap already-decompressed bytes. Anything not longer than the
    /// signature is rejected, so the signed part is never empty.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() <= SIGNATURE_LEN {
            return Err(ProverError::PayloadTooShort {
                len: bytes.len(),
                signature_len: SIGNATURE_LEN,
            });
        }
        Ok(Self { bytes })
    }

    /// Everything the signature covers: the first `len - 256` bytes.
    pub fn signed_data(&self) -> &[u8] {
        &self.bytes[..self.bytes.len() - SIGNATURE_LEN]
    }

    /// The trailing 256-byte signature.
    pub fn signature(&self) -> &[u8] {
        &self.bytes[self.bytes.len() - SIGNATURE_LEN..]
    }

    /// Check the signature against the selected trust root and return the
    /// certificate that vouched for it.
    pub fn verify_signature<'a>(
        &self,
        roots: &'a TrustRoots,
        use_testing_key: bool,
    ) -> Result<&'a str> {
        let certificate = roots.select(use_testing_key);
        let public_key = rsa_public_key(certificate)?;

        let hash = Sha256::digest(self.signed_data());
        public_key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &hash, self.signature())
            .map_err(|e| {
                tracing::warn!(
                    "QR signature rejected (testing key: {}): {}",
                    use_testing_key,
                    e
                );
                ProverError::SignatureVerificationFailed(e.to_string())
            })?;

        tracing::info!("QR signature verified (testing key: {})", use_testing_key);
        Ok(certificate)
    }
}

fn payload_to_bytes(payload: &str) -> Result<Vec<u8>> {
    let digits = payload.trim();
    if digits.is_empty() {
        return Err(ProverError::InvalidQrPayload("payload is empty".to_string()));
    }
    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_digit()) {
        return Err(ProverError::InvalidQrPayload(format!(
            "unexpected character {:?}, payload must be decimal",
            bad
        )));
    }

    let value = BigUint::parse_bytes(digits.as_bytes(), 10)
        .ok_or_else(|| ProverError::InvalidQrPayload("not a decimal number".to_string()))?;
    Ok(value.to_bytes_be())
}

fn inflate(compressed: &[u8]) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let outcome = if compressed.starts_with(&GZIP_MAGIC) {
        GzDecoder::new(compressed).read_to_end(&mut bytes)
    } else {
        ZlibDecoder::new(compressed).read_to_end(&mut bytes)
    };
    outcome.map_err(|e| ProverError::Decompression(e.to_string()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_QR: &str = include_str!("../tests/fixtures/sample_qr.txt");
    const SAMPLE_QR_GZIP: &str = include_str!("../tests/fixtures/sample_qr_gzip.txt");
    const SAMPLE_SIGNED_LEN: &str = include_str!("../tests/fixtures/sample_signed_len.txt");
    const TESTING_CERT: &str = include_str!("../tests/fixtures/testing_cert.pem");
    const PRODUCTION_CERT: &str = include_str!("../tests/fixtures/production_cert.pem");

    fn signed_len() -> usize {
        SAMPLE_SIGNED_LEN.trim().parse().unwrap()
    }

    #[test]
    fn test_decode_splits_signature() {
        let qr = QrData::decode(SAMPLE_QR).unwrap();
        assert_eq!(qr.bytes.len(), signed_len() + SIGNATURE_LEN);
        assert_eq!(qr.signed_data().len(), signed_len());
        assert_eq!(qr.signature().len(), SIGNATURE_LEN);
        assert!(qr.signed_data().starts_with(b"V2\xff"));
    }

    #[test]
    fn test_gzip_and_zlib_agree() {
        let zlib = QrData::decode(SAMPLE_QR).unwrap();
        let gzip = QrData::decode(SAMPLE_QR_GZIP).unwrap();
        assert_eq!(zlib, gzip);
    }

    #[test]
    fn test_non_decimal_payload() {
        let result = QrData::decode("12a45");
        assert!(matches!(result, Err(ProverError::InvalidQrPayload(_))));

        let result = QrData::decode("   ");
        assert!(matches!(result, Err(ProverError::InvalidQrPayload(_))));
    }

    #[test]
    fn test_not_compressed_payload() {
        let result = QrData::decode("123456789");
        assert!(matches!(result, Err(ProverError::Decompression(_))));
    }

    #[test]
    fn test_too_short_for_signature() {
        let result = QrData::from_bytes(vec![7u8; SIGNATURE_LEN]);
        assert!(matches!(
            result,
            Err(ProverError::PayloadTooShort { len: 256, .. })
        ));

        let qr = QrData::from_bytes(vec![7u8; SIGNATURE_LEN + 1]).unwrap();
        assert_eq!(qr.signed_data(), &[7u8][..]);
    }

    #[test]
    fn test_signature_verifies_with_testing_key() {
        let qr = QrData::decode(SAMPLE_QR).unwrap();
        let roots = TrustRoots::new(PRODUCTION_CERT, TESTING_CERT);
        let certificate = qr.verify_signature(&roots, true).unwrap();
        assert_eq!(certificate, TESTING_CERT);
    }

    #[test]
    fn test_signature_rejected_by_production_key() {
        let qr = QrData::decode(SAMPLE_QR).unwrap();
        let roots = TrustRoots::new(PRODUCTION_CERT, TESTING_CERT);
        let result = qr.verify_signature(&roots, false);
        assert!(matches!(
            result,
            Err(ProverError::SignatureVerificationFailed(_))
        ));
    }

    #[test]
    fn test_tampered_signed_data_rejected() {
        let qr = QrData::decode(SAMPLE_QR).unwrap();
        let mut bytes = qr.bytes.clone();
        bytes[3] ^= 0x01;
        let tampered = QrData::from_bytes(bytes).unwrap();
        let roots = TrustRoots::new(PRODUCTION_CERT, TESTING_CERT);
        assert!(tampered.verify_signature(&roots, true).is_err());
    }
}
