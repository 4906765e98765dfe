//! Circuit input construction
//!
//! Reshapes a verified QR payload into the fixed layout the compiled circuit
//! reads: a 1200-byte padded buffer, the first 18 delimiter offsets, RSA
//! limbs, reveal flags and the signal hash.

use num_bigint_dig::BigUint;
use serde::{Deserialize, Deserializer, Serialize};

use crate::abi::{field_modulus, parse_number};
use crate::cert::{public_key_modulus, TrustRoots};
use crate::error::{ProverError, Result};
use crate::limbs::{redc_limb_strings, to_limb_strings, RSA_2048_LIMBS};
use crate::qr::QrData;
use crate::signal::hash_signal;

/// Capacity of the circuit's signed-data buffer.
pub const QR_DATA_BUFFER_LEN: usize = 1200;

/// Byte separating fields in the signed data.
pub const DELIMITER: u8 = 255;

/// Delimiter offsets the circuit takes.
pub const DELIMITER_COUNT: usize = 18;

/// Caller choices for a single proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofOptions {
    /// Check the QR signature against the testing certificate.
    pub use_testing_key: bool,
    /// BN254 field element, decimal or `0x` hex. JSON numbers are accepted too.
    #[serde(deserialize_with = "seed_from_json")]
    pub nullifier_seed: String,
    pub reveal_gender: bool,
    pub reveal_age_above18: bool,
    pub reveal_pin_code: bool,
    pub reveal_state: bool,
    /// Application context bound into the proof.
    pub signal: String,
}

/// Fixed-capacity byte vector, laid out as the circuit's `BoundedVec<u8, 1200>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedBytes {
    pub len: usize,
    pub storage: Vec<String>,
}

/// Everything the circuit's `main` takes, keyed by its parameter names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitInput {
    #[serde(rename = "qrDataPadded")]
    pub qr_data_padded: BoundedBytes,
    #[serde(rename = "qrDataPaddedLength")]
    pub qr_data_padded_length: String,
    #[serde(rename = "nullifierSeed")]
    pub nullifier_seed: String,
    #[serde(rename = "delimiterIndices")]
    pub delimiter_indices: Vec<String>,
    pub signature_limbs: Vec<String>,
    pub modulus_limbs: Vec<String>,
    pub redc_limbs: Vec<String>,
    #[serde(rename = "revealGender")]
    pub reveal_gender: String,
    #[serde(rename = "revealAgeAbove18")]
    pub reveal_age_above18: String,
    #[serde(rename = "revealPinCode")]
    pub reveal_pin_code: String,
    #[serde(rename = "revealState")]
    pub reveal_state: String,
    #[serde(rename = "signalHash")]
    pub signal_hash: String,
}

impl CircuitInput {
    /// Verify `payload` against the selected trust root and build the input.
    pub fn from_qr_payload(
        payload: &str,
        options: &ProofOptions,
        roots: &TrustRoots,
    ) -> Result<Self> {
        let qr = QrData::decode(payload)?;
        let certificate = qr.verify_signature(roots, options.use_testing_key)?;
        let modulus = public_key_modulus(certificate)?;
        Self::from_parts(&qr, &modulus, options)
    }

    /// Build the input from an already verified payload and its signer's modulus.
    pub fn from_parts(qr: &QrData, modulus: &BigUint, options: &ProofOptions) -> Result<Self> {
        let nullifier_seed = nullifier_seed(&options.nullifier_seed)?;
        let signed_data = qr.signed_data();
        let padded = pad_signed_data(signed_data)?;
        let delimiters = delimiter_indices(&padded)?;

        let signature = BigUint::from_bytes_be(qr.signature());
        let signature_limbs = to_limb_strings(&signature, RSA_2048_LIMBS)?;
        let modulus_limbs = to_limb_strings(modulus, RSA_2048_LIMBS)?;
        let redc_limbs = redc_limb_strings(modulus, RSA_2048_LIMBS)?;

        tracing::debug!(
            "Circuit input: signed_len={} delimiters={} limbs={}",
            signed_data.len(),
            delimiters.len(),
            modulus_limbs.len()
        );

        Ok(Self {
            qr_data_padded: BoundedBytes {
                len: signed_data.len(),
                storage: padded.iter().map(|b| b.to_string()).collect(),
            },
            qr_data_padded_length: signed_data.len().to_string(),
            nullifier_seed,
            delimiter_indices: delimiters.iter().map(|i| i.to_string()).collect(),
            signature_limbs,
            modulus_limbs,
            redc_limbs,
            reveal_gender: reveal_flag(options.reveal_gender).to_string(),
            reveal_age_above18: reveal_flag(options.reveal_age_above18).to_string(),
            reveal_pin_code: reveal_flag(options.reveal_pin_code).to_string(),
            reveal_state: reveal_flag(options.reveal_state).to_string(),
            signal_hash: hash_signal(&options.signal)?,
        })
    }
}

/// Parse a seed into a decimal field element.
pub fn nullifier_seed(seed: &str) -> Result<String> {
    let value = parse_number(seed.trim()).ok_or_else(|| {
        ProverError::InputMismatch(format!("nullifier seed '{}' is not a number", seed))
    })?;
    if value >= field_modulus() {
        return Err(ProverError::InputMismatch(
            "nullifier seed exceeds the BN254 scalar field".to_string(),
        ));
    }
    Ok(value.to_str_radix(10))
}

fn seed_from_json<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seed {
        Number(u64),
        Text(String),
    }

    Ok(match Seed::deserialize(deserializer)? {
        Seed::Number(n) => n.to_string(),
        Seed::Text(s) => s,
    })
}

/// Zero-pad `signed_data` into the circuit's fixed buffer.
pub fn pad_signed_data(signed_data: &[u8]) -> Result<Vec<u8>> {
    if signed_data.len() > QR_DATA_BUFFER_LEN {
        return Err(ProverError::SignedDataTooLarge {
            len: signed_data.len(),
            max: QR_DATA_BUFFER_LEN,
        });
    }
    let mut padded = vec![0u8; QR_DATA_BUFFER_LEN];
    padded[..signed_data.len()].copy_from_slice(signed_data);
    Ok(padded)
}

/// Offsets of the first (up to) 18 delimiter bytes, ascending.
pub fn scan_delimiters(buffer: &[u8]) -> Vec<usize> {
    buffer
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == DELIMITER)
        .map(|(i, _)| i)
        .take(DELIMITER_COUNT)
        .collect()
}

/// Like [`scan_delimiters`], but a short list is an error.
pub fn delimiter_indices(buffer: &[u8]) -> Result<Vec<usize>> {
    let indices = scan_delimiters(buffer);
    if indices.len() < DELIMITER_COUNT {
        return Err(ProverError::MissingDelimiters {
            found: indices.len(),
            expected: DELIMITER_COUNT,
        });
    }
    Ok(indices)
}

pub fn reveal_flag(reveal: bool) -> &'static str {
    if reveal {
        "1"
    } else {
        "0"
    }
}
