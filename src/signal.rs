//! Signal hashing
//!
//! Binds a proof to an application context. Numeric signals are hashed over
//! their 32-byte big-endian encoding (two's complement when negative); any
//! other string over its UTF-8 bytes.
//! The keccak-256 digest is shifted right by 8 bits so the result always fits
//! in the BN254 scalar field.

use num_bigint_dig::BigUint;
use num_traits::Zero;
use sha3::{Digest, Keccak256};

use crate::error::{ProverError, Result};

/// Hash `signal` into a decimal field-element string.
pub fn hash_signal(signal: &str) -> Result<String> {
    let preimage = match parse_numeric(signal) {
        Some((negative, magnitude)) => numeric_word(negative, &magnitude)?.to_vec(),
        None => signal.as_bytes().to_vec(),
    };

    let digest = Keccak256::digest(&preimage);
    let hash = BigUint::from_bytes_be(&digest) >> 8usize;
    Ok(hash.to_str_radix(10))
}

/// 256-bit big-endian word for a numeric signal.
fn numeric_word(negative: bool, magnitude: &BigUint) -> Result<[u8; 32]> {
    let modulus = BigUint::from(1u32) << 256usize;
    let value = if negative && !magnitude.is_zero() {
        if magnitude > &(BigUint::from(1u32) << 255usize) {
            return Err(ProverError::InputMismatch(
                "negative signal does not fit in 256-bit two's complement".to_string(),
            ));
        }
        &modulus - magnitude
    } else {
        magnitude.clone()
    };

    let bytes = value.to_bytes_be();
    if bytes.len() > 32 {
        return Err(ProverError::InputMismatch(format!(
            "numeric signal is {} bytes, must fit in 32",
            bytes.len()
        )));
    }
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(word)
}

/// Sign and magnitude of a decimal or `0x` hex signal, `None` for text.
fn parse_numeric(signal: &str) -> Option<(bool, BigUint)> {
    let trimmed = signal.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return BigUint::parse_bytes(hex.as_bytes(), 16).map(|v| (negative, v));
        }
        return None;
    }
    if !unsigned.is_empty() && unsigned.chars().all(|c| c.is_ascii_digit()) {
        return BigUint::parse_bytes(unsigned.as_bytes(), 10).map(|v| (negative, v));
    }
    None
}
