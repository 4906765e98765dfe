//! Big-number limb encoding for the circuit's bignum library
//!
//! Integers wider than a field element are passed as 120-bit limbs, least
//! significant first, each rendered as a `0x`-prefixed hex string.

use num_bigint_dig::BigUint;
use num_traits::{One, Zero};

use crate::error::{ProverError, Result};

/// Width of a single limb.
pub const LIMB_BITS: usize = 120;

/// Limbs needed for a 2048-bit RSA value (`2048 / 120 + 1`).
pub const RSA_2048_LIMBS: usize = 18;

/// Extra headroom bits in the Barrett reduction parameter.
pub const BARRETT_OVERFLOW_BITS: usize = 4;

const LIMB_BYTES: usize = LIMB_BITS / 8;

/// Split `value` into exactly `num_limbs` limbs.
pub fn to_limbs(value: &BigUint, num_limbs: usize) -> Result<Vec<BigUint>> {
    if value.bits() > num_limbs * LIMB_BITS {
        return Err(ProverError::InputMismatch(format!(
            "{}-bit value does not fit in {} limbs of {} bits",
            value.bits(),
            num_limbs,
            LIMB_BITS
        )));
    }

    let le = value.to_bytes_le();
    let limbs = (0..num_limbs)
        .map(|i| {
            let start = i * LIMB_BYTES;
            if start >= le.len() {
                return BigUint::zero();
            }
            let end = usize::min(start + LIMB_BYTES, le.len());
            BigUint::from_bytes_le(&le[start..end])
        })
        .collect();
    Ok(limbs)
}

/// Limbs of `value` as hex strings.
pub fn to_limb_strings(value: &BigUint, num_limbs: usize) -> Result<Vec<String>> {
    Ok(to_limbs(value, num_limbs)?
        .iter()
        .map(|limb| format!("0x{}", limb.to_str_radix(16)))
        .collect())
}

/// `floor(2^(2k + overflow) / n)` where `k` is the bit length of `n`.
pub fn barrett_reduction_parameter(modulus: &BigUint) -> Result<BigUint> {
    if modulus.is_zero() {
        return Err(ProverError::InputMismatch(
            "modulus must be non-zero".to_string(),
        ));
    }
    let shift = 2 * modulus.bits() + BARRETT_OVERFLOW_BITS;
    Ok((BigUint::one() << shift) / modulus)
}

/// Limbs of the Barrett reduction parameter for `modulus`.
pub fn redc_limb_strings(modulus: &BigUint, num_limbs: usize) -> Result<Vec<String>> {
    to_limb_strings(&barrett_reduction_parameter(modulus)?, num_limbs)
}
