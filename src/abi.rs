//! Noir ABI model and input flattening
//!
//! The compiled circuit JSON describes `main`'s parameters. Witness inputs are
//! handed to the backend as one flat list of decimal field strings, in
//! parameter order with arrays, structs and tuples expanded depth-first.

use num_bigint_dig::BigUint;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ProverError, Result};

/// Order of the BN254 scalar field.
const BN254_MODULUS: &str =
    "21888242871839275222246405745257275088548364400416034343698204186575808495617";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Abi {
    pub parameters: Vec<AbiParameter>,
    #[serde(default)]
    pub return_type: Option<AbiReturnType>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct AbiParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: AbiType,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct AbiReturnType {
    pub abi_type: AbiType,
    pub visibility: Visibility,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Databus,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    Unsigned,
    Signed,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct AbiField {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: AbiType,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AbiType {
    Field,
    Boolean,
    Integer {
        sign: Sign,
        width: u32,
    },
    Array {
        length: usize,
        #[serde(rename = "type")]
        typ: Box<AbiType>,
    },
    String {
        length: usize,
    },
    Struct {
        path: String,
        fields: Vec<AbiField>,
    },
    Tuple {
        fields: Vec<AbiType>,
    },
}

impl AbiType {
    /// Number of field elements this type occupies.
    pub fn field_count(&self) -> usize {
        match self {
            AbiType::Field | AbiType::Boolean | AbiType::Integer { .. } => 1,
            AbiType::Array { length, typ } => length * typ.field_count(),
            AbiType::String { length } => *length,
            AbiType::Struct { fields, .. } => fields.iter().map(|f| f.typ.field_count()).sum(),
            AbiType::Tuple { fields } => fields.iter().map(AbiType::field_count).sum(),
        }
    }
}

impl Abi {
    /// Field elements the backend prepends to a proof as public inputs.
    pub fn public_input_count(&self) -> usize {
        let params: usize = self
            .parameters
            .iter()
            .filter(|p| p.visibility == Visibility::Public)
            .map(|p| p.typ.field_count())
            .sum();
        let returns = self
            .return_type
            .as_ref()
            .filter(|r| r.visibility == Visibility::Public)
            .map_or(0, |r| r.abi_type.field_count());
        params + returns
    }

    /// Total witness inputs `main` takes.
    pub fn input_count(&self) -> usize {
        self.parameters.iter().map(|p| p.typ.field_count()).sum()
    }

    /// Flatten a JSON object keyed by parameter name into decimal strings.
    pub fn flatten(&self, inputs: &Value) -> Result<Vec<String>> {
        let object = inputs.as_object().ok_or_else(|| {
            ProverError::InputMismatch("circuit input must be a JSON object".to_string())
        })?;

        let mut out = Vec::with_capacity(self.input_count());
        for param in &self.parameters {
            let value = object.get(&param.name).ok_or_else(|| {
                ProverError::InputMismatch(format!("missing parameter '{}'", param.name))
            })?;
            flatten_value(&param.typ, value, &param.name, &mut out)?;
        }
        Ok(out)
    }
}

fn flatten_value(typ: &AbiType, value: &Value, path: &str, out: &mut Vec<String>) -> Result<()> {
    match typ {
        AbiType::Field => {
            let v = scalar(value, path)?;
            if v >= field_modulus() {
                return Err(mismatch(path, "value exceeds the BN254 scalar field"));
            }
            out.push(v.to_str_radix(10));
        }
        AbiType::Boolean => {
            let bit = match value {
                Value::Bool(b) => *b,
                _ => match scalar(value, path)? {
                    v if v == BigUint::from(0u32) => false,
                    v if v == BigUint::from(1u32) => true,
                    _ => return Err(mismatch(path, "boolean must be 0 or 1")),
                },
            };
            out.push(if bit { "1" } else { "0" }.to_string());
        }
        AbiType::Integer { sign, width } => {
            out.push(integer(value, *sign, *width as usize, path)?);
        }
        AbiType::Array { length, typ } => {
            let items = value
                .as_array()
                .ok_or_else(|| mismatch(path, "expected an array"))?;
            if items.len() != *length {
                return Err(mismatch(
                    path,
                    &format!("expected {} elements, got {}", length, items.len()),
                ));
            }
            for (i, item) in items.iter().enumerate() {
                flatten_value(typ, item, &format!("{}[{}]", path, i), out)?;
            }
        }
        AbiType::String { length } => {
            let s = value
                .as_str()
                .ok_or_else(|| mismatch(path, "expected a string"))?;
            if s.len() != *length {
                return Err(mismatch(
                    path,
                    &format!("expected {} bytes, got {}", length, s.len()),
                ));
            }
            out.extend(s.bytes().map(|b| b.to_string()));
        }
        AbiType::Struct { fields, .. } => {
            let object = value
                .as_object()
                .ok_or_else(|| mismatch(path, "expected an object"))?;
            for field in fields {
                let member = object.get(&field.name).ok_or_else(|| {
                    mismatch(path, &format!("missing field '{}'", field.name))
                })?;
                flatten_value(&field.typ, member, &format!("{}.{}", path, field.name), out)?;
            }
        }
        AbiType::Tuple { fields } => {
            let items = value
                .as_array()
                .ok_or_else(|| mismatch(path, "expected a tuple"))?;
            if items.len() != fields.len() {
                return Err(mismatch(
                    path,
                    &format!("expected {} members, got {}", fields.len(), items.len()),
                ));
            }
            for (i, (typ, item)) in fields.iter().zip(items).enumerate() {
                flatten_value(typ, item, &format!("{}.{}", path, i), out)?;
            }
        }
    }
    Ok(())
}

fn integer(value: &Value, sign: Sign, width: usize, path: &str) -> Result<String> {
    let (negative, magnitude) = match value {
        Value::Number(n) if n.as_i64().map_or(false, |v| v < 0) => {
            (true, BigUint::from(n.as_i64().unwrap_or_default().unsigned_abs()))
        }
        Value::String(s) if s.trim().starts_with('-') => {
            let digits = s.trim().trim_start_matches('-');
            let v = parse_number(digits).ok_or_else(|| mismatch(path, "not a number"))?;
            (true, v)
        }
        _ => (false, scalar(value, path)?),
    };

    let one = BigUint::from(1u32);
    match (sign, negative) {
        (Sign::Unsigned, true) => Err(mismatch(path, "unsigned integer cannot be negative")),
        (Sign::Unsigned, false) => {
            if magnitude.bits() > width {
                return Err(mismatch(path, &format!("does not fit in u{}", width)));
            }
            Ok(magnitude.to_str_radix(10))
        }
        (Sign::Signed, false) => {
            if magnitude >= (one << (width - 1)) {
                return Err(mismatch(path, &format!("does not fit in i{}", width)));
            }
            Ok(magnitude.to_str_radix(10))
        }
        (Sign::Signed, true) => {
            if magnitude > (one.clone() << (width - 1)) {
                return Err(mismatch(path, &format!("does not fit in i{}", width)));
            }
            // two's complement within `width` bits
            Ok(((one << width) - magnitude).to_str_radix(10))
        }
    }
}

fn scalar(value: &Value, path: &str) -> Result<BigUint> {
    match value {
        Value::String(s) => {
            parse_number(s.trim()).ok_or_else(|| mismatch(path, &format!("not a number: {:?}", s)))
        }
        Value::Number(n) => n
            .as_u64()
            .map(BigUint::from)
            .ok_or_else(|| mismatch(path, &format!("not a non-negative integer: {}", n))),
        Value::Bool(b) => Ok(BigUint::from(*b as u32)),
        other => Err(mismatch(path, &format!("unexpected value {}", other))),
    }
}

/// Parse a decimal or `0x`-prefixed hex string.
pub fn parse_number(s: &str) -> Option<BigUint> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some("") => None,
        Some(hex) if hex.chars().all(|c| c.is_ascii_hexdigit()) => {
            BigUint::parse_bytes(hex.as_bytes(), 16)
        }
        Some(_) => None,
        None if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
            BigUint::parse_bytes(s.as_bytes(), 10)
        }
        None => None,
    }
}

pub(crate) fn field_modulus() -> BigUint {
    BigUint::parse_bytes(BN254_MODULUS.as_bytes(), 10).unwrap_or_else(|| BigUint::from(0u32))
}

fn mismatch(path: &str, reason: &str) -> ProverError {
    ProverError::InputMismatch(format!("{}: {}", path, reason))
}
