//! Aadhaar secure QR to zero-knowledge proof
//!
//! Verifies a scanned QR payload against the signing authority's certificate,
//! reshapes it into the fixed input layout of a compiled Noir circuit, and
//! proves/verifies that circuit with barretenberg's UltraHonk backend.

pub mod abi;
pub mod backend;
pub mod cert;
pub mod circuit;
pub mod config;
pub mod error;
pub mod input;
pub mod limbs;
pub mod prover;
pub mod qr;
pub mod signal;

pub use backend::{BackendSettings, ProvingBackend, RawProof, UltraHonkBackend};
pub use cert::{public_key_modulus, TrustRoots};
pub use circuit::CircuitArtifact;
pub use config::ProverConfig;
pub use error::{ProverError, Result};
pub use input::{CircuitInput, ProofOptions};
pub use prover::{Proof, ProofEngine};
pub use qr::QrData;
