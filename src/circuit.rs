use std::path::Path;

use serde::Deserialize;

use crate::abi::Abi;
use crate::config::ProverConfig;
use crate::error::{ProverError, Result};
use crate::input::CircuitInput;

/// A compiled Noir circuit pinned to one semantic version.
///
/// Proofs only verify against the exact build they were generated with, so the
/// version travels with every proof produced from this artifact.
#[derive(Clone, Debug)]
pub struct CircuitArtifact {
    pub version: String,
    pub noir_version: Option<String>,
    /// Base64 gzipped ACIR, as emitted by `nargo compile`.
    pub bytecode: String,
    pub abi: Abi,
}

/// The subset of `nargo compile` output the prover reads.
#[derive(Deserialize)]
struct CompiledCircuit {
    #[serde(default)]
    noir_version: Option<String>,
    bytecode: Option<String>,
    abi: Option<Abi>,
}

impl CircuitArtifact {
    /// Load `circuit-<version>.json` from the configured circuits directory.
    pub fn load(config: &ProverConfig) -> Result<Self> {
        let path = config.circuit_path();
        tracing::info!(
            "Loading circuit {} from {}",
            config.circuit_version,
            path.display()
        );
        Self::from_path(&path, &config.circuit_version)
    }

    pub fn from_path(path: &Path, version: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProverError::Circuit(format!(
                "Failed to read circuit JSON at {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&contents, version).map_err(|e| match e {
            ProverError::Circuit(msg) => {
                ProverError::Circuit(format!("{} (at {})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Parse compiled circuit JSON. `bytecode` and `abi` are both required.
    pub fn from_json(json: &str, version: &str) -> Result<Self> {
        let compiled: CompiledCircuit = serde_json::from_str(json)
            .map_err(|e| ProverError::Circuit(format!("Failed to parse circuit JSON: {}", e)))?;

        let bytecode = compiled
            .bytecode
            .ok_or_else(|| ProverError::Circuit("No 'bytecode' field in circuit JSON".to_string()))?;
        let abi = compiled
            .abi
            .ok_or_else(|| ProverError::Circuit("No 'abi' field in circuit JSON".to_string()))?;

        tracing::info!(
            "Circuit {} loaded: bytecode={} chars, inputs={}, public_inputs={}",
            version,
            bytecode.len(),
            abi.input_count(),
            abi.public_input_count()
        );

        Ok(Self {
            version: version.to_string(),
            noir_version: compiled.noir_version,
            bytecode,
            abi,
        })
    }

    /// Flatten a built input into the decimal witness list `main` expects.
    pub fn witness_inputs(&self, input: &CircuitInput) -> Result<Vec<String>> {
        let inputs = self.abi.flatten(&serde_json::to_value(input)?)?;
        tracing::debug!(
            "Flattened circuit input for {}: {} values",
            self.version,
            inputs.len()
        );
        Ok(inputs)
    }

    pub fn public_input_count(&self) -> usize {
        self.abi.public_input_count()
    }
}
