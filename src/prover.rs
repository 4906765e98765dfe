use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::{
    apply_thread_count, BackendSettings, ProvingBackend, RawProof, UltraHonkBackend,
};
use crate::cert::TrustRoots;
use crate::circuit::CircuitArtifact;
use crate::config::ProverConfig;
use crate::error::{ProverError, Result};
use crate::input::{CircuitInput, ProofOptions};

/// Bytes per public input in backend output.
pub const FIELD_BYTES: usize = 32;

/// A succinct proof plus what the verifier needs to check it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    /// Circuit build the proof was generated with.
    pub circuit_version: String,
    #[serde(with = "hex_bytes")]
    pub proof: Vec<u8>,
    /// `0x`-prefixed 32-byte field elements.
    pub public_inputs: Vec<String>,
    /// The backend prove call, which also solves the circuit's witness.
    pub proving_time_ms: f64,
    /// Parsing flat inputs into the initial witness map. Does not include
    /// witness solving, which barretenberg runs inside the prove call.
    pub witness_time_ms: f64,
}

impl Proof {
    /// Reassemble `public_inputs ++ proof` as the backend expects it.
    pub fn proof_with_inputs(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.public_inputs.len() * FIELD_BYTES + self.proof.len());
        for (i, input) in self.public_inputs.iter().enumerate() {
            let digits = input.strip_prefix("0x").unwrap_or(input);
            let field = hex::decode(digits).map_err(|e| {
                ProverError::MalformedProof(format!("public input {} is not hex: {}", i, e))
            })?;
            if field.len() != FIELD_BYTES {
                return Err(ProverError::MalformedProof(format!(
                    "public input {} is {} bytes, expected {}",
                    i,
                    field.len(),
                    FIELD_BYTES
                )));
            }
            bytes.extend_from_slice(&field);
        }
        bytes.extend_from_slice(&self.proof);
        Ok(bytes)
    }
}

fn split_proof(raw: RawProof, public_input_count: usize, circuit_version: &str) -> Result<Proof> {
    let public_inputs_size = public_input_count * FIELD_BYTES;
    if raw.proof_with_inputs.len() <= public_inputs_size {
        return Err(ProverError::Backend(format!(
            "Proof output too small: {} bytes (expected > {})",
            raw.proof_with_inputs.len(),
            public_inputs_size
        )));
    }

    let (public_bytes, proof_bytes) = raw.proof_with_inputs.split_at(public_inputs_size);
    Ok(Proof {
        circuit_version: circuit_version.to_string(),
        proof: proof_bytes.to_vec(),
        public_inputs: public_bytes
            .chunks(FIELD_BYTES)
            .map(|field| format!("0x{}", hex::encode(field)))
            .collect(),
        proving_time_ms: raw.proving_time.as_secs_f64() * 1000.0,
        witness_time_ms: raw.witness_time.as_secs_f64() * 1000.0,
    })
}

/// Turns QR payloads into proofs and checks proofs, for one circuit build.
///
/// Holds no mutable state: every call builds its input from scratch and runs
/// on its own backend instance, so calls may proceed concurrently. An engine
/// built without trust roots can prove precomputed inputs and verify proofs,
/// but cannot take QR payloads.
pub struct ProofEngine<B: ProvingBackend = UltraHonkBackend> {
    circuit: Arc<CircuitArtifact>,
    roots: Option<Arc<TrustRoots>>,
    settings: BackendSettings,
    _backend: PhantomData<fn() -> B>,
}

impl<B: ProvingBackend> Clone for ProofEngine<B> {
    fn clone(&self) -> Self {
        Self {
            circuit: Arc::clone(&self.circuit),
            roots: self.roots.clone(),
            settings: self.settings.clone(),
            _backend: PhantomData,
        }
    }
}

impl ProofEngine<UltraHonkBackend> {
    /// Load the circuit artifact and trust roots named in `config`.
    pub fn from_config(config: &ProverConfig) -> Result<Self> {
        let verifier = Self::verifier_from_config(config)?;
        let roots = TrustRoots::load(config)?;
        Ok(Self {
            roots: Some(Arc::new(roots)),
            ..verifier
        })
    }

    /// Load only the circuit artifact named in `config`.
    pub fn verifier_from_config(config: &ProverConfig) -> Result<Self> {
        config.validate()?;
        apply_thread_count(config.threads);
        let circuit = CircuitArtifact::load(config)?;
        Ok(Self::verifier(circuit, BackendSettings::from(config)))
    }
}

impl<B: ProvingBackend> ProofEngine<B> {
    pub fn new(circuit: CircuitArtifact, roots: TrustRoots, settings: BackendSettings) -> Self {
        Self {
            roots: Some(Arc::new(roots)),
            ..Self::verifier(circuit, settings)
        }
    }

    /// An engine without trust roots, for `prove_input` and `verify_proof`.
    pub fn verifier(circuit: CircuitArtifact, settings: BackendSettings) -> Self {
        Self {
            circuit: Arc::new(circuit),
            roots: None,
            settings,
            _backend: PhantomData,
        }
    }

    pub fn circuit(&self) -> &CircuitArtifact {
        &self.circuit
    }

    /// Verify the QR signature locally and build the circuit input.
    pub async fn build_input(&self, payload: &str, options: &ProofOptions) -> Result<CircuitInput> {
        let roots = self.roots.clone().ok_or_else(|| {
            ProverError::Config("engine has no trust roots to check QR payloads".to_string())
        })?;
        let payload = payload.to_string();
        let options = options.clone();
        tokio::task::spawn_blocking(move || CircuitInput::from_qr_payload(&payload, &options, &roots))
            .await?
    }

    /// Build the input for `payload` and prove it.
    pub async fn generate_proof(&self, payload: &str, options: &ProofOptions) -> Result<Proof> {
        let input = self.build_input(payload, options).await?;
        tracing::debug!("Generated inputs: {:?}", input);
        self.prove_input(input).await
    }

    /// Prove a previously built circuit input.
    pub async fn prove_input(&self, input: CircuitInput) -> Result<Proof> {
        let witness_inputs = self.circuit.witness_inputs(&input)?;

        tracing::info!(
            "Generating proof for circuit={} inputs_len={} threads={}",
            self.circuit.version,
            witness_inputs.len(),
            self.settings.threads
        );

        let circuit = Arc::clone(&self.circuit);
        let settings = self.settings.clone();
        let raw = tokio::task::spawn_blocking(move || -> Result<RawProof> {
            let backend = B::instantiate(&circuit, &settings)?;
            backend.prove(&witness_inputs)
        })
        .await??;

        let proof = split_proof(
            raw,
            self.circuit.public_input_count(),
            &self.circuit.version,
        )?;

        tracing::info!(
            "Proof generated for circuit={}: {} bytes, {} public inputs, witness {:.1} ms, proving {:.1} ms",
            proof.circuit_version,
            proof.proof.len(),
            proof.public_inputs.len(),
            proof.witness_time_ms,
            proof.proving_time_ms
        );

        Ok(proof)
    }

    /// Check a proof on a fresh backend instance.
    ///
    /// Structural problems (wrong circuit version, undecodable public inputs,
    /// wrong public input count) are errors. Anything the backend rejects,
    /// including proofs it cannot parse, is `Ok(false)`.
    pub async fn verify_proof(&self, proof: &Proof) -> Result<bool> {
        if proof.circuit_version != self.circuit.version {
            return Err(ProverError::CircuitVersionMismatch {
                proof_version: proof.circuit_version.clone(),
                circuit_version: self.circuit.version.clone(),
            });
        }
        if proof.proof.is_empty() {
            return Err(ProverError::MalformedProof("proof bytes are empty".to_string()));
        }
        let expected = self.circuit.public_input_count();
        if proof.public_inputs.len() != expected {
            return Err(ProverError::MalformedProof(format!(
                "{} public inputs, circuit {} declares {}",
                proof.public_inputs.len(),
                self.circuit.version,
                expected
            )));
        }
        let proof_with_inputs = proof.proof_with_inputs()?;

        tracing::info!(
            "Verifying proof for circuit={} proof_len={}",
            self.circuit.version,
            proof_with_inputs.len()
        );

        let circuit = Arc::clone(&self.circuit);
        let settings = self.settings.clone();
        let valid = tokio::task::spawn_blocking(move || -> Result<bool> {
            let backend = B::instantiate(&circuit, &settings)?;
            Ok(match backend.verify(proof_with_inputs) {
                Ok(valid) => valid,
                Err(e) => {
                    tracing::warn!("Backend rejected proof: {}", e);
                    false
                }
            })
        })
        .await??;

        tracing::info!(
            "Verification result for circuit={}: {}",
            self.circuit.version,
            valid
        );

        Ok(valid)
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}
