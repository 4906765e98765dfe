use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use noir_rs::barretenberg::prove::prove_ultra_honk_keccak;
use noir_rs::barretenberg::srs::setup_srs_from_bytecode;
use noir_rs::barretenberg::verify::{
    get_ultra_honk_keccak_verification_key, verify_ultra_honk_keccak,
};
use noir_rs::witness::from_vec_str_to_witness_map;

use crate::circuit::CircuitArtifact;
use crate::config::ProverConfig;
use crate::error::{ProverError, Result};

/// Barretenberg keeps global state behind its FFI and is not thread-safe;
/// every call into it is serialized through this lock.
static BARRETENBERG: Mutex<()> = Mutex::new(());

static THREADS: OnceLock<usize> = OnceLock::new();

/// Set barretenberg's worker count for this process.
///
/// barretenberg reads `HARDWARE_CONCURRENCY` once per process, so only the
/// first call takes effect. Returns the count actually in force.
pub fn apply_thread_count(threads: usize) -> usize {
    let applied = *THREADS.get_or_init(|| {
        std::env::set_var("HARDWARE_CONCURRENCY", threads.to_string());
        threads
    });
    if applied != threads {
        tracing::warn!(
            "barretenberg already runs {} threads, ignoring request for {}",
            applied,
            threads
        );
    }
    applied
}

/// Per-instance backend settings.
#[derive(Clone, Debug)]
pub struct BackendSettings {
    pub threads: usize,
    pub srs_path: Option<PathBuf>,
}

impl From<&ProverConfig> for BackendSettings {
    fn from(config: &ProverConfig) -> Self {
        Self {
            threads: config.threads,
            srs_path: config.srs_path.clone(),
        }
    }
}

/// Backend output before it is split into proof and public inputs.
#[derive(Debug)]
pub struct RawProof {
    /// `public_inputs ++ proof`, 32 bytes per public input.
    pub proof_with_inputs: Vec<u8>,
    /// Time spent parsing the flat inputs into the initial witness map.
    /// Solving the rest of the witness happens inside the prove call.
    pub witness_time: Duration,
    /// Time spent in the prove call: circuit execution plus proving.
    pub proving_time: Duration,
}

/// A proving system able to run one compiled circuit.
///
/// Instances are cheap to drop and are never shared between requests; the
/// engine instantiates a fresh one for every prove and every verify call.
pub trait ProvingBackend: Sized + Send + 'static {
    fn instantiate(circuit: &CircuitArtifact, settings: &BackendSettings) -> Result<Self>;

    /// Execute the circuit on decimal witness inputs and prove it.
    fn prove(&self, witness_inputs: &[String]) -> Result<RawProof>;

    /// Check `public_inputs ++ proof` against this circuit's verification key.
    fn verify(&self, proof_with_inputs: Vec<u8>) -> Result<bool>;
}

/// UltraHonk (keccak transcript) over barretenberg, via `noir_rs`.
pub struct UltraHonkBackend {
    bytecode: String,
    vk: Vec<u8>,
}

impl ProvingBackend for UltraHonkBackend {
    fn instantiate(circuit: &CircuitArtifact, settings: &BackendSettings) -> Result<Self> {
        let _guard = BARRETENBERG.lock().unwrap_or_else(|p| p.into_inner());

        let threads = apply_thread_count(settings.threads);

        tracing::info!(
            "Setting up SRS for circuit {} (threads={})",
            circuit.version,
            threads
        );
        let srs_path = settings.srs_path.as_ref().and_then(|p| p.to_str());
        setup_srs_from_bytecode(circuit.bytecode.as_str(), srs_path, false).map_err(|e| {
            ProverError::Backend(format!("SRS setup failed for {}: {}", circuit.version, e))
        })?;

        tracing::info!("Generating VK for circuit {}", circuit.version);
        let vk = get_ultra_honk_keccak_verification_key(circuit.bytecode.as_str(), false, false)
            .map_err(|e| {
                ProverError::Backend(format!("VK generation failed for {}: {}", circuit.version, e))
            })?;
        tracing::debug!("VK for circuit {}: {} bytes", circuit.version, vk.len());

        Ok(Self {
            bytecode: circuit.bytecode.clone(),
            vk,
        })
    }

    fn prove(&self, witness_inputs: &[String]) -> Result<RawProof> {
        let _guard = BARRETENBERG.lock().unwrap_or_else(|p| p.into_inner());

        let started = Instant::now();
        let input_refs: Vec<&str> = witness_inputs.iter().map(|s| s.as_str()).collect();
        let witness = from_vec_str_to_witness_map(input_refs)
            .map_err(|e| ProverError::Backend(format!("Witness generation failed: {}", e)))?;
        let witness_time = started.elapsed();

        let started = Instant::now();
        let proof_with_inputs = prove_ultra_honk_keccak(
            self.bytecode.as_str(),
            witness,
            self.vk.clone(),
            false, // disable_zk
            false, // low_memory_mode
        )
        .map_err(|e| ProverError::Backend(format!("Proof generation failed: {}", e)))?;
        let proving_time = started.elapsed();

        Ok(RawProof {
            proof_with_inputs,
            witness_time,
            proving_time,
        })
    }

    fn verify(&self, proof_with_inputs: Vec<u8>) -> Result<bool> {
        let _guard = BARRETENBERG.lock().unwrap_or_else(|p| p.into_inner());

        verify_ultra_honk_keccak(proof_with_inputs, self.vk.clone(), false)
            .map_err(|e| ProverError::Backend(format!("Verification failed: {}", e)))
    }
}
