//! End-to-end tests: QR payload -> circuit input -> proof -> verification

use std::path::PathBuf;
use std::time::Instant;

use aadhaar_qr_prover::input::{DELIMITER_COUNT, QR_DATA_BUFFER_LEN};
use aadhaar_qr_prover::{
    BackendSettings, CircuitArtifact, CircuitInput, ProofEngine, ProofOptions, ProverConfig,
    ProverError, ProvingBackend, RawProof, Result, TrustRoots, UltraHonkBackend,
};
use sha2::{Digest, Sha256};

/// Get path to test fixtures
fn fixture_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(filename);
    path
}

fn fixture(filename: &str) -> String {
    std::fs::read_to_string(fixture_path(filename))
        .unwrap_or_else(|e| panic!("missing fixture {}: {}", filename, e))
}

/// Deterministic stand-in for barretenberg.
///
/// Public inputs are hashes of the witness, and the proof is a tag binding the
/// public inputs to a digest of the witness under a key derived from the
/// circuit bytecode. Flipping any byte breaks the tag.
struct DigestBackend {
    key: Vec<u8>,
    input_count: usize,
    public_input_count: usize,
}

impl DigestBackend {
    fn tag(&self, public: &[u8], tail: &[u8]) -> Vec<u8> {
        Sha256::new()
            .chain_update(&self.key)
            .chain_update(public)
            .chain_update(tail)
            .finalize()
            .to_vec()
    }
}

impl ProvingBackend for DigestBackend {
    fn instantiate(circuit: &CircuitArtifact, _settings: &BackendSettings) -> Result<Self> {
        Ok(Self {
            key: Sha256::digest(circuit.bytecode.as_bytes()).to_vec(),
            input_count: circuit.abi.input_count(),
            public_input_count: circuit.public_input_count(),
        })
    }

    fn prove(&self, witness_inputs: &[String]) -> Result<RawProof> {
        if witness_inputs.len() != self.input_count {
            return Err(ProverError::Backend(format!(
                "expected {} witness inputs, got {}",
                self.input_count,
                witness_inputs.len()
            )));
        }

        let started = Instant::now();
        let joined = witness_inputs.join(",");
        let witness_time = started.elapsed();

        let started = Instant::now();
        let mut bytes = Vec::new();
        for i in 0..self.public_input_count {
            let field = Sha256::new()
                .chain_update(&self.key)
                .chain_update((i as u64).to_le_bytes())
                .chain_update(joined.as_bytes())
                .finalize();
            bytes.extend_from_slice(&field);
        }
        let tail = Sha256::digest(joined.as_bytes()).to_vec();
        let tag = self.tag(&bytes, &tail);
        bytes.extend_from_slice(&tag);
        bytes.extend_from_slice(&tail);

        Ok(RawProof {
            proof_with_inputs: bytes,
            witness_time,
            proving_time: started.elapsed(),
        })
    }

    fn verify(&self, proof_with_inputs: Vec<u8>) -> Result<bool> {
        let public_size = self.public_input_count * 32;
        if proof_with_inputs.len() != public_size + 64 {
            return Err(ProverError::Backend("unexpected proof length".to_string()));
        }
        let (public, rest) = proof_with_inputs.split_at(public_size);
        let (tag, tail) = rest.split_at(32);
        Ok(self.tag(public, tail) == tag)
    }
}

fn engine() -> ProofEngine<DigestBackend> {
    let circuit = CircuitArtifact::from_path(&fixture_path("circuit-0.1.0.json"), "0.1.0").unwrap();
    let roots = TrustRoots::new(fixture("production_cert.pem"), fixture("testing_cert.pem"));
    let settings = BackendSettings {
        threads: 8,
        srs_path: None,
    };
    ProofEngine::new(circuit, roots, settings)
}

fn verifier() -> ProofEngine<DigestBackend> {
    let circuit = CircuitArtifact::from_path(&fixture_path("circuit-0.1.0.json"), "0.1.0").unwrap();
    let settings = BackendSettings {
        threads: 8,
        srs_path: None,
    };
    ProofEngine::verifier(circuit, settings)
}

fn options() -> ProofOptions {
    ProofOptions {
        use_testing_key: true,
        nullifier_seed: "12345".to_string(),
        reveal_gender: false,
        reveal_age_above18: true,
        reveal_pin_code: false,
        reveal_state: false,
        signal: "test".to_string(),
    }
}

#[tokio::test]
async fn test_generate_then_verify() {
    let engine = engine();
    let proof = engine
        .generate_proof(&fixture("sample_qr.txt"), &options())
        .await
        .unwrap();

    assert_eq!(proof.circuit_version, "0.1.0");
    assert_eq!(proof.public_inputs.len(), 9);
    assert!(proof.public_inputs.iter().all(|p| p.starts_with("0x") && p.len() == 66));
    assert_eq!(proof.proof.len(), 64);
    assert!(proof.proving_time_ms >= 0.0);
    assert!(proof.witness_time_ms >= 0.0);

    assert!(engine.verify_proof(&proof).await.unwrap());
}

#[tokio::test]
async fn test_verifier_without_trust_roots() {
    let proof = engine()
        .generate_proof(&fixture("sample_qr.txt"), &options())
        .await
        .unwrap();

    let verifier = verifier();
    assert!(verifier.verify_proof(&proof).await.unwrap());

    let mut tampered = proof.clone();
    tampered.proof[0] ^= 0x01;
    assert!(!verifier.verify_proof(&tampered).await.unwrap());

    let input = engine()
        .build_input(&fixture("sample_qr.txt"), &options())
        .await
        .unwrap();
    let reproved = verifier.prove_input(input).await.unwrap();
    assert_eq!(reproved.public_inputs, proof.public_inputs);

    assert!(matches!(
        verifier.build_input(&fixture("sample_qr.txt"), &options()).await,
        Err(ProverError::Config(_))
    ));
}

#[tokio::test]
async fn test_gzip_payload_proves_same_statement() {
    let engine = engine();
    let zlib = engine
        .generate_proof(&fixture("sample_qr.txt"), &options())
        .await
        .unwrap();
    let gzip = engine
        .generate_proof(&fixture("sample_qr_gzip.txt"), &options())
        .await
        .unwrap();
    assert_eq!(zlib.public_inputs, gzip.public_inputs);
}

#[tokio::test]
async fn test_tampered_proof_bytes_fail() {
    let engine = engine();
    let proof = engine
        .generate_proof(&fixture("sample_qr.txt"), &options())
        .await
        .unwrap();

    for position in [0, 17, 31, 32, 63] {
        let mut tampered = proof.clone();
        tampered.proof[position] ^= 0x01;
        assert!(
            !engine.verify_proof(&tampered).await.unwrap(),
            "tampering byte {} was not detected",
            position
        );
    }
}

#[tokio::test]
async fn test_tampered_public_input_fails() {
    let engine = engine();
    let mut proof = engine
        .generate_proof(&fixture("sample_qr.txt"), &options())
        .await
        .unwrap();

    let last = proof.public_inputs.len() - 1;
    let flipped = if proof.public_inputs[last].ends_with('0') { "1" } else { "0" };
    let mut value = proof.public_inputs[last].clone();
    value.pop();
    value.push_str(flipped);
    proof.public_inputs[last] = value;

    assert!(!engine.verify_proof(&proof).await.unwrap());
}

#[tokio::test]
async fn test_signal_changes_public_inputs() {
    let engine = engine();
    let a = engine
        .generate_proof(&fixture("sample_qr.txt"), &options())
        .await
        .unwrap();
    let mut other = options();
    other.signal = "another-context".to_string();
    let b = engine
        .generate_proof(&fixture("sample_qr.txt"), &other)
        .await
        .unwrap();
    assert_ne!(a.public_inputs, b.public_inputs);
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let engine = engine();
    let payload = fixture("sample_qr.txt");
    let mut revealing = options();
    revealing.reveal_state = true;
    let default_options = options();

    let (a, b) = tokio::join!(
        engine.generate_proof(&payload, &default_options),
        engine.generate_proof(&payload, &revealing)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.public_inputs, b.public_inputs);
    assert!(engine.verify_proof(&a).await.unwrap());
    assert!(engine.verify_proof(&b).await.unwrap());
}

#[tokio::test]
async fn test_precomputed_input_path() {
    let engine = engine();
    let input = engine
        .build_input(&fixture("sample_qr.txt"), &options())
        .await
        .unwrap();

    let json = serde_json::to_string(&input).unwrap();
    let restored: CircuitInput = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, input);

    let from_input = engine.prove_input(restored).await.unwrap();
    let from_payload = engine
        .generate_proof(&fixture("sample_qr.txt"), &options())
        .await
        .unwrap();
    assert_eq!(from_input.public_inputs, from_payload.public_inputs);
    assert!(engine.verify_proof(&from_input).await.unwrap());
}

#[tokio::test]
async fn test_input_layout_for_sample() {
    let engine = engine();
    let input = engine
        .build_input(&fixture("sample_qr.txt"), &options())
        .await
        .unwrap();

    let signed_len: usize = fixture("sample_signed_len.txt").trim().parse().unwrap();
    assert_eq!(input.qr_data_padded.len, signed_len);
    assert_eq!(input.qr_data_padded.storage.len(), QR_DATA_BUFFER_LEN);
    assert!(input.qr_data_padded.storage[signed_len..].iter().all(|b| b == "0"));
    assert_eq!(input.delimiter_indices.len(), DELIMITER_COUNT);

    let witness = engine.circuit().witness_inputs(&input).unwrap();
    assert_eq!(witness.len(), engine.circuit().abi.input_count());
    assert!(witness.iter().all(|w| w.chars().all(|c| c.is_ascii_digit())));
}

#[tokio::test]
async fn test_production_key_rejects_testing_payload() {
    let engine = engine();
    let mut opts = options();
    opts.use_testing_key = false;
    let result = engine.generate_proof(&fixture("sample_qr.txt"), &opts).await;
    assert!(matches!(
        result,
        Err(ProverError::SignatureVerificationFailed(_))
    ));
}

#[tokio::test]
async fn test_too_few_delimiters_rejected() {
    let engine = engine();
    let result = engine
        .generate_proof(&fixture("few_delimiters_qr.txt"), &options())
        .await;
    assert!(matches!(
        result,
        Err(ProverError::MissingDelimiters { found: 10, expected: 18 })
    ));
}

#[tokio::test]
async fn test_oversized_signed_data_rejected() {
    let engine = engine();
    let result = engine
        .generate_proof(&fixture("oversized_qr.txt"), &options())
        .await;
    assert!(matches!(
        result,
        Err(ProverError::SignedDataTooLarge { max: 1200, .. })
    ));
}

#[tokio::test]
async fn test_version_mismatch_is_an_error() {
    let engine = engine();
    let mut proof = engine
        .generate_proof(&fixture("sample_qr.txt"), &options())
        .await
        .unwrap();
    proof.circuit_version = "0.2.0".to_string();
    assert!(matches!(
        engine.verify_proof(&proof).await,
        Err(ProverError::CircuitVersionMismatch { .. })
    ));
}

#[tokio::test]
async fn test_wrong_public_input_count_is_malformed() {
    let engine = engine();
    let mut proof = engine
        .generate_proof(&fixture("sample_qr.txt"), &options())
        .await
        .unwrap();
    proof.public_inputs.pop();
    assert!(matches!(
        engine.verify_proof(&proof).await,
        Err(ProverError::MalformedProof(_))
    ));
}

#[tokio::test]
async fn test_truncated_proof_reported_invalid() {
    let engine = engine();
    let mut proof = engine
        .generate_proof(&fixture("sample_qr.txt"), &options())
        .await
        .unwrap();
    proof.proof.truncate(40);
    assert!(!engine.verify_proof(&proof).await.unwrap());
}

// Requires a compiled circuit at $CIRCUITS_DIR/circuit-$CIRCUIT_VERSION.json,
// certificates at $UIDAI_TESTING_CERT / $UIDAI_PRODUCTION_CERT, a QR payload at
// $SAMPLE_QR and network access for the SRS download.
// Run manually: cargo test -- --ignored --nocapture
#[tokio::test]
#[ignore]
async fn test_ultra_honk_end_to_end() {
    let config = ProverConfig::from_env().expect("Invalid configuration");
    let engine: ProofEngine<UltraHonkBackend> =
        ProofEngine::from_config(&config).expect("Failed to load circuit");
    let payload = std::fs::read_to_string(std::env::var("SAMPLE_QR").expect("SAMPLE_QR not set"))
        .expect("Failed to read QR payload");

    let proof = engine.generate_proof(payload.trim(), &options()).await.unwrap();
    println!(
        "Proof: {} bytes, witness {:.1} ms, proving {:.1} ms",
        proof.proof.len(),
        proof.witness_time_ms,
        proof.proving_time_ms
    );
    assert!(engine.verify_proof(&proof).await.unwrap());

    let mut tampered = proof.clone();
    tampered.proof[0] ^= 0x01;
    assert!(!engine.verify_proof(&tampered).await.unwrap());
}
