use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use aadhaar_qr_prover::{
    CircuitInput, Proof, ProofEngine, ProofOptions, ProverConfig, Result, TrustRoots,
};

#[derive(Parser)]
#[command(name = "aadhaar-qr-prover")]
#[command(about = "Zero-knowledge proofs over Aadhaar secure QR payloads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the circuit input for a QR payload and print it as JSON
    Inputs {
        #[command(flatten)]
        qr: QrArgs,

        /// Write the input here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate a proof from a QR payload
    Prove {
        #[command(flatten)]
        qr: QrArgs,

        /// Output file for the proof JSON
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Generate a proof from a previously built circuit input
    ProveInput {
        /// Circuit input JSON produced by `inputs`
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the proof JSON
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Verify a proof JSON file
    Verify {
        #[arg(short, long)]
        proof: PathBuf,
    },
}

#[derive(Args)]
struct QrArgs {
    /// File holding the scanned QR numeric string
    #[arg(short, long)]
    qr: PathBuf,

    /// Check the QR signature against the testing certificate
    #[arg(long)]
    testing_key: bool,

    /// Field element, decimal or 0x hex
    #[arg(long, default_value = "1234")]
    nullifier_seed: String,

    #[arg(long)]
    reveal_gender: bool,

    #[arg(long)]
    reveal_age_above18: bool,

    #[arg(long)]
    reveal_pin_code: bool,

    #[arg(long)]
    reveal_state: bool,

    /// Application context bound into the proof
    #[arg(long, default_value = "1")]
    signal: String,
}

impl QrArgs {
    fn options(&self) -> ProofOptions {
        ProofOptions {
            use_testing_key: self.testing_key,
            nullifier_seed: self.nullifier_seed.clone(),
            reveal_gender: self.reveal_gender,
            reveal_age_above18: self.reveal_age_above18,
            reveal_pin_code: self.reveal_pin_code,
            reveal_state: self.reveal_state,
            signal: self.signal.clone(),
        }
    }

    fn payload(&self) -> Result<String> {
        Ok(std::fs::read_to_string(&self.qr)?.trim().to_string())
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    tracing::info!("Wrote {}", path.display());
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

/// Returns `false` when a proof fails verification.
///
/// Each subcommand loads only what it uses: `inputs` needs the certificates,
/// `prove-input` and `verify` need the circuit, `prove` needs both.
async fn run(cli: Cli, config: ProverConfig) -> Result<bool> {
    match cli.command {
        Commands::Inputs { qr, output } => {
            let roots = TrustRoots::load(&config)?;
            let input = CircuitInput::from_qr_payload(&qr.payload()?, &qr.options(), &roots)?;
            match output {
                Some(path) => write_json(&path, &input)?,
                None => println!("{}", serde_json::to_string_pretty(&input)?),
            }
        }
        Commands::Prove { qr, output } => {
            let engine: ProofEngine = ProofEngine::from_config(&config)?;
            let proof = engine.generate_proof(&qr.payload()?, &qr.options()).await?;
            write_json(&output, &proof)?;
        }
        Commands::ProveInput { input, output } => {
            let engine: ProofEngine = ProofEngine::verifier_from_config(&config)?;
            let input: CircuitInput = read_json(&input)?;
            let proof = engine.prove_input(input).await?;
            write_json(&output, &proof)?;
        }
        Commands::Verify { proof } => {
            let engine: ProofEngine = ProofEngine::verifier_from_config(&config)?;
            let proof: Proof = read_json(&proof)?;
            let valid = engine.verify_proof(&proof).await?;
            println!("Proof is {}", if valid { "valid" } else { "invalid" });
            return Ok(valid);
        }
    }
    Ok(true)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aadhaar_qr_prover=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let result = match ProverConfig::from_env() {
        Ok(config) => {
            tracing::info!(
                "Using circuit {} from {}",
                config.circuit_version,
                config.circuits_dir.display()
            );
            run(cli, config).await
        }
        Err(e) => Err(e),
    };
    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    }
}
