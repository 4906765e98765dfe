use std::path::PathBuf;

use crate::error::{ProverError, Result};

/// Circuit build the crate ships against by default.
pub const DEFAULT_CIRCUIT_VERSION: &str = "0.1.0";

/// Worker threads barretenberg may claim while proving.
pub const DEFAULT_PROVER_THREADS: usize = 8;

/// Runtime configuration for the proof engine.
#[derive(Clone, Debug)]
pub struct ProverConfig {
    /// Directory holding `circuit-<version>.json` artifacts.
    pub circuits_dir: PathBuf,
    /// Semantic version of the compiled circuit to load.
    pub circuit_version: String,
    /// Parallelism handed to the proving backend.
    pub threads: usize,
    /// PEM certificate of the production signing authority.
    pub production_certificate: PathBuf,
    /// PEM certificate used when `use_testing_key` is set.
    pub testing_certificate: PathBuf,
    /// Local SRS file; downloaded by barretenberg when unset.
    pub srs_path: Option<PathBuf>,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            circuits_dir: PathBuf::from("./circuits"),
            circuit_version: DEFAULT_CIRCUIT_VERSION.to_string(),
            threads: DEFAULT_PROVER_THREADS,
            production_certificate: PathBuf::from("./certs/uidai_prod_cdup.pem"),
            testing_certificate: PathBuf::from("./certs/uidai_offline_testing.pem"),
            srs_path: None,
        }
    }
}

impl ProverConfig {
    /// Build a configuration from environment variables, falling back to defaults.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `CIRCUITS_DIR` | `./circuits` |
    /// | `CIRCUIT_VERSION` | `0.1.0` |
    /// | `PROVER_THREADS` | `8` |
    /// | `UIDAI_PRODUCTION_CERT` | `./certs/uidai_prod_cdup.pem` |
    /// | `UIDAI_TESTING_CERT` | `./certs/uidai_offline_testing.pem` |
    /// | `SRS_PATH` | unset |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("CIRCUITS_DIR") {
            config.circuits_dir = PathBuf::from(dir);
        }
        if let Some(version) = lookup("CIRCUIT_VERSION") {
            config.circuit_version = version;
        }
        if let Some(threads) = lookup("PROVER_THREADS") {
            config.threads = threads.parse().map_err(|e| {
                ProverError::Config(format!("PROVER_THREADS must be a positive integer: {}", e))
            })?;
        }
        if let Some(path) = lookup("UIDAI_PRODUCTION_CERT") {
            config.production_certificate = PathBuf::from(path);
        }
        if let Some(path) = lookup("UIDAI_TESTING_CERT") {
            config.testing_certificate = PathBuf::from(path);
        }
        config.srs_path = lookup("SRS_PATH").map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    /// Reject values the backend cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(ProverError::Config(
                "PROVER_THREADS must be at least 1".to_string(),
            ));
        }
        if self.circuit_version.trim().is_empty() {
            return Err(ProverError::Config(
                "CIRCUIT_VERSION must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Location of the compiled circuit JSON for the configured version.
    pub fn circuit_path(&self) -> PathBuf {
        self.circuits_dir
            .join(format!("circuit-{}.json", self.circuit_version))
    }
}
