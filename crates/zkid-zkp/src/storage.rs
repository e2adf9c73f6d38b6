//! # Circuit Artifact Storage
//!
//! Resolves a [`CircuitId`] to its proving key, verification key and
//! constraint program. Artifacts are distributed out of band; on disk they
//! are laid out as
//!
//! ```text
//! <dir>/<circuitId>/circuit_final.zkey
//! <dir>/<circuitId>/verification_key.json
//! <dir>/<circuitId>/circuit.wasm
//! ```
//!
//! Storage is consulted once per circuit per process, through
//! [`CircuitLoader`](crate::CircuitLoader).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::circuits::CircuitId;
use crate::error::CircuitStorageError;

/// Proving key file name.
pub const PROVING_KEY_FILE: &str = "circuit_final.zkey";
/// Verification key file name.
pub const VERIFICATION_KEY_FILE: &str = "verification_key.json";
/// Constraint program file name.
pub const PROGRAM_FILE: &str = "circuit.wasm";

/// Artifacts of one circuit.
#[derive(Clone, PartialEq, Eq)]
pub struct CircuitData {
    /// Circuit.
    pub circuit_id: CircuitId,
    /// Proving key.
    pub proving_key: Vec<u8>,
    /// Verification key.
    pub verification_key: Vec<u8>,
    /// Witness calculator / constraint program.
    pub program: Vec<u8>,
}

impl std::fmt::Debug for CircuitData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitData")
            .field("circuit_id", &self.circuit_id)
            .field("proving_key", &format_args!("{} bytes", self.proving_key.len()))
            .field("verification_key", &format_args!("{} bytes", self.verification_key.len()))
            .field("program", &format_args!("{} bytes", self.program.len()))
            .finish()
    }
}

/// Source of circuit artifacts.
#[async_trait]
pub trait CircuitStorage: Send + Sync {
    /// Load every artifact of `circuit`.
    async fn load(&self, circuit: CircuitId) -> Result<CircuitData, CircuitStorageError>;
}

/// Artifacts read from a directory.
#[derive(Debug, Clone)]
pub struct FsCircuitStorage {
    root: PathBuf,
}

impl FsCircuitStorage {
    /// Storage rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read(&self, circuit: CircuitId, file: &str) -> Result<Vec<u8>, CircuitStorageError> {
        let path = self.root.join(circuit.as_str()).join(file);
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CircuitStorageError::NotFound(circuit)
            } else {
                CircuitStorageError::Io {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }
            }
        })
    }
}

#[async_trait]
impl CircuitStorage for FsCircuitStorage {
    async fn load(&self, circuit: CircuitId) -> Result<CircuitData, CircuitStorageError> {
        let (proving_key, verification_key, program) = tokio::try_join!(
            self.read(circuit, PROVING_KEY_FILE),
            self.read(circuit, VERIFICATION_KEY_FILE),
            self.read(circuit, PROGRAM_FILE),
        )?;
        if proving_key.is_empty() || verification_key.is_empty() {
            return Err(CircuitStorageError::Malformed {
                circuit,
                reason: "empty key file".into(),
            });
        }
        tracing::debug!(%circuit, root = %self.root.display(), "read circuit artifacts");
        Ok(CircuitData {
            circuit_id: circuit,
            proving_key,
            verification_key,
            program,
        })
    }
}

/// Write `data` to `dir` in the on-disk layout.
pub async fn write_circuit_data(dir: &Path, data: &CircuitData) -> Result<(), CircuitStorageError> {
    let circuit_dir = dir.join(data.circuit_id.as_str());
    let io = |path: &Path, e: std::io::Error| CircuitStorageError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    };
    tokio::fs::create_dir_all(&circuit_dir)
        .await
        .map_err(|e| io(&circuit_dir, e))?;
    for (file, bytes) in [
        (PROVING_KEY_FILE, &data.proving_key),
        (VERIFICATION_KEY_FILE, &data.verification_key),
        (PROGRAM_FILE, &data.program),
    ] {
        let path = circuit_dir.join(file);
        tokio::fs::write(&path, bytes).await.map_err(|e| io(&path, e))?;
    }
    Ok(())
}

/// Artifacts held in memory.
#[derive(Debug, Default)]
pub struct InMemoryCircuitStorage {
    circuits: RwLock<HashMap<CircuitId, CircuitData>>,
}

impl InMemoryCircuitStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage holding mock setup artifacts for every circuit.
    #[cfg(feature = "mock")]
    pub fn with_mock_setup() -> Self {
        let storage = Self::new();
        for circuit in CircuitId::ALL {
            storage.insert(crate::mock::mock_setup(circuit));
        }
        storage
    }

    /// Add or replace artifacts.
    pub fn insert(&self, data: CircuitData) {
        self.circuits.write().insert(data.circuit_id, data);
    }
}

#[async_trait]
impl CircuitStorage for InMemoryCircuitStorage {
    async fn load(&self, circuit: CircuitId) -> Result<CircuitData, CircuitStorageError> {
        self.circuits
            .read()
            .get(&circuit)
            .cloned()
            .ok_or(CircuitStorageError::NotFound(circuit))
    }
}
