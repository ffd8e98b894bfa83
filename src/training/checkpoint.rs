//! Model checkpoints and their stores.
//!
//! On-disk envelope: `MAGIC (4) | digest (32) | payload`, where the payload
//! is the lz4-compressed bincode encoding of a [`ModelCheckpoint`] and the
//! digest is SHA3-256 over the payload.

use crate::core::{now, Error, Hash256, Result, Timestamp};
use crate::gnn::{Adam, GraphEncoder, ModelShape};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Leading bytes of every checkpoint file.
pub const MAGIC: &[u8; 4] = b"TGC1";

const HEADER_LEN: usize = MAGIC.len() + 32;

/// Best model seen so far, with the optimizer state that produced it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    /// Increases by one with every save in a training run
    pub revision: u64,
    /// Epoch (1-based) whose loss this is
    pub epoch: usize,
    /// Loss at that epoch
    pub loss: f64,
    /// Encoder weights
    pub encoder: GraphEncoder,
    /// Adam moments
    pub optimizer: Adam,
    /// When the checkpoint was taken
    pub saved_at: Timestamp,
}

impl ModelCheckpoint {
    /// Snapshot an encoder and optimizer.
    pub fn new(revision: u64, epoch: usize, loss: f64, encoder: GraphEncoder, optimizer: Adam) -> Self {
        Self {
            revision,
            epoch,
            loss,
            encoder,
            optimizer,
            saved_at: now(),
        }
    }

    /// Input and latent widths of the stored encoder.
    pub fn shape(&self) -> ModelShape {
        self.encoder.shape()
    }

    /// Serialize into the checkpoint envelope.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = compress_prepend_size(&bincode::serialize(self)?);
        let digest = Hash256::digest(&payload);

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(digest.as_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Parse a checkpoint envelope. Every failure is [`Error::ModelLoad`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
            return Err(Error::ModelLoad("not a checkpoint file".into()));
        }
        let mut expected = [0u8; 32];
        expected.copy_from_slice(&bytes[MAGIC.len()..HEADER_LEN]);
        let payload = &bytes[HEADER_LEN..];

        let actual = Hash256::digest(payload);
        if actual != Hash256::new(expected) {
            return Err(Error::ModelLoad(format!(
                "checkpoint digest mismatch: expected {}, found {}",
                Hash256::new(expected),
                actual
            )));
        }

        let raw = decompress_size_prepended(payload).map_err(|e| Error::ModelLoad(e.to_string()))?;
        let checkpoint: Self = bincode::deserialize(&raw).map_err(|e| Error::ModelLoad(e.to_string()))?;
        if !checkpoint.encoder.is_consistent() {
            return Err(Error::ModelLoad(format!(
                "checkpoint weights do not match recorded shape {}",
                checkpoint.shape()
            )));
        }
        Ok(checkpoint)
    }
}

/// Where the best checkpoint lives.
///
/// Saves replace the previous checkpoint as a whole; a reader never
/// observes a partially written one.
pub trait CheckpointStore: Send + Sync {
    /// Persist a checkpoint, replacing any previous one.
    fn save(&self, checkpoint: &ModelCheckpoint) -> Result<()>;

    /// Load the current checkpoint.
    fn load(&self) -> Result<ModelCheckpoint>;

    /// Whether a checkpoint has been saved.
    fn exists(&self) -> bool;
}

/// Checkpoint stored in a single file, replaced atomically.
#[derive(Clone, Debug)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    /// Store at `path`. Nothing is touched until the first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Checkpoint file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "checkpoint".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()))
    }

    fn write_atomic(&self, bytes: &[u8], temp: &Path) -> Result<()> {
        let mut file = fs::File::create(temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(temp, &self.path)?;
        Ok(())
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn save(&self, checkpoint: &ModelCheckpoint) -> Result<()> {
        let bytes = checkpoint.to_bytes()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp = self.temp_path();
        if let Err(e) = self.write_atomic(&bytes, &temp) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }

        debug!(
            path = %self.path.display(),
            revision = checkpoint.revision,
            bytes = bytes.len(),
            "Checkpoint written"
        );
        Ok(())
    }

    fn load(&self) -> Result<ModelCheckpoint> {
        let bytes = fs::read(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::ModelLoad(format!("no checkpoint at {}", self.path.display())),
            _ => Error::ModelLoad(format!("cannot read {}: {}", self.path.display(), e)),
        })?;
        ModelCheckpoint::from_bytes(&bytes)
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// In-process store holding the encoded envelope.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    bytes: RwLock<Option<Vec<u8>>>,
}

impl MemoryCheckpointStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn save(&self, checkpoint: &ModelCheckpoint) -> Result<()> {
        let bytes = checkpoint.to_bytes()?;
        let mut slot = self
            .bytes
            .write()
            .map_err(|_| Error::Internal("checkpoint lock poisoned".into()))?;
        *slot = Some(bytes);
        Ok(())
    }

    fn load(&self) -> Result<ModelCheckpoint> {
        let slot = self
            .bytes
            .read()
            .map_err(|_| Error::Internal("checkpoint lock poisoned".into()))?;
        match slot.as_deref() {
            Some(bytes) => ModelCheckpoint::from_bytes(bytes),
            None => Err(Error::ModelLoad("no checkpoint saved".into())),
        }
    }

    fn exists(&self) -> bool {
        self.bytes.read().map(|s| s.is_some()).unwrap_or(false)
    }
}
