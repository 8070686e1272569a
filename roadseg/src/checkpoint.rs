//! Persistence of model parameters.

use std::path::{Path, PathBuf};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
};

use crate::error::{RoadSegError, RoadSegResult};

/// Extension appended by the recorder.
const CHECKPOINT_EXTENSION: &str = "mpk";

/// Saves and restores the parameters of a module.
pub trait CheckpointStore {
    /// Writes a snapshot of `model`, replacing any earlier one, and returns
    /// the file written.
    fn save<B: Backend, M: Module<B>>(&self, model: &M) -> RoadSegResult<PathBuf>;

    /// Loads the stored parameters into `model`.
    fn load<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> RoadSegResult<M>;

    /// Whether a snapshot is available.
    fn exists(&self) -> bool;
}

/// A single named MessagePack checkpoint on disk.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    /// Store writing `<dir>/<name>.mpk`. Dots in `name` are kept.
    pub fn new(dir: impl AsRef<Path>, name: &str) -> Self {
        Self {
            path: dir
                .as_ref()
                .join(format!("{name}.{CHECKPOINT_EXTENSION}")),
        }
    }

    /// Store for an explicit path. Any extension is replaced by `.mpk`.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The checkpoint file as written by the recorder.
    pub fn file(&self) -> PathBuf {
        self.path.with_extension(CHECKPOINT_EXTENSION)
    }

    fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
        NamedMpkFileRecorder::<FullPrecisionSettings>::new()
    }

    fn error(&self, reason: impl ToString) -> RoadSegError {
        RoadSegError::Checkpoint {
            path: self.file(),
            reason: reason.to_string(),
        }
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn save<B: Backend, M: Module<B>>(&self, model: &M) -> RoadSegResult<PathBuf> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.error(e))?;
        }

        model
            .clone()
            .save_file(self.path.clone(), &Self::recorder())
            .map_err(|e| self.error(format!("save failed: {e}")))?;

        let file = self.file();
        tracing::info!(path = %file.display(), "saved checkpoint");
        Ok(file)
    }

    fn load<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> RoadSegResult<M> {
        if !self.exists() {
            return Err(self.error("file does not exist"));
        }

        let model = model
            .load_file(self.path.clone(), &Self::recorder(), device)
            .map_err(|e| self.error(format!("load failed: {e}")))?;

        tracing::info!(path = %self.file().display(), "restored checkpoint");
        Ok(model)
    }

    fn exists(&self) -> bool {
        self.file().is_file()
    }
}
