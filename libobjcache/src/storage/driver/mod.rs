use std::path::PathBuf;
use std::sync::Arc;

use crate::storage::ObjectBackend;

pub mod filesystem;
pub mod memory;
pub mod s3;

use filesystem::FilesystemBackend;
use memory::MemoryBackend;
use s3::{S3Backend, S3Options};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum StorageKind {
    S3,
    Filesystem,
    Memory,
}

/// Everything needed to construct a backend.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    S3(S3Options),
    Filesystem { root: PathBuf },
    Memory,
}

impl BackendConfig {
    pub async fn build(&self) -> Arc<dyn ObjectBackend> {
        let backend: Arc<dyn ObjectBackend> = match self {
            BackendConfig::S3(options) => Arc::new(S3Backend::new(options).await),
            BackendConfig::Filesystem { root } => Arc::new(FilesystemBackend::new(root.clone())),
            BackendConfig::Memory => Arc::new(MemoryBackend::new()),
        };
        tracing::info!(backend = backend.name(), "storage backend ready");
        backend
    }
}
