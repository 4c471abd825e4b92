//! Store selection and persistence for the CLI.

use anyhow::{Context, Result};
use dojo_core::{KnowledgeEntry, VectorStore};
#[cfg(feature = "lancedb")]
use dojo_store::LanceStore;
use dojo_store::MemoryStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{StoreBackend, StoreConfig, ensure_parent};

/// An opened store.
pub enum Backend {
    /// In-memory store loaded from and saved to a JSON snapshot
    Memory {
        store: Arc<MemoryStore>,
        path: PathBuf,
    },
    #[cfg(feature = "lancedb")]
    Lance(Arc<LanceStore>),
}

impl Backend {
    /// Open the configured backend and initialize it.
    pub async fn open(config: &StoreConfig, dimension: usize) -> Result<Self> {
        let path = config
            .resolved_path()
            .context("Failed to determine store location")?;

        let backend = match config.backend {
            StoreBackend::Memory => {
                let entries = read_snapshot(&path)?;
                debug!("Loaded {} entries from {}", entries.len(), path.display());
                let store = MemoryStore::from_entries(dimension, entries).with_context(|| {
                    format!(
                        "Snapshot {} is not loadable at embedding dimension {}",
                        path.display(),
                        dimension
                    )
                })?;
                Self::Memory {
                    store: Arc::new(store),
                    path,
                }
            }
            #[cfg(feature = "lancedb")]
            StoreBackend::Lance => {
                ensure_parent(&path)?;
                Self::Lance(Arc::new(LanceStore::new(path, dimension)))
            }
            #[cfg(not(feature = "lancedb"))]
            StoreBackend::Lance => {
                anyhow::bail!("The lance store backend requires building with --features lancedb")
            }
        };

        backend
            .store()
            .init()
            .await
            .context("Failed to initialize store")?;
        Ok(backend)
    }

    pub fn store(&self) -> Arc<dyn VectorStore> {
        match self {
            Self::Memory { store, .. } => store.clone(),
            #[cfg(feature = "lancedb")]
            Self::Lance(store) => store.clone(),
        }
    }

    /// Write pending changes. A no-op for backends that persist on write.
    pub async fn persist(&self) -> Result<()> {
        match self {
            Self::Memory { store, path } => {
                let entries = store.snapshot().await;
                write_snapshot(path, &entries)?;
                info!("Saved {} entries to {}", entries.len(), path.display());
                Ok(())
            }
            #[cfg(feature = "lancedb")]
            Self::Lance(_) => Ok(()),
        }
    }
}

/// Read a snapshot file; a missing file is an empty store.
pub fn read_snapshot(path: &Path) -> Result<Vec<KnowledgeEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    serde_json::from_slice(&raw)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))
}

/// Write a snapshot through a temporary file so readers never see a
/// partial file.
pub fn write_snapshot(path: &Path, entries: &[KnowledgeEntry]) -> Result<()> {
    ensure_parent(path)?;
    let tmp = path.with_extension("json.tmp");
    let raw = serde_json::to_vec(entries).context("Failed to serialize snapshot")?;
    std::fs::write(&tmp, raw)
        .with_context(|| format!("Failed to write snapshot {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace snapshot {}", path.display()))?;
    Ok(())
}
