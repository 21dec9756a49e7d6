//! Storage abstraction: `VectorStore`, `GraphStore`, `CacheStore`, and
//! `ProjectRegistry`, each realized by exactly two backends --
//! [`embedded`] (SQLite + flat ANN + in-process petgraph + in-process LRU)
//! and [`server`] (Postgres + a Bolt graph database + Redis).
//!
//! `open()` resolves `Config::storage.mode` into a concrete `Stores` bundle.
//! `auto` mode attempts the server backend first, bounded by
//! `storage.connect_timeout_ms`, and falls back to embedded on any
//! connection failure -- the resolved choice is reported back to the
//! caller so it can be recorded on the project's registry row.

pub mod embedded;
pub mod server;
pub mod traits;

pub use traits::{CacheStore, ChunkUpsert, GraphStore, ProjectRegistry, VectorStore};

use std::path::Path;
use std::sync::Arc;

use crate::config::{Config, StorageConfig};
use crate::error::OmniResult;
use crate::graph::DependencyGraph;
use crate::index::MetadataIndex;
use crate::types::StorageMode;
use crate::vector::VectorIndex;

/// Hard ceiling on a single `neighbors()` call's node budget, independent of
/// whatever `limit` a caller passes in. Mirrors `graph::MAX_TRAVERSAL_NODES`
/// for backends (server) that don't share that constant directly.
pub const NODE_BUDGET_CAP: usize = crate::graph::MAX_TRAVERSAL_NODES;

/// The four stores a project needs, plus which mode actually backs them --
/// relevant when `StorageMode::Auto` resolved to a fallback.
pub struct Stores {
    pub vector: Arc<dyn VectorStore>,
    pub graph: Arc<dyn GraphStore>,
    pub cache: Arc<dyn CacheStore>,
    pub resolved_mode: StorageMode,
}

/// Open the embedded stores for a single project's data directory
/// (`<dataRoot>/projects/<id>/{vectors.db,graph.db}`), creating it if
/// missing.
pub fn open_embedded(project_dir: &Path, dimensions: usize) -> OmniResult<Stores> {
    std::fs::create_dir_all(project_dir)?;
    let index = Arc::new(parking_lot::Mutex::new(MetadataIndex::open(&project_dir.join("vectors.db"))?));
    let vectors = Arc::new(parking_lot::Mutex::new(VectorIndex::open(&project_dir.join("vectors.bin"), dimensions)?));
    let graph = Arc::new(DependencyGraph::new());

    Ok(Stores {
        vector: Arc::new(embedded::EmbeddedVectorStore::new(index, vectors)),
        graph: Arc::new(embedded::EmbeddedGraphStore::new(graph)),
        cache: Arc::new(embedded::EmbeddedCacheStore::new()),
        resolved_mode: StorageMode::Embedded,
    })
}

/// Attempt the server backend, bounded by `storage.connect_timeout_ms`.
async fn open_server(cfg: &StorageConfig) -> OmniResult<Stores> {
    let vector = server::PostgresVectorStore::connect(cfg).await?;
    let graph = server::BoltGraphStore::connect(cfg).await?;
    let cache = server::RedisCacheStore::connect(cfg).await?;
    Ok(Stores {
        vector: Arc::new(vector),
        graph: Arc::new(graph),
        cache: Arc::new(cache),
        resolved_mode: StorageMode::Server,
    })
}

/// Resolve `config.storage.mode` into a concrete `Stores` bundle for one
/// project. `project_dir` is only consulted in `embedded`/`auto`-fallback
/// mode. `embedding_dimensions` sizes the embedded flat ANN index.
pub async fn open(config: &Config, project_dir: &Path, embedding_dimensions: usize) -> OmniResult<Stores> {
    match config.storage.mode {
        StorageMode::Embedded => open_embedded(project_dir, embedding_dimensions),
        StorageMode::Server => open_server(&config.storage).await,
        StorageMode::Auto => match open_server(&config.storage).await {
            Ok(stores) => Ok(stores),
            Err(e) => {
                tracing::warn!(error = %e, "server storage unreachable, falling back to embedded");
                open_embedded(project_dir, embedding_dimensions)
            }
        },
    }
}

/// Open the `ProjectRegistry` for a `dataRoot`, honoring the same
/// `storage.mode`/`auto` fallback rules as per-project stores.
pub async fn open_registry(config: &Config) -> OmniResult<(Arc<dyn ProjectRegistry>, StorageMode)> {
    match config.storage.mode {
        StorageMode::Embedded => {
            let registry = embedded::EmbeddedProjectRegistry::open(&config.registry_data_root())?;
            Ok((Arc::new(registry), StorageMode::Embedded))
        }
        StorageMode::Server => {
            let registry = server::PostgresProjectRegistry::connect(&config.storage).await?;
            Ok((Arc::new(registry), StorageMode::Server))
        }
        StorageMode::Auto => match server::PostgresProjectRegistry::connect(&config.storage).await {
            Ok(registry) => Ok((Arc::new(registry), StorageMode::Server)),
            Err(e) => {
                tracing::warn!(error = %e, "registry server unreachable, falling back to embedded");
                let registry = embedded::EmbeddedProjectRegistry::open(&config.registry_data_root())?;
                Ok((Arc::new(registry), StorageMode::Embedded))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_embedded_stores() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let stores = open_embedded(dir.path(), 8).expect("open embedded");
        assert_eq!(stores.resolved_mode, StorageMode::Embedded);
    }

    #[tokio::test]
    async fn test_embedded_registry_register_and_resolve() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let registry = embedded::EmbeddedProjectRegistry::open(dir.path()).expect("open registry");
        let repo = tempfile::tempdir().expect("repo dir");
        let project = registry
            .register(repo.path(), StorageMode::Embedded)
            .await
            .expect("register");
        let resolved = registry.resolve(&project.id).await.expect("resolve").expect("found");
        assert_eq!(resolved.id, project.id);

        let again = registry.register(repo.path(), StorageMode::Embedded).await.expect("re-register");
        assert_eq!(again.id, project.id, "registering the same path twice returns the same project");
    }
}
