//! # epigraph: Contact-Tracing Queries over a Property Graph
//!
//! People, places, pathogen strains and vaccines as a typed property graph,
//! with a fixed set of epidemiological queries on top.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `StorageBackend` is the contract between queries and storage
//! 2. **Clean DTOs**: `Node`, `Relationship`, `NodeRef` cross all boundaries
//! 3. **Generic traversal**: every domain query is a composition of the
//!    primitives in [`traversal`], never a hand-written pattern match
//! 4. **One call, one transaction**: each public operation on [`Graph`]
//!    commits atomically or leaves the store untouched
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use epigraph::Graph;
//!
//! # async fn example() -> epigraph::Result<()> {
//! let graph = Graph::open_memory().await?;
//!
//! graph.create_country(1, "Spain").await?;
//! graph.create_city(1, "Barcelona").await?;
//! graph.add_city_to_country(1, 1).await?;
//! graph.create_person(1, "David").await?;
//! graph.reside_person_in_city(1, 1).await?;
//! graph.create_strain(1, "Alpha").await?;
//! graph.infect_person_with_strain(1, 1).await?;
//!
//! assert!(graph.is_infected(1).await?.is_positive());
//! # Ok(())
//! # }
//! ```
//!
//! ## Vocabulary
//!
//! ```text
//! (:Country)-[:CONTAINS]->(:City)-[:RESIDED_BY]->(:Person)
//! (:Person)-[:HAS_BEEN_WITH]->(:Person)      (always both directions)
//! (:Person)-[:INFECTED_BY]->(:Strain)
//! (:Person)-[:VACCINATED_WITH]->(:Vaccine)
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod tx;
pub mod traversal;
pub mod mutation;
pub mod query;
pub mod records;
pub mod stats;
pub mod export;

use serde::{Deserialize, Serialize};
use tracing::warn;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Direction, Label, Node, NodeRef, Path, PropertyMap, RelId, RelType, Relationship, Value,
};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{BackendConfig, MemoryBackend, StorageBackend};

// ============================================================================
// Re-exports: Transactions
// ============================================================================

pub use tx::{Transaction, TxId, TxMode};

// ============================================================================
// Re-exports: Queries
// ============================================================================

pub use query::{Marker, Ranked, Status};
pub use traversal::{Distance, Extremum};

// ============================================================================
// Configuration
// ============================================================================

/// Default bound on contact-chain searches.
pub const DEFAULT_MAX_CONTACT_HOPS: usize = 15;

/// Query-layer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub backend: BackendConfig,
    /// Upper bound for `distance_to_infection` searches.
    pub max_contact_hops: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            max_contact_hops: DEFAULT_MAX_CONTACT_HOPS,
        }
    }
}

// ============================================================================
// Top-level Graph handle
// ============================================================================

/// The primary entry point. A `Graph` wraps a storage backend and exposes
/// the mutation and query APIs (see [`mutation`] and [`query`]).
///
/// There is no implicit connection: every operation goes through the
/// handle it is called on.
pub struct Graph<B: StorageBackend> {
    backend: B,
    config: GraphConfig,
}

impl<B: StorageBackend> Graph<B> {
    /// Create a Graph with the given backend.
    pub fn with_backend(backend: B) -> Self {
        Self { backend, config: GraphConfig::default() }
    }

    /// Create a Graph with the given backend and query configuration.
    pub fn with_backend_and_config(backend: B, config: GraphConfig) -> Self {
        Self { backend, config }
    }

    /// Access the underlying backend (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Shut down the backend.
    pub async fn close(&self) -> Result<()> {
        self.backend.shutdown().await
    }

    /// Commit on success, roll back on failure, preserving the original error.
    pub(crate) async fn finish<T>(&self, tx: B::Tx, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.backend.commit_tx(tx).await?;
                Ok(value)
            }
            Err(err) => {
                let tx_id = tx.id();
                if let Err(rollback_err) = self.backend.rollback_tx(tx).await {
                    warn!(%tx_id, error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

/// In-memory graph for testing and embedding.
impl Graph<MemoryBackend> {
    pub async fn open_memory() -> Result<Self> {
        Self::open_memory_with(GraphConfig::default()).await
    }

    pub async fn open_memory_with(config: GraphConfig) -> Result<Self> {
        let backend = MemoryBackend::with_config(&config.backend);
        Ok(Self::with_backend_and_config(backend, config))
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate id: {0} already exists")]
    DuplicateId(NodeRef),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
