//! # Storage Backend Trait
//!
//! This is THE contract between the query engine and any graph store.
//! Every operation the epidemiological layer needs is defined here.
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryBackend` | `memory` | In-memory, snapshot-isolated, single writer |
//!
//! ## Atomicity
//!
//! Every mutating method runs inside a caller-supplied transaction. A
//! backend must make the whole transaction visible on `commit_tx` and
//! none of it on `rollback_tx` (or when the transaction is dropped).

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::tx::{Transaction, TxMode};
use crate::{Error, Result};

pub use memory::MemoryBackend;

// ============================================================================
// Backend Configuration
// ============================================================================

/// Configuration for constructing a storage backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// In-memory (no persistence)
    Memory {
        /// Pre-sized node capacity; avoids early rehashing for known populations.
        #[serde(default)]
        node_capacity: usize,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Memory { node_capacity: 0 }
    }
}

// ============================================================================
// StorageBackend Trait
// ============================================================================

/// The universal graph store contract.
///
/// Reads take `&Self::Tx` and observe the transaction's snapshot, including
/// its own uncommitted writes. Writes take `&mut Self::Tx` and must fail with
/// `Error::TxError` on a read-only transaction.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// The transaction type for this backend.
    type Tx: Transaction;

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Shut down the backend. Later transactions fail with `Unavailable`.
    async fn shutdown(&self) -> Result<()>;

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Begin a new transaction.
    async fn begin_tx(&self, mode: TxMode) -> Result<Self::Tx>;

    /// Commit a transaction.
    async fn commit_tx(&self, tx: Self::Tx) -> Result<()>;

    /// Roll back a transaction.
    async fn rollback_tx(&self, tx: Self::Tx) -> Result<()>;

    // ========================================================================
    // Node CRUD
    // ========================================================================

    /// Create a node. Fails with `DuplicateId` if its `NodeRef` is taken.
    async fn create_node(&self, tx: &mut Self::Tx, node: Node) -> Result<NodeRef>;

    /// Get a node by identity. Returns None if not found.
    async fn get_node(&self, tx: &Self::Tx, key: NodeRef) -> Result<Option<Node>>;

    /// Delete a node and every relationship touching it.
    /// Neo4j: `DETACH DELETE n`
    ///
    /// Returns the number of relationships removed alongside the node.
    /// Fails with `NotFound` if the node does not exist.
    async fn detach_delete_node(&self, tx: &mut Self::Tx, key: NodeRef) -> Result<usize>;

    // ========================================================================
    // Relationship CRUD
    // ========================================================================

    /// Create a relationship between two existing nodes.
    ///
    /// Fails with `NotFound` if either endpoint is missing and with
    /// `ConstraintViolation` if the endpoint labels do not match the
    /// type's schema.
    async fn create_relationship(
        &self,
        tx: &mut Self::Tx,
        src: NodeRef,
        dst: NodeRef,
        rel_type: RelType,
    ) -> Result<RelId>;

    /// Delete a relationship. Returns true if it existed.
    async fn delete_relationship(&self, tx: &mut Self::Tx, id: RelId) -> Result<bool>;

    /// Delete every `rel_type` edge from `src` to `dst`.
    ///
    /// Returns how many were removed; fails with `NotFound` when none exist.
    async fn delete_relationships_between(
        &self,
        tx: &mut Self::Tx,
        src: NodeRef,
        dst: NodeRef,
        rel_type: RelType,
    ) -> Result<usize> {
        let rels = self.get_relationships(tx, src, Direction::Outgoing, Some(rel_type)).await?;
        let mut removed = 0;
        for rel in rels.iter().filter(|r| r.dst == dst) {
            if self.delete_relationship(tx, rel.id).await? {
                removed += 1;
            }
        }
        if removed == 0 {
            return Err(Error::NotFound(format!("{rel_type} edge {src} -> {dst}")));
        }
        Ok(removed)
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Get all relationships of a node, optionally filtered by direction and type.
    ///
    /// Order is insertion order, outgoing before incoming for `Both`.
    async fn get_relationships(
        &self,
        tx: &Self::Tx,
        node: NodeRef,
        dir: Direction,
        rel_type: Option<RelType>,
    ) -> Result<Vec<Relationship>>;

    // ========================================================================
    // Schema introspection
    // ========================================================================

    /// Total number of nodes.
    async fn node_count(&self, tx: &Self::Tx) -> Result<u64>;

    /// Total number of relationships.
    async fn relationship_count(&self, tx: &Self::Tx) -> Result<u64>;

    // ========================================================================
    // Scan
    // ========================================================================

    /// All nodes with a given label, ascending by id.
    async fn nodes_by_label(&self, tx: &Self::Tx, label: Label) -> Result<Vec<Node>>;

    /// Return all nodes, grouped by label then ascending by id.
    async fn all_nodes(&self, tx: &Self::Tx) -> Result<Vec<Node>> {
        let mut result = Vec::new();
        for label in Label::ALL {
            result.extend(self.nodes_by_label(tx, label).await?);
        }
        Ok(result)
    }

    /// Find all relationships of a given type.
    ///
    /// Default: scans the source label of the type and collects outgoing edges.
    async fn relationships_by_type(
        &self,
        tx: &Self::Tx,
        rel_type: RelType,
    ) -> Result<Vec<Relationship>> {
        let (src_label, _) = rel_type.endpoints();
        let mut result = Vec::new();
        for node in self.nodes_by_label(tx, src_label).await? {
            let rels = self.get_relationships(
                tx, node.key, Direction::Outgoing, Some(rel_type),
            ).await?;
            result.extend(rels);
        }
        Ok(result)
    }

    // ========================================================================
    // Bulk
    // ========================================================================

    /// Remove every node and relationship.
    async fn clear(&self, tx: &mut Self::Tx) -> Result<()>;
}
