//! In-memory storage backend.
//!
//! This is the reference implementation of `StorageBackend`.
//!
//! ## Transactions
//!
//! The committed graph is an immutable `Arc<GraphState>` behind a RwLock.
//!
//! - **Readers** clone the `Arc` at `begin_tx` and work on that snapshot,
//!   so they never block and never observe a half-applied write.
//! - **Writers** are serialized by an async mutex held for the lifetime of
//!   the transaction. The first write clones the snapshot (`Arc::make_mut`);
//!   `commit_tx` publishes the staged state in one pointer swap.
//!   `rollback_tx`, or simply dropping the transaction, discards it.
//!
//! The result is serializable isolation with all-or-nothing commits at the
//! cost of one state copy per write transaction.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hashbrown::HashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::*;
use crate::tx::{Transaction, TxId, TxMode};
use crate::{Error, Result};
use super::{BackendConfig, StorageBackend};

// ============================================================================
// GraphState
// ============================================================================

/// Per-node edge index: O(degree) neighbor lookup and cascade delete.
#[derive(Debug, Clone, Default)]
struct Adjacency {
    outgoing: SmallVec<[RelId; 4]>,
    incoming: SmallVec<[RelId; 4]>,
}

#[derive(Debug, Clone, Default)]
struct GraphState {
    nodes: HashMap<NodeRef, Node>,
    relationships: HashMap<RelId, Relationship>,
    adjacency: HashMap<NodeRef, Adjacency>,
    /// label → ids (ordered, so scans are deterministic)
    label_index: HashMap<Label, BTreeSet<u64>>,
    next_rel_id: u64,
}

impl GraphState {
    fn with_capacity(nodes: usize) -> Self {
        Self {
            nodes: HashMap::with_capacity(nodes),
            relationships: HashMap::new(),
            adjacency: HashMap::with_capacity(nodes),
            label_index: HashMap::new(),
            next_rel_id: 1,
        }
    }

    fn insert_node(&mut self, node: Node) -> Result<NodeRef> {
        let key = node.key;
        if self.nodes.contains_key(&key) {
            return Err(Error::DuplicateId(key));
        }
        self.label_index.entry(key.label).or_default().insert(key.id);
        self.adjacency.insert(key, Adjacency::default());
        self.nodes.insert(key, node);
        Ok(key)
    }

    fn insert_relationship(&mut self, src: NodeRef, dst: NodeRef, rel_type: RelType) -> Result<RelId> {
        if !self.nodes.contains_key(&src) {
            return Err(Error::NotFound(format!("Source node {src}")));
        }
        if !self.nodes.contains_key(&dst) {
            return Err(Error::NotFound(format!("Target node {dst}")));
        }
        if !rel_type.accepts(src, dst) {
            let (from, to) = rel_type.endpoints();
            return Err(Error::ConstraintViolation(format!(
                "{rel_type} must connect {from} -> {to}, got {src} -> {dst}"
            )));
        }

        let id = RelId(self.next_rel_id);
        self.next_rel_id += 1;
        self.relationships.insert(id, Relationship::new(id, src, dst, rel_type));
        self.adjacency.entry(src).or_default().outgoing.push(id);
        self.adjacency.entry(dst).or_default().incoming.push(id);
        Ok(id)
    }

    fn remove_relationship(&mut self, id: RelId) -> bool {
        let Some(rel) = self.relationships.remove(&id) else {
            return false;
        };
        if let Some(adj) = self.adjacency.get_mut(&rel.src) {
            adj.outgoing.retain(|rid| *rid != id);
        }
        if let Some(adj) = self.adjacency.get_mut(&rel.dst) {
            adj.incoming.retain(|rid| *rid != id);
        }
        true
    }

    fn remove_node(&mut self, key: NodeRef) -> Result<usize> {
        let adj = self
            .adjacency
            .remove(&key)
            .ok_or_else(|| Error::NotFound(format!("Node {key}")))?;

        let mut touching: Vec<RelId> = adj.outgoing.into_iter().chain(adj.incoming).collect();
        touching.sort_unstable();
        touching.dedup();
        let mut removed = 0;
        for id in touching {
            if self.remove_relationship(id) {
                removed += 1;
            }
        }

        self.nodes.remove(&key);
        if let Some(ids) = self.label_index.get_mut(&key.label) {
            ids.remove(&key.id);
        }
        Ok(removed)
    }

    fn relationships_of(&self, node: NodeRef, dir: Direction, rel_type: Option<RelType>) -> Vec<Relationship> {
        let Some(adj) = self.adjacency.get(&node) else {
            return Vec::new();
        };
        let ids: SmallVec<[RelId; 8]> = match dir {
            Direction::Outgoing => adj.outgoing.iter().copied().collect(),
            Direction::Incoming => adj.incoming.iter().copied().collect(),
            Direction::Both => {
                let mut ids: SmallVec<[RelId; 8]> = adj.outgoing.iter().copied().collect();
                // A self-loop sits in both lists; report it once.
                ids.extend(adj.incoming.iter().copied().filter(|id| !adj.outgoing.contains(id)));
                ids
            }
        };
        ids.iter()
            .filter_map(|id| self.relationships.get(id))
            .filter(|rel| rel_type.is_none_or(|t| rel.rel_type == t))
            .cloned()
            .collect()
    }

    fn nodes_by_label(&self, label: Label) -> Vec<Node> {
        self.label_index
            .get(&label)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.nodes.get(&NodeRef::new(label, *id)).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.relationships.clear();
        self.adjacency.clear();
        self.label_index.clear();
    }
}

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory property graph storage.
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    committed: RwLock<Arc<GraphState>>,
    /// Held by the single live write transaction.
    writer: Arc<Mutex<()>>,
    next_tx_id: AtomicU64,
    closed: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_config(&BackendConfig::default())
    }

    pub fn with_config(config: &BackendConfig) -> Self {
        let BackendConfig::Memory { node_capacity } = config;
        Self {
            inner: Arc::new(MemoryInner {
                committed: RwLock::new(Arc::new(GraphState::with_capacity(*node_capacity))),
                writer: Arc::new(Mutex::new(())),
                next_tx_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(Error::Unavailable("memory backend has been shut down".into()));
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

/// In-memory transaction: a snapshot plus, for writers, the writer lock.
#[derive(Debug)]
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
    state: Arc<GraphState>,
    _writer: Option<OwnedMutexGuard<()>>,
}

impl MemoryTx {
    fn staged(&mut self) -> Result<&mut GraphState> {
        if !self.is_writable() {
            return Err(Error::TxError(format!("{} is read-only", self.id)));
        }
        Ok(Arc::make_mut(&mut self.state))
    }
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
}

// ============================================================================
// StorageBackend impl
// ============================================================================

#[async_trait]
impl StorageBackend for MemoryBackend {
    type Tx = MemoryTx;

    async fn shutdown(&self) -> Result<()> {
        self.inner.closed.store(true, Ordering::Release);
        Ok(())
    }

    async fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> {
        self.ensure_open()?;
        // Take the writer lock before the snapshot so a writer always
        // starts from the latest committed state.
        let writer = match mode {
            TxMode::ReadWrite => Some(self.inner.writer.clone().lock_owned().await),
            TxMode::ReadOnly => None,
        };
        let state = self.inner.committed.read().clone();
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed));
        Ok(MemoryTx { id, mode, state, _writer: writer })
    }

    async fn commit_tx(&self, tx: MemoryTx) -> Result<()> {
        self.ensure_open()?;
        if tx.mode == TxMode::ReadWrite {
            *self.inner.committed.write() = tx.state;
        }
        Ok(())
    }

    async fn rollback_tx(&self, tx: MemoryTx) -> Result<()> {
        drop(tx);
        Ok(())
    }

    // ========================================================================
    // Node CRUD
    // ========================================================================

    async fn create_node(&self, tx: &mut MemoryTx, node: Node) -> Result<NodeRef> {
        tx.staged()?.insert_node(node)
    }

    async fn get_node(&self, tx: &MemoryTx, key: NodeRef) -> Result<Option<Node>> {
        Ok(tx.state.nodes.get(&key).cloned())
    }

    async fn detach_delete_node(&self, tx: &mut MemoryTx, key: NodeRef) -> Result<usize> {
        tx.staged()?.remove_node(key)
    }

    // ========================================================================
    // Relationship CRUD
    // ========================================================================

    async fn create_relationship(
        &self,
        tx: &mut MemoryTx,
        src: NodeRef,
        dst: NodeRef,
        rel_type: RelType,
    ) -> Result<RelId> {
        tx.staged()?.insert_relationship(src, dst, rel_type)
    }

    async fn delete_relationship(&self, tx: &mut MemoryTx, id: RelId) -> Result<bool> {
        Ok(tx.staged()?.remove_relationship(id))
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    async fn get_relationships(
        &self,
        tx: &MemoryTx,
        node: NodeRef,
        dir: Direction,
        rel_type: Option<RelType>,
    ) -> Result<Vec<Relationship>> {
        Ok(tx.state.relationships_of(node, dir, rel_type))
    }

    // ========================================================================
    // Schema introspection
    // ========================================================================

    async fn node_count(&self, tx: &MemoryTx) -> Result<u64> {
        Ok(tx.state.nodes.len() as u64)
    }

    async fn relationship_count(&self, tx: &MemoryTx) -> Result<u64> {
        Ok(tx.state.relationships.len() as u64)
    }

    // ========================================================================
    // Scan
    // ========================================================================

    async fn nodes_by_label(&self, tx: &MemoryTx, label: Label) -> Result<Vec<Node>> {
        Ok(tx.state.nodes_by_label(label))
    }

    // ========================================================================
    // Bulk
    // ========================================================================

    async fn clear(&self, tx: &mut MemoryTx) -> Result<()> {
        tx.staged()?.clear();
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
