//! Traversal engine: generic graph algorithms over a `StorageBackend`.
//!
//! Every domain query in [`crate::query`] is built from these primitives:
//!
//! | Primitive | Use |
//! |-----------|-----|
//! | [`out_neighbors`] / [`in_neighbors`] | one-hop lookups (strains of a person, city of a person) |
//! | [`PathPattern`] + [`count_distinct_from`] | "how many residents of this city are infected" |
//! | [`count_distinct_via_path`] | the same count for every node of a label (rollups) |
//! | [`shortest_hop_count`] / [`shortest_path`] | bounded BFS (distance to infection) |
//! | [`extremal`] | most/least selection with a deterministic tie-break |
//!
//! All functions read through a caller-supplied transaction, so a query
//! composed of several primitives sees one consistent snapshot.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::trace;

use crate::model::*;
use crate::storage::StorageBackend;
use crate::Result;

// ============================================================================
// Neighbor lookup
// ============================================================================

/// Distinct nodes one hop away, in discovery order.
///
/// `rel_type: None` follows any relationship type; `target: None` accepts
/// any label.
pub async fn neighbors<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    node: NodeRef,
    dir: Direction,
    rel_type: Option<RelType>,
    target: Option<Label>,
) -> Result<Vec<NodeRef>> {
    let rels = backend.get_relationships(tx, node, dir, rel_type).await?;
    let mut seen = HashSet::with_capacity(rels.len());
    let mut result = Vec::with_capacity(rels.len());
    for rel in rels {
        let Some(next) = rel.other_node(node) else { continue };
        if target.is_some_and(|label| next.label != label) {
            continue;
        }
        if seen.insert(next) {
            result.push(next);
        }
    }
    Ok(result)
}

/// Distinct `target` nodes reachable over one outgoing `rel_type` edge.
pub async fn out_neighbors<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    node: NodeRef,
    rel_type: RelType,
    target: Label,
) -> Result<Vec<NodeRef>> {
    neighbors(backend, tx, node, Direction::Outgoing, Some(rel_type), Some(target)).await
}

/// Distinct `source` nodes with an incoming `rel_type` edge into `node`.
pub async fn in_neighbors<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    node: NodeRef,
    rel_type: RelType,
    source: Label,
) -> Result<Vec<NodeRef>> {
    neighbors(backend, tx, node, Direction::Incoming, Some(rel_type), Some(source)).await
}

// ============================================================================
// Path patterns
// ============================================================================

/// One step of a [`PathPattern`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    /// `None` matches any relationship type, like `-[]->` in Cypher.
    pub rel_type: Option<RelType>,
    pub direction: Direction,
    /// Label the hop must land on.
    pub label: Label,
}

impl Hop {
    pub fn out(rel_type: RelType, label: Label) -> Self {
        Self { rel_type: Some(rel_type), direction: Direction::Outgoing, label }
    }

    pub fn any_out(label: Label) -> Self {
        Self { rel_type: None, direction: Direction::Outgoing, label }
    }
}

/// A fixed multi-hop pattern anchored at a start node.
///
/// The pattern counts the distinct nodes found at one position along it
/// (by default the last) that also complete the remaining hops. For
/// `City -[:RESIDED_BY]-> Person -[:INFECTED_BY]-> Strain` counted at
/// position 1, that is "residents with at least one strain".
///
/// Position 0 is the start node itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathPattern {
    hops: SmallVec<[Hop; 4]>,
    counted: Option<usize>,
}

impl PathPattern {
    pub fn new() -> Self {
        Self { hops: SmallVec::new(), counted: None }
    }

    pub fn then(mut self, hop: Hop) -> Self {
        self.hops.push(hop);
        self
    }

    /// Count nodes at `position` (0 = start, `n` = after hop `n`).
    /// Positions past the end clamp to the last node.
    pub fn counting(mut self, position: usize) -> Self {
        self.counted = Some(position);
        self
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    pub fn counted_position(&self) -> usize {
        self.counted.unwrap_or(self.hops.len()).min(self.hops.len())
    }
}

impl Default for PathPattern {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand a frontier by one hop, keeping nodes distinct and in discovery order.
async fn step<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    frontier: &[NodeRef],
    hop: &Hop,
) -> Result<Vec<NodeRef>> {
    let mut seen = HashSet::new();
    let mut next = Vec::new();
    for &node in frontier {
        for n in neighbors(backend, tx, node, hop.direction, hop.rel_type, Some(hop.label)).await? {
            if seen.insert(n) {
                next.push(n);
            }
        }
    }
    Ok(next)
}

/// Whether at least one match of `tail` starts at `node`.
async fn completes<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    node: NodeRef,
    tail: &[Hop],
) -> Result<bool> {
    let mut frontier = vec![node];
    for hop in tail {
        frontier = step(backend, tx, &frontier, hop).await?;
        if frontier.is_empty() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Distinct nodes at the pattern's counted position, for one start node.
pub async fn matches_from<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    start: NodeRef,
    pattern: &PathPattern,
) -> Result<Vec<NodeRef>> {
    let k = pattern.counted_position();
    let (head, tail) = pattern.hops().split_at(k);

    let mut frontier = vec![start];
    for hop in head {
        frontier = step(backend, tx, &frontier, hop).await?;
        if frontier.is_empty() {
            return Ok(frontier);
        }
    }
    if tail.is_empty() {
        return Ok(frontier);
    }

    let mut result = Vec::with_capacity(frontier.len());
    for node in frontier {
        if completes(backend, tx, node, tail).await? {
            result.push(node);
        }
    }
    Ok(result)
}

/// Number of distinct nodes at the pattern's counted position, for one start node.
pub async fn count_distinct_from<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    start: NodeRef,
    pattern: &PathPattern,
) -> Result<usize> {
    Ok(matches_from(backend, tx, start, pattern).await?.len())
}

/// Per-node counts for every node of `start_label`.
///
/// Nodes with no qualifying path are present with a count of 0, so
/// minimum searches over the result consider them.
pub async fn count_distinct_via_path<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    start_label: Label,
    pattern: &PathPattern,
) -> Result<BTreeMap<NodeRef, usize>> {
    let mut counts = BTreeMap::new();
    for node in backend.nodes_by_label(tx, start_label).await? {
        let count = count_distinct_from(backend, tx, node.key, pattern).await?;
        counts.insert(node.key, count);
    }
    trace!(label = %start_label, nodes = counts.len(), "rollup computed");
    Ok(counts)
}

// ============================================================================
// Bounded shortest path
// ============================================================================

/// Hop distance, with an explicit "not reachable within the bound".
///
/// Orders every finite distance before `Infinite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Distance {
    Finite(usize),
    Infinite,
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::Finite(n) => write!(f, "{n}"),
            Distance::Infinite => write!(f, "inf"),
        }
    }
}

/// Edges filter for BFS: empty `rel_types` follows every type.
#[derive(Debug, Clone, Copy)]
pub struct Reach<'a> {
    pub rel_types: &'a [RelType],
    pub direction: Direction,
    pub max_hops: usize,
}

/// BFS from `from` to the nearest member of `targets`; returns the edge chain.
async fn bfs<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    from: NodeRef,
    targets: &HashSet<NodeRef>,
    reach: Reach<'_>,
) -> Result<Option<Vec<Relationship>>> {
    if targets.contains(&from) {
        return Ok(Some(Vec::new()));
    }

    let mut parents: HashMap<NodeRef, Relationship> = HashMap::new();
    let mut visited: HashSet<NodeRef> = HashSet::new();
    visited.insert(from);
    let mut queue = VecDeque::from([(from, 0usize)]);

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= reach.max_hops {
            continue;
        }
        for rel in backend.get_relationships(tx, node, reach.direction, None).await? {
            if !reach.rel_types.is_empty() && !reach.rel_types.contains(&rel.rel_type) {
                continue;
            }
            let Some(next) = rel.other_node(node) else { continue };
            if !visited.insert(next) {
                continue;
            }
            parents.insert(next, rel);
            if targets.contains(&next) {
                return Ok(Some(unwind(&parents, from, next)));
            }
            queue.push_back((next, depth + 1));
        }
    }
    Ok(None)
}

fn unwind(parents: &HashMap<NodeRef, Relationship>, from: NodeRef, to: NodeRef) -> Vec<Relationship> {
    let mut chain = Vec::new();
    let mut cursor = to;
    while cursor != from {
        let Some(rel) = parents.get(&cursor) else { break };
        chain.push(rel.clone());
        match rel.other_node(cursor) {
            Some(prev) => cursor = prev,
            None => break,
        }
    }
    chain.reverse();
    chain
}

/// Minimum number of hops from `from` to ANY node in `targets`, bounded by
/// `reach.max_hops`. 0 when `from` is itself a target.
pub async fn shortest_hop_count<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    from: NodeRef,
    targets: &HashSet<NodeRef>,
    reach: Reach<'_>,
) -> Result<Distance> {
    Ok(match bfs(backend, tx, from, targets, reach).await? {
        Some(chain) => Distance::Finite(chain.len()),
        None => Distance::Infinite,
    })
}

/// The concrete shortest path behind [`shortest_hop_count`].
///
/// Returns None when `from` does not exist or no target is within reach.
pub async fn shortest_path<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    from: NodeRef,
    targets: &HashSet<NodeRef>,
    reach: Reach<'_>,
) -> Result<Option<Path>> {
    let Some(start) = backend.get_node(tx, from).await? else {
        return Ok(None);
    };
    let Some(chain) = bfs(backend, tx, from, targets, reach).await? else {
        return Ok(None);
    };

    let mut path = Path::single(start);
    let mut cursor = from;
    for rel in chain {
        let Some(next) = rel.other_node(cursor) else { break };
        let Some(node) = backend.get_node(tx, next).await? else { break };
        path.append(rel, node);
        cursor = next;
    }
    Ok(Some(path))
}

// ============================================================================
// Extremal selection
// ============================================================================

/// Which end of a count ranking to pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extremum {
    Most,
    Least,
}

/// The entry with the highest or lowest count. Ties go to the smallest
/// `NodeRef` (lowest id), independent of insertion history.
pub fn extremal(counts: &BTreeMap<NodeRef, usize>, which: Extremum) -> Option<(NodeRef, usize)> {
    let mut best: Option<(NodeRef, usize)> = None;
    for (&node, &count) in counts {
        let better = match (best, which) {
            (None, _) => true,
            (Some((_, b)), Extremum::Most) => count > b,
            (Some((_, b)), Extremum::Least) => count < b,
        };
        if better {
            best = Some((node, count));
        }
    }
    best
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use crate::tx::TxMode;

    async fn chain(db: &MemoryBackend, len: u64) -> <MemoryBackend as StorageBackend>::Tx {
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        for id in 1..=len {
            db.create_node(&mut tx, Node::new(NodeRef::person(id), format!("p{id}"))).await.unwrap();
        }
        for id in 1..len {
            let (a, b) = (NodeRef::person(id), NodeRef::person(id + 1));
            db.create_relationship(&mut tx, a, b, RelType::HasBeenWith).await.unwrap();
            db.create_relationship(&mut tx, b, a, RelType::HasBeenWith).await.unwrap();
        }
        tx
    }

    fn contacts(max_hops: usize) -> Reach<'static> {
        Reach { rel_types: &[RelType::HasBeenWith], direction: Direction::Outgoing, max_hops }
    }

    #[tokio::test]
    async fn test_neighbors_are_distinct() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let p = db.create_node(&mut tx, Node::new(NodeRef::person(1), "David")).await.unwrap();
        let s = db.create_node(&mut tx, Node::new(NodeRef::strain(1), "Alpha")).await.unwrap();
        db.create_relationship(&mut tx, p, s, RelType::InfectedBy).await.unwrap();
        db.create_relationship(&mut tx, p, s, RelType::InfectedBy).await.unwrap();

        let strains = out_neighbors(&db, &tx, p, RelType::InfectedBy, Label::Strain).await.unwrap();
        assert_eq!(strains, vec![s]);
        let infected = in_neighbors(&db, &tx, s, RelType::InfectedBy, Label::Person).await.unwrap();
        assert_eq!(infected, vec![p]);
    }

    #[tokio::test]
    async fn test_shortest_hop_count_along_chain() {
        let db = MemoryBackend::new();
        let tx = chain(&db, 5).await;
        let targets: HashSet<NodeRef> = [NodeRef::person(5)].into_iter().collect();

        let d = shortest_hop_count(&db, &tx, NodeRef::person(1), &targets, contacts(15)).await.unwrap();
        assert_eq!(d, Distance::Finite(4));

        let d = shortest_hop_count(&db, &tx, NodeRef::person(1), &targets, contacts(3)).await.unwrap();
        assert_eq!(d, Distance::Infinite);

        let d = shortest_hop_count(&db, &tx, NodeRef::person(5), &targets, contacts(15)).await.unwrap();
        assert_eq!(d, Distance::Finite(0));
    }

    #[tokio::test]
    async fn test_shortest_path_names() {
        let db = MemoryBackend::new();
        let tx = chain(&db, 3).await;
        let targets: HashSet<NodeRef> = [NodeRef::person(3)].into_iter().collect();

        let path = shortest_path(&db, &tx, NodeRef::person(1), &targets, contacts(15))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path.names(), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_extremal_tie_break_lowest_id() {
        let counts: BTreeMap<NodeRef, usize> = [
            (NodeRef::city(3), 2),
            (NodeRef::city(1), 2),
            (NodeRef::city(2), 0),
            (NodeRef::city(4), 0),
        ]
        .into_iter()
        .collect();

        assert_eq!(extremal(&counts, Extremum::Most), Some((NodeRef::city(1), 2)));
        assert_eq!(extremal(&counts, Extremum::Least), Some((NodeRef::city(2), 0)));
        assert_eq!(extremal(&BTreeMap::new(), Extremum::Most), None);
    }

    #[test]
    fn test_distance_ordering() {
        assert!(Distance::Finite(15) < Distance::Infinite);
        assert!(Distance::Finite(1) < Distance::Finite(2));
        assert_eq!(Distance::Infinite.to_string(), "inf");
    }

    #[test]
    fn test_counted_position_clamps() {
        let pattern = PathPattern::new()
            .then(Hop::out(RelType::ResidedBy, Label::Person))
            .counting(7);
        assert_eq!(pattern.counted_position(), 1);
        assert_eq!(PathPattern::new().counted_position(), 0);
    }
}
