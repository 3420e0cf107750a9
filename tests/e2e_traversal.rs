//! End-to-end integration tests for contact-chain traversal.
//!
//! Tests the hop bound from `GraphConfig`, nearest-carrier selection,
//! and a property check of distance and symmetry over random contact graphs.

use epigraph::{
    Direction, Distance, Graph, GraphConfig, Label, MemoryBackend, NodeRef, RelType,
    StorageBackend, TxMode, traversal,
};
use proptest::prelude::*;

type MemGraph = Graph<MemoryBackend>;

// ============================================================================
// Helper: a chain of contacts 1 - 2 - ... - n, person n infected
// ============================================================================

async fn setup_chain(graph: &MemGraph, len: u64) {
    graph.create_strain(1, "Alpha").await.unwrap();
    for id in 1..=len {
        graph.create_person(id, &format!("p{id}")).await.unwrap();
    }
    for id in 1..len {
        graph.record_contact(id, id + 1).await.unwrap();
    }
    graph.infect_person_with_strain(len, 1).await.unwrap();
}

// ============================================================================
// 1. Hop bound
// ============================================================================

#[tokio::test]
async fn test_default_bound_is_fifteen_hops() {
    let graph = Graph::open_memory().await.unwrap();
    setup_chain(&graph, 17).await;

    // p2 is 15 hops from p17, p1 is 16.
    assert_eq!(graph.distance_to_infection(2).await.unwrap(), Distance::Finite(15));
    assert_eq!(graph.distance_to_infection(1).await.unwrap(), Distance::Infinite);
}

#[tokio::test]
async fn test_configured_bound() {
    let config = GraphConfig { max_contact_hops: 2, ..GraphConfig::default() };
    let graph = Graph::open_memory_with(config).await.unwrap();
    setup_chain(&graph, 4).await;

    assert_eq!(graph.distance_to_infection(2).await.unwrap(), Distance::Finite(2));
    assert_eq!(graph.distance_to_infection(1).await.unwrap(), Distance::Infinite);
}

// ============================================================================
// 2. Nearest carrier
// ============================================================================

#[tokio::test]
async fn test_nearest_of_several_carriers() {
    let graph = Graph::open_memory().await.unwrap();
    setup_chain(&graph, 6).await;
    // A shortcut carrier two hops from p1.
    graph.create_person(7, "Eric").await.unwrap();
    graph.record_contact(2, 7).await.unwrap();
    graph.infect_person_with_strain(7, 1).await.unwrap();

    assert_eq!(graph.distance_to_infection(1).await.unwrap(), Distance::Finite(2));
    let path = graph.path_to_infection(1).await.unwrap().unwrap();
    assert_eq!(path.names(), vec!["p1", "p2", "Eric"]);
}

#[tokio::test]
async fn test_contacts_through_cycle() {
    let graph = Graph::open_memory().await.unwrap();
    setup_chain(&graph, 4).await;
    graph.record_contact(1, 4).await.unwrap();

    assert_eq!(graph.distance_to_infection(1).await.unwrap(), Distance::Finite(1));
    assert_eq!(graph.distance_to_infection(2).await.unwrap(), Distance::Finite(2));
}

#[tokio::test]
async fn test_non_contact_edges_are_not_followed() {
    let graph = Graph::open_memory().await.unwrap();
    graph.create_city(1, "Barcelona").await.unwrap();
    graph.create_strain(1, "Alpha").await.unwrap();
    graph.create_person(1, "David").await.unwrap();
    graph.create_person(2, "Alberto").await.unwrap();
    graph.reside_person_in_city(1, 1).await.unwrap();
    graph.reside_person_in_city(1, 2).await.unwrap();
    graph.infect_person_with_strain(2, 1).await.unwrap();

    // Same city, but no contact edge between them.
    assert_eq!(graph.distance_to_infection(1).await.unwrap(), Distance::Infinite);
}

// ============================================================================
// 3. Generic primitives through the backend
// ============================================================================

#[tokio::test]
async fn test_neighbors_any_direction() {
    let graph = Graph::open_memory().await.unwrap();
    setup_chain(&graph, 3).await;

    let backend = graph.backend();
    let tx = backend.begin_tx(TxMode::ReadOnly).await.unwrap();
    let around = traversal::neighbors(backend, &tx, NodeRef::person(3), Direction::Both, None, None)
        .await
        .unwrap();
    assert_eq!(around, vec![NodeRef::person(2), NodeRef::strain(1)]);

    let strains = traversal::out_neighbors(backend, &tx, NodeRef::person(3), RelType::InfectedBy, Label::Strain)
        .await
        .unwrap();
    assert_eq!(strains, vec![NodeRef::strain(1)]);
}

// ============================================================================
// 4. Property checks over random contact graphs
// ============================================================================

fn contact_graph() -> impl Strategy<Value = (u64, Vec<(u64, u64)>, Vec<u64>)> {
    (2u64..12).prop_flat_map(|n| {
        let edge = (1..=n, 1..=n).prop_filter("no self contact", |(a, b)| a != b);
        (
            Just(n),
            proptest::collection::vec(edge, 0..20),
            proptest::collection::vec(1..=n, 0..3),
        )
    })
}

/// Reference BFS over the undirected contact list.
fn reference_distance(n: u64, edges: &[(u64, u64)], infected: &[u64], from: u64) -> Option<usize> {
    let mut dist = vec![None; n as usize + 1];
    let mut queue = std::collections::VecDeque::new();
    dist[from as usize] = Some(0);
    queue.push_back(from);
    while let Some(p) = queue.pop_front() {
        let d = dist[p as usize].unwrap_or(0);
        if infected.contains(&p) {
            return Some(d);
        }
        for &(a, b) in edges {
            let next = if a == p { b } else if b == p { a } else { continue };
            if dist[next as usize].is_none() {
                dist[next as usize] = Some(d + 1);
                queue.push_back(next);
            }
        }
    }
    None
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_distance_matches_reference_bfs((n, edges, infected) in contact_graph()) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let graph = Graph::open_memory().await.unwrap();
            graph.create_strain(1, "Alpha").await.unwrap();
            for id in 1..=n {
                graph.create_person(id, &format!("p{id}")).await.unwrap();
            }
            for &(a, b) in &edges {
                graph.record_contact(a, b).await.unwrap();
            }
            for &p in &infected {
                graph.infect_person_with_strain(p, 1).await.unwrap();
            }

            for id in 1..=n {
                let expected = match reference_distance(n, &edges, &infected, id) {
                    Some(d) => Distance::Finite(d),
                    None => Distance::Infinite,
                };
                prop_assert_eq!(graph.distance_to_infection(id).await.unwrap(), expected);
            }
            Ok(())
        })?;
    }

    #[test]
    fn prop_contacts_are_symmetric((n, edges, _infected) in contact_graph()) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let graph = Graph::open_memory().await.unwrap();
            for id in 1..=n {
                graph.create_person(id, &format!("p{id}")).await.unwrap();
            }
            for &(a, b) in &edges {
                graph.record_contact(a, b).await.unwrap();
            }

            let backend = graph.backend();
            let tx = backend.begin_tx(TxMode::ReadOnly).await.unwrap();
            for rel in backend.relationships_by_type(&tx, RelType::HasBeenWith).await.unwrap() {
                let back = backend
                    .get_relationships(&tx, rel.dst, Direction::Outgoing, Some(RelType::HasBeenWith))
                    .await
                    .unwrap();
                prop_assert!(back.iter().any(|r| r.dst == rel.src));
            }
            Ok(())
        })?;
    }
}
