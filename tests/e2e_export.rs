//! End-to-end integration tests for the Cypher DUMP export.

use epigraph::{Graph, export::export_cypher_dump};

async fn dump(graph: &Graph<epigraph::MemoryBackend>) -> String {
    let mut buf = Vec::new();
    export_cypher_dump(graph.backend(), &mut buf).await.unwrap();
    String::from_utf8(buf).unwrap()
}

#[tokio::test]
async fn test_export_empty_graph() {
    let graph = Graph::open_memory().await.unwrap();
    let out = dump(&graph).await;

    assert!(out.contains("// Nodes: 0"));
    assert!(out.contains("// Relationships: 0"));
    assert!(!out.contains("CREATE ("));
}

#[tokio::test]
async fn test_export_nodes_and_edges() {
    let graph = Graph::open_memory().await.unwrap();
    graph.create_country(1, "Spain").await.unwrap();
    graph.create_city(1, "Barcelona").await.unwrap();
    graph.add_city_to_country(1, 1).await.unwrap();
    graph.create_person(1, "David").await.unwrap();
    graph.create_person(2, "Alberto").await.unwrap();
    graph.reside_person_in_city(1, 1).await.unwrap();
    graph.record_contact(1, 2).await.unwrap();
    graph.create_vaccine(3, "Pfizer").await.unwrap();
    graph.vaccinate_person_with_vaccine(2, 3).await.unwrap();

    let out = dump(&graph).await;

    assert!(out.contains("// Nodes: 5"));
    assert!(out.contains("// Relationships: 5"));
    assert!(out.contains("CREATE (:Country {country_id: 1, name: 'Spain'});"));
    assert!(out.contains("CREATE (:Vaccine {vac_id: 3, name: 'Pfizer'});"));
    assert!(out.contains(
        "MATCH (a:Country {country_id: 1}), (b:City {city_id: 1}) CREATE (a)-[:CONTAINS]->(b);"
    ));
    assert!(out.contains(
        "MATCH (a:Person {person_id: 1}), (b:Person {person_id: 2}) CREATE (a)-[:HAS_BEEN_WITH]->(b);"
    ));
    assert!(out.contains(
        "MATCH (a:Person {person_id: 2}), (b:Person {person_id: 1}) CREATE (a)-[:HAS_BEEN_WITH]->(b);"
    ));
    assert!(out.contains(
        "MATCH (a:Person {person_id: 2}), (b:Vaccine {vac_id: 3}) CREATE (a)-[:VACCINATED_WITH]->(b);"
    ));

    // Every node statement precedes every relationship statement.
    let last_create = out.rfind("CREATE (:").unwrap();
    let first_match = out.find("MATCH").unwrap();
    assert!(last_create < first_match);
}

#[tokio::test]
async fn test_export_escapes_names() {
    let graph = Graph::open_memory().await.unwrap();
    graph.create_city(1, "L'Hospitalet").await.unwrap();

    let out = dump(&graph).await;
    assert!(out.contains(r"name: 'L\'Hospitalet'"));
}
