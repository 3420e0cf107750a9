//! Cypher DUMP export: serialize the graph as Cypher statements.
//!
//! The output loads into a Neo4j database using the same per-label id
//! properties (`person_id`, `city_id`, ...) that a Neo4j deployment of
//! this model keys its nodes on.
//!
//! ```text
//! Graph → export_cypher_dump() → CREATE / MATCH..CREATE statements
//!   → cypher-shell, or paste into Neo4j Browser
//! ```

use std::io::Write;

use crate::model::*;
use crate::storage::StorageBackend;
use crate::tx::TxMode;
use crate::Result;

/// Property that carries the node id in the Cypher dump.
pub fn id_property(label: Label) -> &'static str {
    match label {
        Label::Country => "country_id",
        Label::City => "city_id",
        Label::Person => "person_id",
        Label::Strain => "strain_id",
        Label::Vaccine => "vac_id",
    }
}

/// Export the graph as a Cypher DUMP script.
///
/// Nodes come first (by label, then id), then every relationship grouped
/// by its source node. Reads one snapshot, so the dump is consistent.
pub async fn export_cypher_dump<B: StorageBackend>(
    backend: &B,
    writer: &mut dyn Write,
) -> Result<()> {
    let tx = backend.begin_tx(TxMode::ReadOnly).await?;

    // Header
    writeln!(writer, "// epigraph Cypher DUMP")?;
    writeln!(writer, "// Nodes: {}", backend.node_count(&tx).await?)?;
    writeln!(writer, "// Relationships: {}", backend.relationship_count(&tx).await?)?;
    writeln!(writer)?;

    let nodes = backend.all_nodes(&tx).await?;
    for node in &nodes {
        writeln!(writer, "CREATE (:{} {{{}}});", node.label(), format_node_properties(node))?;
    }

    writeln!(writer)?;
    writeln!(writer, "// Relationships")?;

    for node in &nodes {
        let rels = backend.get_relationships(&tx, node.key, Direction::Outgoing, None).await?;
        for rel in rels {
            writeln!(
                writer,
                "MATCH (a{}), (b{}) CREATE (a)-[:{}]->(b);",
                format_match(rel.src),
                format_match(rel.dst),
                rel.rel_type,
            )?;
        }
    }

    backend.commit_tx(tx).await?;
    Ok(())
}

/// `:Label {label_id: n}`
fn format_match(key: NodeRef) -> String {
    format!(":{} {{{}: {}}}", key.label, id_property(key.label), key.id)
}

/// Id and name first, then the extra properties in key order.
fn format_node_properties(node: &Node) -> String {
    let mut parts = vec![
        format!("{}: {}", id_property(node.label()), node.id()),
        format!("name: {}", Value::from(node.name.as_str())),
    ];
    for (key, value) in &node.properties {
        if key == "name" || key == id_property(node.label()) {
            continue;
        }
        parts.push(format!("{key}: {value}"));
    }
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_node_properties() {
        let node = Node::new(NodeRef::city(2), "Madrid").with_property("population", 3_300_000);
        assert_eq!(
            format_node_properties(&node),
            "city_id: 2, name: 'Madrid', population: 3300000"
        );
    }

    #[test]
    fn test_format_match() {
        assert_eq!(format_match(NodeRef::vaccine(4)), ":Vaccine {vac_id: 4}");
    }
}
