//! Relationship (edge) in the epidemiological property graph.

use serde::{Deserialize, Serialize};
use super::{Label, NodeRef};

/// Store-allocated relationship identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelId(pub u64);

impl std::fmt::Display for RelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// The fixed relationship vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelType {
    /// Country → City
    Contains,
    /// City → Person
    ResidedBy,
    /// Person → Person, always stored as a symmetric pair
    HasBeenWith,
    /// Person → Strain
    InfectedBy,
    /// Person → Vaccine
    VaccinatedWith,
}

impl RelType {
    pub const ALL: [RelType; 5] = [
        RelType::Contains,
        RelType::ResidedBy,
        RelType::HasBeenWith,
        RelType::InfectedBy,
        RelType::VaccinatedWith,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelType::Contains => "CONTAINS",
            RelType::ResidedBy => "RESIDED_BY",
            RelType::HasBeenWith => "HAS_BEEN_WITH",
            RelType::InfectedBy => "INFECTED_BY",
            RelType::VaccinatedWith => "VACCINATED_WITH",
        }
    }

    /// (source label, target label) allowed for this type.
    pub fn endpoints(&self) -> (Label, Label) {
        match self {
            RelType::Contains => (Label::Country, Label::City),
            RelType::ResidedBy => (Label::City, Label::Person),
            RelType::HasBeenWith => (Label::Person, Label::Person),
            RelType::InfectedBy => (Label::Person, Label::Strain),
            RelType::VaccinatedWith => (Label::Person, Label::Vaccine),
        }
    }

    pub fn accepts(&self, src: NodeRef, dst: NodeRef) -> bool {
        self.endpoints() == (src.label, dst.label)
    }
}

impl std::fmt::Display for RelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A relationship (directed edge) in the property graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelId,
    pub src: NodeRef,
    pub dst: NodeRef,
    pub rel_type: RelType,
}

impl Relationship {
    pub fn new(id: RelId, src: NodeRef, dst: NodeRef, rel_type: RelType) -> Self {
        Self { id, src, dst, rel_type }
    }

    /// The "other" end of the relationship from the given node.
    pub fn other_node(&self, from: NodeRef) -> Option<NodeRef> {
        if from == self.src { Some(self.dst) }
        else if from == self.dst { Some(self.src) }
        else { None }
    }

    pub fn touches(&self, node: NodeRef) -> bool {
        self.src == node || self.dst == node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_endpoints() {
        assert!(RelType::Contains.accepts(NodeRef::country(1), NodeRef::city(1)));
        assert!(!RelType::Contains.accepts(NodeRef::city(1), NodeRef::country(1)));
        assert!(RelType::HasBeenWith.accepts(NodeRef::person(1), NodeRef::person(2)));
        assert!(!RelType::InfectedBy.accepts(NodeRef::person(1), NodeRef::vaccine(1)));
    }

    #[test]
    fn test_other_node() {
        let rel = Relationship::new(RelId(1), NodeRef::city(1), NodeRef::person(7), RelType::ResidedBy);
        assert_eq!(rel.other_node(NodeRef::city(1)), Some(NodeRef::person(7)));
        assert_eq!(rel.other_node(NodeRef::person(7)), Some(NodeRef::city(1)));
        assert_eq!(rel.other_node(NodeRef::person(1)), None);
    }
}
