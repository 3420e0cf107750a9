//! Node in the epidemiological property graph.

use serde::{Deserialize, Serialize};
use super::{PropertyMap, Value};

/// The fixed node vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Label {
    Country,
    City,
    Person,
    Strain,
    Vaccine,
}

impl Label {
    pub const ALL: [Label; 5] = [
        Label::Country,
        Label::City,
        Label::Person,
        Label::Strain,
        Label::Vaccine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Country => "Country",
            Label::City => "City",
            Label::Person => "Person",
            Label::Strain => "Strain",
            Label::Vaccine => "Vaccine",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node identity: the id is unique within its label only.
///
/// Orders by label first, then id, so enumeration over a label is
/// deterministic and ascending by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub label: Label,
    pub id: u64,
}

impl NodeRef {
    pub fn new(label: Label, id: u64) -> Self {
        Self { label, id }
    }

    pub fn country(id: u64) -> Self { Self::new(Label::Country, id) }
    pub fn city(id: u64) -> Self { Self::new(Label::City, id) }
    pub fn person(id: u64) -> Self { Self::new(Label::Person, id) }
    pub fn strain(id: u64) -> Self { Self::new(Label::Strain, id) }
    pub fn vaccine(id: u64) -> Self { Self::new(Label::Vaccine, id) }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.label, self.id)
    }
}

/// A node in the property graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub key: NodeRef,
    pub name: String,
    /// Extra attributes (population, age). Never consulted by queries.
    pub properties: PropertyMap,
}

impl Node {
    pub fn new(key: NodeRef, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn label(&self) -> Label {
        self.key.label
    }

    pub fn id(&self) -> u64 {
        self.key.id
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}
