//! Epidemiological query layer.
//!
//! Read-only questions over the live graph, each answered inside one
//! read-only transaction by composing [`crate::traversal`] primitives.
//! Nothing is cached: every call recomputes from the current snapshot.
//!
//! Asking about an entity that does not exist is not an error. Per-entity
//! queries report it as [`Status::Absent`] or `None`.

use std::collections::BTreeMap;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::storage::StorageBackend;
use crate::traversal::{self, Distance, Extremum, Hop, PathPattern, Reach};
use crate::tx::TxMode;
use crate::{Graph, Result};

// ============================================================================
// Result types
// ============================================================================

/// Outcome of a per-entity yes/no question that also carries a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// The entity does not exist.
    Absent,
    /// The entity exists; `count` distinct matches were found.
    Present { count: usize },
}

impl Status {
    /// True iff the entity exists and the count is non-zero.
    pub fn is_positive(&self) -> bool {
        self.count() > 0
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Status::Absent)
    }

    pub fn count(&self) -> usize {
        match self {
            Status::Absent => 0,
            Status::Present { count } => *count,
        }
    }

    /// `(positive, count)`, with absence folded into `(false, 0)`.
    pub fn as_pair(&self) -> (bool, usize) {
        (self.is_positive(), self.count())
    }
}

/// A city or country picked by a most/least query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranked {
    pub node: NodeRef,
    pub name: String,
    pub count: usize,
}

/// What a person can be marked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Marker {
    Infection,
    Vaccination,
}

impl Marker {
    pub fn rel_type(&self) -> RelType {
        match self {
            Marker::Infection => RelType::InfectedBy,
            Marker::Vaccination => RelType::VaccinatedWith,
        }
    }

    pub fn label(&self) -> Label {
        match self {
            Marker::Infection => Label::Strain,
            Marker::Vaccination => Label::Vaccine,
        }
    }

    fn hop(&self) -> Hop {
        Hop::out(self.rel_type(), self.label())
    }
}

// ============================================================================
// Patterns
// ============================================================================

/// Person → marker, counting distinct strains/vaccines.
fn markers_of_person(marker: Marker) -> PathPattern {
    PathPattern::new().then(marker.hop())
}

/// Person → marker, counting the person (0 or 1).
fn marked_person(marker: Marker) -> PathPattern {
    PathPattern::new().then(marker.hop()).counting(0)
}

/// `scope` → ... → Person → marker, counting distinct marked residents.
/// Only cities and countries have residents.
fn marked_residents(scope: Label, marker: Marker) -> Option<PathPattern> {
    let residents = match scope {
        Label::City => PathPattern::new(),
        Label::Country => PathPattern::new().then(Hop::out(RelType::Contains, Label::City)),
        Label::Person | Label::Strain | Label::Vaccine => return None,
    };
    let pattern = residents.then(Hop::out(RelType::ResidedBy, Label::Person));
    let person_at = pattern.hops().len();
    Some(pattern.then(marker.hop()).counting(person_at))
}

/// Person → any contact → marker, counting contacts that carry it.
fn marked_contacts(marker: Marker) -> PathPattern {
    PathPattern::new().then(Hop::any_out(Label::Person)).then(marker.hop()).counting(1)
}

// ============================================================================
// Transaction-scoped building blocks
// ============================================================================

impl<B: StorageBackend> Graph<B> {
    async fn exists(&self, tx: &B::Tx, key: NodeRef) -> Result<bool> {
        Ok(self.backend.get_node(tx, key).await?.is_some())
    }

    async fn names(&self, tx: &B::Tx, keys: &[NodeRef]) -> Result<Vec<String>> {
        let mut names = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(node) = self.backend.get_node(tx, *key).await? {
                names.push(node.name);
            }
        }
        Ok(names)
    }

    async fn status_in(&self, tx: &B::Tx, start: NodeRef, pattern: &PathPattern) -> Result<Status> {
        if !self.exists(tx, start).await? {
            return Ok(Status::Absent);
        }
        let count = traversal::count_distinct_from(&self.backend, tx, start, pattern).await?;
        Ok(Status::Present { count })
    }

    async fn markers_in(&self, tx: &B::Tx, person: NodeRef, marker: Marker) -> Result<Option<Vec<String>>> {
        if !self.exists(tx, person).await? {
            return Ok(None);
        }
        let found = traversal::out_neighbors(&self.backend, tx, person, marker.rel_type(), marker.label()).await?;
        Ok(Some(self.names(tx, &found).await?))
    }

    pub(crate) async fn rollup_in(
        &self,
        tx: &B::Tx,
        scope: Label,
        marker: Marker,
    ) -> Result<BTreeMap<NodeRef, usize>> {
        match marked_residents(scope, marker) {
            Some(pattern) => traversal::count_distinct_via_path(&self.backend, tx, scope, &pattern).await,
            None => Ok(BTreeMap::new()),
        }
    }

    pub(crate) async fn rank_in(
        &self,
        tx: &B::Tx,
        scope: Label,
        marker: Marker,
        which: Extremum,
    ) -> Result<Option<Ranked>> {
        let counts = self.rollup_in(tx, scope, marker).await?;
        let Some((node, count)) = traversal::extremal(&counts, which) else {
            return Ok(None);
        };
        let name = self
            .backend
            .get_node(tx, node)
            .await?
            .map(|n| n.name)
            .unwrap_or_default();
        Ok(Some(Ranked { node, name, count }))
    }

    pub(crate) async fn total_in(&self, tx: &B::Tx, marker: Marker) -> Result<usize> {
        let counts =
            traversal::count_distinct_via_path(&self.backend, tx, Label::Person, &marked_person(marker)).await?;
        Ok(counts.values().sum())
    }

    async fn infected_people_in(&self, tx: &B::Tx) -> Result<HashSet<NodeRef>> {
        Ok(self
            .backend
            .relationships_by_type(tx, RelType::InfectedBy)
            .await?
            .into_iter()
            .map(|rel| rel.src)
            .collect())
    }

    fn contact_reach(&self) -> Reach<'static> {
        Reach {
            rel_types: &[RelType::HasBeenWith],
            direction: Direction::Outgoing,
            max_hops: self.config.max_contact_hops,
        }
    }
}

// ============================================================================
// Public queries
// ============================================================================

impl<B: StorageBackend> Graph<B> {
    // ------------------------------------------------------------------------
    // Generic forms
    // ------------------------------------------------------------------------

    /// Distinct strains (or vaccines) attached to a person.
    pub async fn person_status(&self, person_id: u64, marker: Marker) -> Result<Status> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        self.status_in(&tx, NodeRef::person(person_id), &markers_of_person(marker)).await
    }

    /// Names of the strains (or vaccines) attached to a person, in discovery order.
    pub async fn person_markers(&self, person_id: u64, marker: Marker) -> Result<Option<Vec<String>>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        self.markers_in(&tx, NodeRef::person(person_id), marker).await
    }

    /// Distinct marked residents of a city or country. Any other label is
    /// `Absent`.
    pub async fn area_status(&self, area: NodeRef, marker: Marker) -> Result<Status> {
        let Some(pattern) = marked_residents(area.label, marker) else {
            return Ok(Status::Absent);
        };
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        self.status_in(&tx, area, &pattern).await
    }

    /// Marked-resident counts for every city (or country), zeros included.
    /// Empty for labels without residents.
    pub async fn rollup(&self, scope: Label, marker: Marker) -> Result<BTreeMap<NodeRef, usize>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        self.rollup_in(&tx, scope, marker).await
    }

    /// The city (or country) with the most or fewest marked residents.
    /// Ties go to the lowest id.
    pub async fn rank(&self, scope: Label, marker: Marker, which: Extremum) -> Result<Option<Ranked>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        self.rank_in(&tx, scope, marker, which).await
    }

    /// Distinct people carrying at least one marker of this kind.
    pub async fn total(&self, marker: Marker) -> Result<usize> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        self.total_in(&tx, marker).await
    }

    // ------------------------------------------------------------------------
    // Person
    // ------------------------------------------------------------------------

    pub async fn is_infected(&self, person_id: u64) -> Result<Status> {
        self.person_status(person_id, Marker::Infection).await
    }

    pub async fn strains_of(&self, person_id: u64) -> Result<Option<Vec<String>>> {
        self.person_markers(person_id, Marker::Infection).await
    }

    pub async fn is_vaccinated(&self, person_id: u64) -> Result<Status> {
        self.person_status(person_id, Marker::Vaccination).await
    }

    pub async fn vaccines_of(&self, person_id: u64) -> Result<Option<Vec<String>>> {
        self.person_markers(person_id, Marker::Vaccination).await
    }

    /// Names of everyone the person has been with.
    pub async fn contacts_of(&self, person_id: u64) -> Result<Option<Vec<String>>> {
        let person = NodeRef::person(person_id);
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        if !self.exists(&tx, person).await? {
            return Ok(None);
        }
        let contacts =
            traversal::out_neighbors(&self.backend, &tx, person, RelType::HasBeenWith, Label::Person).await?;
        Ok(Some(self.names(&tx, &contacts).await?))
    }

    /// The city the person currently resides in.
    pub async fn city_of(&self, person_id: u64) -> Result<Option<Node>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let cities = traversal::in_neighbors(
            &self.backend, &tx, NodeRef::person(person_id), RelType::ResidedBy, Label::City,
        )
        .await?;
        match cities.first() {
            Some(city) => self.backend.get_node(&tx, *city).await,
            None => Ok(None),
        }
    }

    /// Hops along contacts from the person to the nearest infected person,
    /// bounded by `GraphConfig::max_contact_hops`. An infected person is at
    /// distance 0; an unknown person is at `Infinite`.
    pub async fn distance_to_infection(&self, person_id: u64) -> Result<Distance> {
        let person = NodeRef::person(person_id);
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        if !self.exists(&tx, person).await? {
            return Ok(Distance::Infinite);
        }
        let infected = self.infected_people_in(&tx).await?;
        traversal::shortest_hop_count(&self.backend, &tx, person, &infected, self.contact_reach()).await
    }

    /// The contact chain behind [`Graph::distance_to_infection`].
    pub async fn path_to_infection(&self, person_id: u64) -> Result<Option<Path>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let infected = self.infected_people_in(&tx).await?;
        traversal::shortest_path(&self.backend, &tx, NodeRef::person(person_id), &infected, self.contact_reach())
            .await
    }

    /// Whether any direct contact (one hop, not transitive) is infected.
    pub async fn is_in_contact_with_virus(&self, person_id: u64) -> Result<bool> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let pattern = marked_contacts(Marker::Infection);
        let infected =
            traversal::count_distinct_from(&self.backend, &tx, NodeRef::person(person_id), &pattern).await?;
        Ok(infected > 0)
    }

    // ------------------------------------------------------------------------
    // City / country
    // ------------------------------------------------------------------------

    pub async fn city_has_infected(&self, city_id: u64) -> Result<Status> {
        self.area_status(NodeRef::city(city_id), Marker::Infection).await
    }

    pub async fn city_has_vaccinated(&self, city_id: u64) -> Result<Status> {
        self.area_status(NodeRef::city(city_id), Marker::Vaccination).await
    }

    pub async fn country_has_infected(&self, country_id: u64) -> Result<Status> {
        self.area_status(NodeRef::country(country_id), Marker::Infection).await
    }

    pub async fn country_has_vaccinated(&self, country_id: u64) -> Result<Status> {
        self.area_status(NodeRef::country(country_id), Marker::Vaccination).await
    }

    /// Names of the people residing in a city.
    pub async fn residents_of(&self, city_id: u64) -> Result<Option<Vec<String>>> {
        let city = NodeRef::city(city_id);
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        if !self.exists(&tx, city).await? {
            return Ok(None);
        }
        let people = traversal::out_neighbors(&self.backend, &tx, city, RelType::ResidedBy, Label::Person).await?;
        Ok(Some(self.names(&tx, &people).await?))
    }

    // ------------------------------------------------------------------------
    // Global
    // ------------------------------------------------------------------------

    pub async fn total_infected(&self) -> Result<usize> {
        self.total(Marker::Infection).await
    }

    pub async fn total_vaccinated(&self) -> Result<usize> {
        self.total(Marker::Vaccination).await
    }

    pub async fn most_infected_city(&self) -> Result<Option<Ranked>> {
        self.rank(Label::City, Marker::Infection, Extremum::Most).await
    }

    pub async fn least_infected_city(&self) -> Result<Option<Ranked>> {
        self.rank(Label::City, Marker::Infection, Extremum::Least).await
    }

    pub async fn most_infected_country(&self) -> Result<Option<Ranked>> {
        self.rank(Label::Country, Marker::Infection, Extremum::Most).await
    }

    pub async fn least_infected_country(&self) -> Result<Option<Ranked>> {
        self.rank(Label::Country, Marker::Infection, Extremum::Least).await
    }

    pub async fn most_vaccinated_city(&self) -> Result<Option<Ranked>> {
        self.rank(Label::City, Marker::Vaccination, Extremum::Most).await
    }

    pub async fn least_vaccinated_city(&self) -> Result<Option<Ranked>> {
        self.rank(Label::City, Marker::Vaccination, Extremum::Least).await
    }

    pub async fn most_vaccinated_country(&self) -> Result<Option<Ranked>> {
        self.rank(Label::Country, Marker::Vaccination, Extremum::Most).await
    }

    pub async fn least_vaccinated_country(&self) -> Result<Option<Ranked>> {
        self.rank(Label::Country, Marker::Vaccination, Extremum::Least).await
    }
}
