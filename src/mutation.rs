//! Mutation API: one typed call per domain entity and relationship.
//!
//! Every method opens its own read-write transaction, commits it on
//! success and rolls it back on any error, so a failed call leaves no
//! trace in the store. Compound operations (`record_contact`,
//! `relocate_person`) stage all their edges in that one transaction.

use tracing::{debug, info};

use crate::model::*;
use crate::storage::StorageBackend;
use crate::traversal;
use crate::tx::TxMode;
use crate::{Error, Graph, Result};

impl<B: StorageBackend> Graph<B> {
    // ========================================================================
    // Nodes
    // ========================================================================

    /// Create a node with extra properties. Fails with `DuplicateId` if
    /// `(label, id)` is taken.
    pub async fn create_node_with(
        &self,
        label: Label,
        id: u64,
        name: &str,
        properties: PropertyMap,
    ) -> Result<NodeRef> {
        let mut node = Node::new(NodeRef::new(label, id), name);
        node.properties = properties;

        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let outcome = self.backend.create_node(&mut tx, node).await;
        let key = self.finish(tx, outcome).await?;
        debug!(node = %key, name, "created node");
        Ok(key)
    }

    pub async fn create_country(&self, id: u64, name: &str) -> Result<NodeRef> {
        self.create_node_with(Label::Country, id, name, PropertyMap::new()).await
    }

    pub async fn create_city(&self, id: u64, name: &str) -> Result<NodeRef> {
        self.create_node_with(Label::City, id, name, PropertyMap::new()).await
    }

    pub async fn create_person(&self, id: u64, name: &str) -> Result<NodeRef> {
        self.create_node_with(Label::Person, id, name, PropertyMap::new()).await
    }

    pub async fn create_strain(&self, id: u64, name: &str) -> Result<NodeRef> {
        self.create_node_with(Label::Strain, id, name, PropertyMap::new()).await
    }

    pub async fn create_vaccine(&self, id: u64, name: &str) -> Result<NodeRef> {
        self.create_node_with(Label::Vaccine, id, name, PropertyMap::new()).await
    }

    /// Remove a person and every edge touching them (residency, contacts
    /// in both directions, infections, vaccinations).
    pub async fn delete_person(&self, person_id: u64) -> Result<usize> {
        let person = NodeRef::person(person_id);
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let outcome = self.backend.detach_delete_node(&mut tx, person).await;
        let removed = self.finish(tx, outcome).await?;
        debug!(%person, edges = removed, "deleted person");
        Ok(removed)
    }

    /// Remove every node and relationship.
    pub async fn delete_all(&self) -> Result<()> {
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let outcome = self.backend.clear(&mut tx).await;
        self.finish(tx, outcome).await?;
        info!("graph cleared");
        Ok(())
    }

    // ========================================================================
    // Relationships
    // ========================================================================

    /// `(:Country)-[:CONTAINS]->(:City)`. A city belongs to at most one country.
    pub async fn add_city_to_country(&self, country_id: u64, city_id: u64) -> Result<RelId> {
        let (country, city) = (NodeRef::country(country_id), NodeRef::city(city_id));
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let outcome = self.link_exclusive(&mut tx, country, city, RelType::Contains).await;
        let id = self.finish(tx, outcome).await?;
        debug!(%country, %city, "country contains city");
        Ok(id)
    }

    /// `(:City)-[:RESIDED_BY]->(:Person)`. Fails with `ConstraintViolation`
    /// if the person already resides somewhere; use [`Graph::relocate_person`].
    pub async fn reside_person_in_city(&self, city_id: u64, person_id: u64) -> Result<RelId> {
        let (city, person) = (NodeRef::city(city_id), NodeRef::person(person_id));
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let outcome = self.link_exclusive(&mut tx, city, person, RelType::ResidedBy).await;
        let id = self.finish(tx, outcome).await?;
        debug!(%city, %person, "person resides in city");
        Ok(id)
    }

    /// Record a contact as a symmetric pair of `HAS_BEEN_WITH` edges.
    /// Either both edges exist afterwards or neither does. A person in
    /// contact with themselves gets two self-loops.
    pub async fn record_contact(&self, person1_id: u64, person2_id: u64) -> Result<(RelId, RelId)> {
        let (p1, p2) = (NodeRef::person(person1_id), NodeRef::person(person2_id));
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let outcome = async {
            let forward = self.backend.create_relationship(&mut tx, p1, p2, RelType::HasBeenWith).await?;
            let backward = self.backend.create_relationship(&mut tx, p2, p1, RelType::HasBeenWith).await?;
            Ok::<_, Error>((forward, backward))
        }
        .await;
        let ids = self.finish(tx, outcome).await?;
        debug!(%p1, %p2, "contact recorded");
        Ok(ids)
    }

    /// `(:Person)-[:INFECTED_BY]->(:Strain)`.
    pub async fn infect_person_with_strain(&self, person_id: u64, strain_id: u64) -> Result<RelId> {
        let (person, strain) = (NodeRef::person(person_id), NodeRef::strain(strain_id));
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let outcome = self.backend.create_relationship(&mut tx, person, strain, RelType::InfectedBy).await;
        let id = self.finish(tx, outcome).await?;
        debug!(%person, %strain, "person infected");
        Ok(id)
    }

    /// Remove every `INFECTED_BY` edge from the person to the strain.
    pub async fn cure_person_of_strain(&self, person_id: u64, strain_id: u64) -> Result<usize> {
        let (person, strain) = (NodeRef::person(person_id), NodeRef::strain(strain_id));
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let outcome = async {
            self.require(&tx, person).await?;
            self.require(&tx, strain).await?;
            self.backend.delete_relationships_between(&mut tx, person, strain, RelType::InfectedBy).await
        }
        .await;
        let removed = self.finish(tx, outcome).await?;
        debug!(%person, %strain, "infection removed");
        Ok(removed)
    }

    /// `(:Person)-[:VACCINATED_WITH]->(:Vaccine)`.
    pub async fn vaccinate_person_with_vaccine(&self, person_id: u64, vaccine_id: u64) -> Result<RelId> {
        let (person, vaccine) = (NodeRef::person(person_id), NodeRef::vaccine(vaccine_id));
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let outcome = self
            .backend
            .create_relationship(&mut tx, person, vaccine, RelType::VaccinatedWith)
            .await;
        let id = self.finish(tx, outcome).await?;
        debug!(%person, %vaccine, "person vaccinated");
        Ok(id)
    }

    /// Move a person to another city in one atomic step: drop the current
    /// residency edge (if any), then create the new one. A person with no
    /// residency simply gains one.
    pub async fn relocate_person(&self, person_id: u64, new_city_id: u64) -> Result<RelId> {
        let (person, new_city) = (NodeRef::person(person_id), NodeRef::city(new_city_id));
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let outcome = async {
            self.require(&tx, person).await?;
            self.require(&tx, new_city).await?;
            let current = self
                .backend
                .get_relationships(&tx, person, Direction::Incoming, Some(RelType::ResidedBy))
                .await?;
            for rel in &current {
                self.backend.delete_relationship(&mut tx, rel.id).await?;
            }
            self.backend.create_relationship(&mut tx, new_city, person, RelType::ResidedBy).await
        }
        .await;
        let id = self.finish(tx, outcome).await?;
        debug!(%person, city = %new_city, "person relocated");
        Ok(id)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn require(&self, tx: &B::Tx, key: NodeRef) -> Result<()> {
        match self.backend.get_node(tx, key).await? {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("Node {key}"))),
        }
    }

    /// Create `src -[rel_type]-> dst` unless `dst` already has an incoming
    /// edge of that type.
    async fn link_exclusive(
        &self,
        tx: &mut B::Tx,
        src: NodeRef,
        dst: NodeRef,
        rel_type: RelType,
    ) -> Result<RelId> {
        self.require(tx, src).await?;
        self.require(tx, dst).await?;
        let (owner_label, _) = rel_type.endpoints();
        let owners = traversal::in_neighbors(&self.backend, tx, dst, rel_type, owner_label).await?;
        if let Some(owner) = owners.first() {
            return Err(Error::ConstraintViolation(format!(
                "{dst} already has {rel_type} from {owner}"
            )));
        }
        self.backend.create_relationship(tx, src, dst, rel_type).await
    }
}
