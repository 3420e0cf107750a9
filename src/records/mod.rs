//! Relational collaborator: durable identity and demographic records.
//!
//! The graph never reads these records back. The store is used for two
//! things only:
//!
//! - allocating the integer ids that graph nodes are created with
//! - logging aggregate query outputs (`record_stat`)
//!
//! `RecordStore` is the narrow interface a SQL-backed implementation would
//! provide; [`MemoryRecordStore`] is the in-process implementation used for
//! embedding and tests.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::model::Label;
use crate::{Error, Result};

// ============================================================================
// Record DTOs
// ============================================================================

/// One demographic row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub table: Label,
    pub id: u64,
    pub name: String,
    /// Population for countries and cities.
    pub population: Option<u64>,
    /// Age for people.
    pub age: Option<u32>,
}

/// Kinds of aggregate output that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    TotalInfected,
    TotalVaccinated,
    MostInfectedCity,
    LeastInfectedCity,
    MostInfectedCountry,
    LeastInfectedCountry,
    MostVaccinatedCity,
    LeastVaccinatedCity,
    MostVaccinatedCountry,
    LeastVaccinatedCountry,
}

/// A logged aggregate output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatEntry {
    pub kind: StatKind,
    pub payload: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

// ============================================================================
// RecordStore Trait
// ============================================================================

/// Append-only record sink with id allocation.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    async fn create_country_record(&self, name: &str, population: u64) -> Result<u64>;

    async fn create_city_record(&self, name: &str, population: u64) -> Result<u64>;

    async fn create_person_record(&self, name: &str, age: u32) -> Result<u64>;

    async fn create_strain_record(&self, name: &str) -> Result<u64>;

    async fn create_vaccine_record(&self, name: &str) -> Result<u64>;

    /// Fails with `NotFound` if no such person record exists.
    async fn delete_person_record(&self, id: u64) -> Result<()>;

    async fn record_stat(
        &self,
        kind: StatKind,
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Result<()>;

    /// Drop and recreate every table. Id sequences restart.
    async fn reset_schema(&self) -> Result<()>;
}

// ============================================================================
// MemoryRecordStore
// ============================================================================

#[derive(Debug, Default)]
struct Tables {
    records: Vec<Record>,
    stats: Vec<StatEntry>,
}

/// In-memory `RecordStore`. Each table has its own id sequence starting at 1,
/// like an auto-increment column.
pub struct MemoryRecordStore {
    tables: RwLock<Tables>,
    sequences: [AtomicU64; 5],
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            sequences: std::array::from_fn(|_| AtomicU64::new(1)),
        }
    }

    fn sequence(&self, table: Label) -> &AtomicU64 {
        let slot = Label::ALL.iter().position(|l| *l == table).unwrap_or(0);
        &self.sequences[slot]
    }

    fn append(&self, table: Label, name: &str, population: Option<u64>, age: Option<u32>) -> u64 {
        let id = self.sequence(table).fetch_add(1, Ordering::Relaxed);
        self.tables.write().records.push(Record {
            table,
            id,
            name: name.to_string(),
            population,
            age,
        });
        id
    }

    /// Rows of one table, in insertion order.
    pub fn records(&self, table: Label) -> Vec<Record> {
        self.tables
            .read()
            .records
            .iter()
            .filter(|r| r.table == table)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> Vec<StatEntry> {
        self.tables.read().stats.clone()
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create_country_record(&self, name: &str, population: u64) -> Result<u64> {
        Ok(self.append(Label::Country, name, Some(population), None))
    }

    async fn create_city_record(&self, name: &str, population: u64) -> Result<u64> {
        Ok(self.append(Label::City, name, Some(population), None))
    }

    async fn create_person_record(&self, name: &str, age: u32) -> Result<u64> {
        Ok(self.append(Label::Person, name, None, Some(age)))
    }

    async fn create_strain_record(&self, name: &str) -> Result<u64> {
        Ok(self.append(Label::Strain, name, None, None))
    }

    async fn create_vaccine_record(&self, name: &str) -> Result<u64> {
        Ok(self.append(Label::Vaccine, name, None, None))
    }

    async fn delete_person_record(&self, id: u64) -> Result<()> {
        let mut tables = self.tables.write();
        let before = tables.records.len();
        tables.records.retain(|r| !(r.table == Label::Person && r.id == id));
        if tables.records.len() == before {
            return Err(Error::NotFound(format!("person record {id}")));
        }
        Ok(())
    }

    async fn record_stat(
        &self,
        kind: StatKind,
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        self.tables.write().stats.push(StatEntry { kind, payload, recorded_at: timestamp });
        Ok(())
    }

    async fn reset_schema(&self) -> Result<()> {
        *self.tables.write() = Tables::default();
        for seq in &self.sequences {
            seq.store(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequences_are_per_table() {
        let store = MemoryRecordStore::new();
        assert_eq!(store.create_country_record("Spain", 47_000_000).await.unwrap(), 1);
        assert_eq!(store.create_city_record("Barcelona", 1_600_000).await.unwrap(), 1);
        assert_eq!(store.create_city_record("Madrid", 3_300_000).await.unwrap(), 2);
        assert_eq!(store.create_person_record("David", 12).await.unwrap(), 1);

        let cities = store.records(Label::City);
        assert_eq!(cities.len(), 2);
        assert_eq!(cities[1].population, Some(3_300_000));
    }

    #[tokio::test]
    async fn test_delete_person_record() {
        let store = MemoryRecordStore::new();
        let id = store.create_person_record("Samuel", 56).await.unwrap();
        store.delete_person_record(id).await.unwrap();
        assert!(store.records(Label::Person).is_empty());

        let err = store.delete_person_record(id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reset_schema_restarts_ids() {
        let store = MemoryRecordStore::new();
        store.create_strain_record("Alpha").await.unwrap();
        store.record_stat(StatKind::TotalInfected, serde_json::json!({"count": 1}), Utc::now()).await.unwrap();
        store.reset_schema().await.unwrap();

        assert!(store.stats().is_empty());
        assert_eq!(store.create_strain_record("Delta").await.unwrap(), 1);
    }
}
