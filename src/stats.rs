//! Aggregate snapshot of the epidemic and its publication to the record store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::Label;
use crate::query::{Marker, Ranked};
use crate::records::{RecordStore, StatKind};
use crate::storage::StorageBackend;
use crate::traversal::Extremum;
use crate::tx::TxMode;
use crate::{Graph, Result};

/// Every global aggregate, computed from one consistent snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpidemicSummary {
    pub taken_at: DateTime<Utc>,
    pub total_infected: usize,
    pub total_vaccinated: usize,
    pub most_infected_city: Option<Ranked>,
    pub least_infected_city: Option<Ranked>,
    pub most_infected_country: Option<Ranked>,
    pub least_infected_country: Option<Ranked>,
    pub most_vaccinated_city: Option<Ranked>,
    pub least_vaccinated_city: Option<Ranked>,
    pub most_vaccinated_country: Option<Ranked>,
    pub least_vaccinated_country: Option<Ranked>,
}

impl EpidemicSummary {
    /// One `(kind, payload)` pair per figure, in a fixed order.
    pub fn entries(&self) -> Result<Vec<(StatKind, serde_json::Value)>> {
        let ranked = |r: &Option<Ranked>| serde_json::to_value(r);
        Ok(vec![
            (StatKind::TotalInfected, serde_json::json!({ "count": self.total_infected })),
            (StatKind::TotalVaccinated, serde_json::json!({ "count": self.total_vaccinated })),
            (StatKind::MostInfectedCity, ranked(&self.most_infected_city)?),
            (StatKind::LeastInfectedCity, ranked(&self.least_infected_city)?),
            (StatKind::MostInfectedCountry, ranked(&self.most_infected_country)?),
            (StatKind::LeastInfectedCountry, ranked(&self.least_infected_country)?),
            (StatKind::MostVaccinatedCity, ranked(&self.most_vaccinated_city)?),
            (StatKind::LeastVaccinatedCity, ranked(&self.least_vaccinated_city)?),
            (StatKind::MostVaccinatedCountry, ranked(&self.most_vaccinated_country)?),
            (StatKind::LeastVaccinatedCountry, ranked(&self.least_vaccinated_country)?),
        ])
    }
}

impl<B: StorageBackend> Graph<B> {
    /// Compute every global aggregate inside a single read transaction.
    pub async fn summary(&self) -> Result<EpidemicSummary> {
        use Extremum::{Least, Most};
        use Label::{City, Country};
        use Marker::{Infection, Vaccination};

        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        Ok(EpidemicSummary {
            taken_at: Utc::now(),
            total_infected: self.total_in(&tx, Infection).await?,
            total_vaccinated: self.total_in(&tx, Vaccination).await?,
            most_infected_city: self.rank_in(&tx, City, Infection, Most).await?,
            least_infected_city: self.rank_in(&tx, City, Infection, Least).await?,
            most_infected_country: self.rank_in(&tx, Country, Infection, Most).await?,
            least_infected_country: self.rank_in(&tx, Country, Infection, Least).await?,
            most_vaccinated_city: self.rank_in(&tx, City, Vaccination, Most).await?,
            least_vaccinated_city: self.rank_in(&tx, City, Vaccination, Least).await?,
            most_vaccinated_country: self.rank_in(&tx, Country, Vaccination, Most).await?,
            least_vaccinated_country: self.rank_in(&tx, Country, Vaccination, Least).await?,
        })
    }
}

/// Compute a summary and log every figure through `record_stat`, stamped
/// with the summary's time. Returns the summary that was published.
pub async fn publish_summary<B, R>(graph: &Graph<B>, records: &R) -> Result<EpidemicSummary>
where
    B: StorageBackend,
    R: RecordStore + ?Sized,
{
    let summary = graph.summary().await?;
    let entries = summary.entries()?;
    for (kind, payload) in entries {
        records.record_stat(kind, payload, summary.taken_at).await?;
    }
    debug!(taken_at = %summary.taken_at, "summary published");
    Ok(summary)
}
