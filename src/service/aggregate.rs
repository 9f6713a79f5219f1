use derive_new::new;
use tracing::instrument;

use crate::database::{Database, Result};
use crate::model::{ClickTotal, CountryCounter, CountryMap};

/// Read-only views over the click counters.
#[derive(Debug, Clone, new)]
pub struct AggregateReader {
    database: Database,
}

impl AggregateReader {
    /// Sum of every country's clicks, `0` when nothing has been recorded yet.
    #[instrument(skip(self))]
    pub async fn total_clicks(&self) -> Result<u64> {
        let total = ClickTotal::sum(&self.database).await?.unwrap_or_default();
        Ok(total.total)
    }

    /// Every counter keyed by country code.
    #[instrument(skip(self))]
    pub async fn all_counters(&self) -> Result<CountryMap> {
        let counters = CountryCounter::all(&self.database).await?;
        tracing::debug!(countries = counters.len(), "read click counters");

        Ok(counters.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribution, CountryClicks};
    use crate::service::ClickRecorder;

    async fn populated(clicks: &[(&str, &str, u64)]) -> AggregateReader {
        let db = Database::memory().await.unwrap();
        let recorder = ClickRecorder::new(db.clone());

        for (code, name, count) in clicks {
            let attribution = Attribution::new(code.to_string(), name.to_string());
            for _ in 0..*count {
                recorder.record(&attribution).await.unwrap();
            }
        }

        AggregateReader::new(db)
    }

    #[tokio::test]
    async fn empty_table() {
        let reader = populated(&[]).await;

        assert_eq!(reader.total_clicks().await.unwrap(), 0);
        assert!(reader.all_counters().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn total_is_sum_of_counters() {
        let reader = populated(&[
            ("XX", "Atlantis", 3),
            ("US", "United States", 2),
            ("JP", "Japan", 1),
        ])
        .await;

        let counters = reader.all_counters().await.unwrap();
        let sum: u64 = counters.values().map(|clicks| clicks.count).sum();

        assert_eq!(reader.total_clicks().await.unwrap(), 6);
        assert_eq!(sum, 6);
    }

    #[tokio::test]
    async fn counters_keyed_by_code() {
        let reader = populated(&[("XX", "Atlantis", 3), ("US", "United States", 1)]).await;

        let counters = reader.all_counters().await.unwrap();
        let expected = CountryMap::from([
            ("US".to_string(), CountryClicks::new("United States".into(), 1)),
            ("XX".to_string(), CountryClicks::new("Atlantis".into(), 3)),
        ]);
        assert_eq!(counters, expected);
    }
}
