use derive_new::new;
use tracing::instrument;

use crate::database::{Database, Result};
use crate::model::{Attribution, CountryCounter};

/// The only writer of the click counters.
#[derive(Debug, Clone, new)]
pub struct ClickRecorder {
    database: Database,
}

impl ClickRecorder {
    /// Counts one click towards `attribution`, creating its counter on first sight.
    ///
    /// Runs as a single insert-or-increment statement, so concurrent clicks for the same country never lose an update.
    #[instrument(skip(self), fields(country_code = %attribution.code))]
    pub async fn record(&self, attribution: &Attribution) -> Result<()> {
        let counter = CountryCounter::increment(
            attribution.code.clone(),
            attribution.name.clone(),
            &self.database,
        )
        .await?;

        match counter {
            Some(counter) => tracing::info!(
                country_code = %counter.country_code,
                click_count = counter.click_count,
                "recorded click"
            ),
            None => tracing::warn!(%attribution, "recorded click but the database returned no counter"),
        }

        Ok(())
    }
}
