use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum_template::engine::Engine;
use derive_new::new;
use snafu::ResultExt as _;
use tera::Tera;
use tracing::instrument;

use super::{ApiError, ReadCountersSnafu, RecordClickSnafu, View, ViewKey};
use crate::config::Config;
use crate::database::{Database, DatabaseError};
use crate::model::Attribution;
use crate::service::{AggregateReader, ClickRecorder, GeoResolver, ViewCache};

pub type AppEngine = Engine<Tera>;

/// Everything a request handler needs, constructed once at startup and cloned into every request.
#[derive(Clone, new)]
pub struct App {
    pub resolver: GeoResolver,
    pub recorder: ClickRecorder,
    pub reader: AggregateReader,
    pub cache: Arc<ViewCache<ViewKey, View>>,
    pub templates: AppEngine,
    pub assets: PathBuf,
}

impl App {
    /// Attributes a click to the visitor's country and counts it.
    ///
    /// The landing page is invalidated so the next visit shows the new total.
    /// The map keeps its snapshot until the TTL runs out.
    #[instrument(skip(self))]
    pub async fn record_click(
        &self,
        address: Option<&str>,
        anonymous: bool,
    ) -> Result<Attribution, ApiError> {
        let attribution = self.resolver.resolve(address, anonymous).await;

        self.recorder
            .record(&attribution)
            .await
            .context(RecordClickSnafu {
                code: attribution.code.clone(),
            })?;

        self.cache.invalidate(&ViewKey::LandingAggregate).await;

        Ok(attribution)
    }

    /// The data behind the page for `key`, served from the cache while it is fresh.
    pub async fn view(&self, key: ViewKey) -> Result<View, ApiError> {
        self.cache
            .get_or_compute(key, self.compute(key))
            .await
            .context(ReadCountersSnafu { key })
    }

    #[instrument(skip(self))]
    async fn compute(&self, key: ViewKey) -> Result<View, DatabaseError> {
        match key {
            ViewKey::LandingAggregate => {
                let total_clicks = self.reader.total_clicks().await?;
                Ok(View::Landing { total_clicks })
            }
            ViewKey::MapSnapshot => {
                let map_data = self.reader.all_counters().await?;
                Ok(View::Map { map_data })
            }
        }
    }

    pub fn from_config(config: &Config, database: Database) -> Result<App, tera::Error> {
        let resolver = GeoResolver::maxmind(&config.geoip_db_path);
        create_app(database, resolver, config.cache_ttl, &config.static_dir)
    }
}

/// Compiles the page templates bundled with the binary.
pub fn templates() -> Result<AppEngine, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        ("base.html", include_str!("../../templates/base.html")),
        ("index.html", include_str!("../../templates/index.html")),
        ("map.html", include_str!("../../templates/map.html")),
    ])?;

    Ok(Engine::new(tera))
}

pub fn create_app(
    database: Database,
    resolver: GeoResolver,
    cache_ttl: Duration,
    assets: impl Into<PathBuf>,
) -> Result<App, tera::Error> {
    let app = App::new(
        resolver,
        ClickRecorder::new(database.clone()),
        AggregateReader::new(database),
        Arc::new(ViewCache::new(cache_ttl)),
        templates()?,
        assets.into(),
    );

    Ok(app)
}
