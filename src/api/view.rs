use serde::Serialize;

use crate::model::CountryMap;

/// Identifies a cached page independently of the route it is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKey {
    /// Total click count shown on the landing page.
    LandingAggregate,
    /// Per-country breakdown shown on the world map.
    MapSnapshot,
}

impl ViewKey {
    pub fn template(self) -> &'static str {
        match self {
            ViewKey::LandingAggregate => "index.html",
            ViewKey::MapSnapshot => "map.html",
        }
    }
}

/// Data a page template is rendered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum View {
    Landing { total_clicks: u64 },
    Map { map_data: CountryMap },
}
