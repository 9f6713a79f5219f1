pub mod aggregate;
pub mod geo;
pub mod recorder;
pub mod view_cache;

pub use aggregate::AggregateReader;
pub use geo::{CountryLookup, GeoError, GeoResolver, MaxMindLookup};
pub use recorder::ClickRecorder;
pub use view_cache::ViewCache;
