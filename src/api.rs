use std::path::Path;

use axum::http::{header, HeaderValue};
use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::set_header::{SetResponseHeader, SetResponseHeaderLayer};
use tower_http::trace::TraceLayer;

mod error;
mod pages;
mod state;
mod view;
mod visitor;

pub use error::*;
pub use pages::ClickForm;
pub use state::*;
pub use view::*;
pub use visitor::*;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// Static assets may be cached publicly for 30 minutes.
const STATIC_CACHE_CONTROL: &str = "public, max-age=1800";

pub fn create_router(app: App) -> Router {
    let assets = static_assets(&app.assets);

    Router::new()
        .route("/", get(pages::index).post(pages::click))
        .route("/cached_index", get(pages::index))
        .route("/map", get(pages::map))
        .nest_service("/static", assets)
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

fn static_assets(directory: &Path) -> SetResponseHeader<ServeDir, HeaderValue> {
    ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static(STATIC_CACHE_CONTROL),
        ))
        .service(ServeDir::new(directory))
}
