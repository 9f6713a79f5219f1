use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use snafu::{Location, Snafu};

use super::ViewKey;
use crate::database::DatabaseError;
use crate::Located;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApiError {
    #[snafu(display("could not record a click for `{code}`: {source}"))]
    RecordClick {
        code: String,
        source: DatabaseError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("could not read the click counters for {key:?}: {source}"))]
    ReadCounters {
        key: ViewKey,
        source: Arc<DatabaseError>,
        #[snafu(implicit)]
        location: Location,
    },
}

impl Located for ApiError {
    fn location(&self) -> Location {
        match self {
            ApiError::RecordClick { location, .. } | ApiError::ReadCounters { location, .. } => {
                *location
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(error = %self, location = %self.location(), "request failed");

        let content = ErrorResponse {
            message: "internal server error",
        };

        (StatusCode::INTERNAL_SERVER_ERROR, Json(content)).into_response()
    }
}
