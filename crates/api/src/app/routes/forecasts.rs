use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::{HeaderName, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::app::errors;
use crate::app::services::AppServices;

/// Version of the snapshot a read was served from.
pub const ARTIFACT_VERSION_HEADER: HeaderName = HeaderName::from_static("x-artifact-version");

fn versioned<T: Serialize>(version: u64, items: T) -> axum::response::Response {
    (
        StatusCode::OK,
        [(ARTIFACT_VERSION_HEADER, version.to_string())],
        Json(items),
    )
        .into_response()
}

pub async fn latest_forecasts(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.store.read_latest_forecasts() {
        Ok(v) => versioned(v.version, v.items),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn latest_registry(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.store.read_latest_registry() {
        Ok(v) => versioned(v.version, v.items),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Forecast points of a retained earlier snapshot.
pub async fn forecasts_at_version(
    Extension(services): Extension<Arc<AppServices>>,
    Path(version): Path<String>,
) -> axum::response::Response {
    let Ok(version) = version.parse::<u64>() else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_version",
            format!("'{version}' is not a version number"),
        );
    };
    let store = services.store.clone();
    match tokio::task::spawn_blocking(move || store.read_version(version)).await {
        Ok(Ok(snapshot)) => versioned(snapshot.version, &snapshot.forecasts),
        Ok(Err(e)) => errors::store_error_to_response(e),
        Err(_) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "snapshot read failed",
        ),
    }
}
