use std::sync::Arc;

use axum::{
    extract::{Extension, Multipart},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{error, info};

use kitchencast_infra::datasets::DatasetError;
use kitchencast_ingest::DatasetRole;

use crate::app::dto::UploadResponse;
use crate::app::errors;
use crate::app::services::AppServices;

/// Multipart field name to dataset role. The Italian names are the ones the
/// kitchens' export tool uses.
fn role_for_field(name: &str) -> Option<DatasetRole> {
    DatasetRole::from_name(name).or(match name {
        "vendite" => Some(DatasetRole::Sales),
        "scarto_teglia" => Some(DatasetRole::TrayWaste),
        "scarto_piatto" => Some(DatasetRole::PlateWaste),
        _ => None,
    })
}

/// `POST /data/upload`: each submitted field fully replaces its dataset.
///
/// The fields are replaced as one batch: a bad file leaves every dataset
/// untouched, and a run never reads half of an upload.
pub async fn upload(
    Extension(services): Extension<Arc<AppServices>>,
    mut multipart: Multipart,
) -> axum::response::Response {
    if !services.upload_enabled {
        return errors::json_error(
            StatusCode::FORBIDDEN,
            "upload_disabled",
            "direct upload is disabled on this server",
        );
    }

    let mut files: Vec<(DatasetRole, Vec<u8>)> = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_multipart", e.to_string());
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        let Some(role) = role_for_field(&name) else {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "unknown_field",
                format!("unexpected field '{name}' (expected sales, tray_waste, plate_waste)"),
            );
        };
        let bytes = match field.bytes().await {
            Ok(b) => b,
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_multipart", e.to_string());
            }
        };
        files.retain(|(r, _)| *r != role);
        files.push((role, bytes.to_vec()));
    }

    if files.is_empty() {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "no dataset fields in upload",
        );
    }
    let datasets = services.datasets.clone();
    let written = tokio::task::spawn_blocking(move || {
        datasets.replace_all(&files)?;
        Ok::<_, DatasetError>(files.iter().map(|(role, _)| role.as_str()).collect::<Vec<_>>())
    })
    .await;

    match written {
        Ok(Ok(replaced)) => {
            info!(datasets = ?replaced, "upload stored");
            (
                StatusCode::OK,
                Json(UploadResponse {
                    status: "ok",
                    replaced,
                }),
            )
                .into_response()
        }
        Ok(Err(e)) => errors::dataset_error_to_response(e),
        Err(join_err) => {
            error!(error = %join_err, "upload task failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "upload failed")
        }
    }
}
