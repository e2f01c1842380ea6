use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use kitchencast_infra::datasets::DatasetError;
use kitchencast_infra::{JobError, StoreError};
use kitchencast_ingest::IngestError;

pub fn job_error_to_response(err: JobError) -> axum::response::Response {
    match err {
        JobError::Conflict => json_error(StatusCode::CONFLICT, "conflict", err.to_string()),
        JobError::Ingest(e) => ingest_error_to_response(e),
        JobError::InvalidRequest(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        JobError::AllCategoriesFailed { ref summary } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            axum::Json(json!({
                "error": "all_categories_failed",
                "message": err.to_string(),
                "summary": summary,
            })),
        )
            .into_response(),
        JobError::Publish(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "publish_error",
            e.to_string(),
        ),
    }
}

pub fn ingest_error_to_response(err: IngestError) -> axum::response::Response {
    let code = match err {
        IngestError::Schema { .. } => "schema_error",
        IngestError::MissingDataset(_) => "missing_dataset",
        IngestError::Csv { .. } => "invalid_csv",
    };
    json_error(StatusCode::BAD_REQUEST, code, err.to_string())
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound | StoreError::UnknownVersion(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        _ => json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", err.to_string()),
    }
}

pub fn dataset_error_to_response(err: DatasetError) -> axum::response::Response {
    match err {
        DatasetError::Ingest(e) => ingest_error_to_response(e),
        DatasetError::Io(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "io_error", msg),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
