use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use equipment_core::{BriefView, EquipmentError, FullView};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::error;
use uuid::Uuid;

use crate::owner::resolve_owner;
use crate::state::SharedState;

pub type ApiError = (StatusCode, Json<JsonValue>);

pub fn bad_request(msg: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg.into() })))
}

pub fn error_response(e: EquipmentError) -> ApiError {
    if !e.is_user_correctable() {
        return match e {
            EquipmentError::NotFound(_) => (StatusCode::NOT_FOUND, Json(json!({ "error": "Dataset not found" }))),
            other => {
                error!("storage failure: {other}");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Storage unavailable, please retry" })))
            }
        };
    }

    let mut body = json!({ "error": e.to_string() });
    match &e {
        EquipmentError::Validation { missing } => body["missing_columns"] = json!(missing),
        EquipmentError::MalformedRow { row, column, .. } => {
            body["row"] = json!(row);
            body["column"] = json!(column);
        }
        _ => {}
    }
    (StatusCode::BAD_REQUEST, Json(body))
}

pub async fn upload_csv(
    State(state): State<SharedState>,
    headers: HeaderMap,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let mut upload: Option<(String, bytes::Bytes)> = None;

    while let Some(field) = mp.next_field().await.map_err(|e| bad_request(e.to_string()))? {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(|e| bad_request(e.to_string()))?;
            upload = Some((filename, bytes));
        }
    }

    let (filename, bytes) = upload.ok_or_else(|| bad_request("No file provided"))?;
    if !filename.ends_with(".csv") {
        return Err(bad_request("File must be a CSV"));
    }

    let owner = resolve_owner(&headers, &state.config.demo_owner);
    let view: FullView = state.service.ingest(&owner, &filename, bytes).await.map_err(error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "File uploaded successfully", "data": view })),
    ))
}

pub async fn get_summary(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<FullView>, ApiError> {
    let caller = resolve_owner(&headers, &state.config.demo_owner);
    let view = state.service.fetch(id, Some(&caller.id)).await.map_err(error_response)?;
    Ok(Json(view))
}

#[derive(Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

pub async fn get_history(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<BriefView>>, ApiError> {
    let owner = resolve_owner(&headers, &state.config.demo_owner);
    let limit = params.limit.unwrap_or(state.config.history_limit);
    let history = state.service.history(&owner.id, limit).await.map_err(error_response)?;
    Ok(Json(history))
}

pub async fn health_check() -> Json<JsonValue> {
    Json(json!({ "status": "ok", "message": "API is running" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_map_to_bad_request() {
        let (status, Json(body)) = error_response(EquipmentError::EmptyDataset);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "CSV contains no data rows");

        let (status, Json(body)) = error_response(EquipmentError::MalformedRow {
            row: 3,
            column: Some("Flowrate".into()),
            value: "x".into(),
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["row"], 3);
        assert_eq!(body["column"], "Flowrate");
    }

    #[test]
    fn storage_and_missing_map_to_server_statuses() {
        let (status, Json(body)) = error_response(EquipmentError::storage("pool timed out"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Storage unavailable, please retry");

        let (status, _) = error_response(EquipmentError::NotFound(Uuid::nil()));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
