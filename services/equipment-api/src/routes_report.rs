use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use uuid::Uuid;

use crate::owner::resolve_owner;
use crate::report::{render_pdf, report_filename};
use crate::routes_datasets::{error_response, ApiError};
use crate::state::SharedState;

pub async fn get_report(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let caller = resolve_owner(&headers, &state.config.demo_owner);
    let view = state.service.fetch(id, Some(&caller.id)).await.map_err(error_response)?;

    let pdf = render_pdf(&view);
    let filename = report_filename(id, Utc::now().date_naive());
    // uuid and digits only, always a valid header value
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response())
}
