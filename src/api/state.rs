// /state endpoints: single-record lookup, full listing, and upsert

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{PutAck, RecordResponse, RecordsResponse, SeriesRecord};
use crate::{api::auth, db, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateQuery {
    pub series_url: Option<String>,
}

/// GET /state?seriesUrl=X → `{"record": ...}` for one series,
/// GET /state → `{"records": [...]}` for everything under the token.
pub async fn get_state(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<StateQuery>,
) -> Result<Response, StatusCode> {
    let token = auth::require_token(&headers, &state.config)?;

    if let Some(series_url) = query.series_url {
        let record = db::get_record(&state.db, &token, &series_url)
            .await
            .map_err(|e| {
                tracing::warn!("state lookup failed: {}", e);
                StatusCode::BAD_REQUEST
            })?;
        return Ok(Json(RecordResponse { record }).into_response());
    }

    let records = db::get_records(&state.db, &token).await.map_err(|e| {
        tracing::warn!("state listing failed: {}", e);
        StatusCode::BAD_REQUEST
    })?;
    Ok(Json(RecordsResponse { records }).into_response())
}

/// PUT /state → upsert one record, full column replacement.
pub async fn put_state(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<PutAck>, StatusCode> {
    let token = auth::require_token(&headers, &state.config)?;

    let record = parse_record(body)?;

    db::upsert_record(&state.db, &token, &record)
        .await
        .map_err(|e| {
            tracing::warn!("upsert failed for {}: {}", record.series_url, e);
            StatusCode::BAD_REQUEST
        })?;

    Ok(Json(PutAck { ok: true }))
}

/// Decode and validate a wire record. Anything malformed collapses to 400;
/// the one hard requirement is a non-empty seriesUrl.
pub fn parse_record(value: serde_json::Value) -> Result<SeriesRecord, StatusCode> {
    let record: SeriesRecord =
        serde_json::from_value(value).map_err(|_| StatusCode::BAD_REQUEST)?;
    if record.series_url.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(record)
}
