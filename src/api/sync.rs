// /sync endpoint: bulk upsert of queued client records

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

use crate::models::{SeriesRecord, SyncAck};
use crate::{api::auth, api::state::parse_record, db, AppState};

/// POST /sync with body `{"series": [...]}`.
///
/// Every element is validated up front and the whole batch is applied in one
/// transaction: one bad record means nothing is committed. A missing or
/// non-array `series` field is treated as an empty batch.
pub async fn post_sync(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<SyncAck>, StatusCode> {
    let token = auth::require_token(&headers, &state.config)?;

    let series = match body.get("series") {
        Some(serde_json::Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let records: Vec<SeriesRecord> = series
        .into_iter()
        .map(parse_record)
        .collect::<Result<_, _>>()?;

    db::upsert_batch(&state.db, &token, &records)
        .await
        .map_err(|e| {
            tracing::warn!("batch sync of {} records failed: {}", records.len(), e);
            StatusCode::BAD_REQUEST
        })?;

    Ok(Json(SyncAck {
        ok: true,
        count: records.len(),
    }))
}
