// Bearer-token check shared by every route.
// The raw Authorization header value is the token; there is no user account
// behind it, the token itself partitions the stored rows.

use axum::http::{header, HeaderMap, StatusCode};

use crate::config::AppConfig;

/// Extract and check the caller's token.
///
/// Missing/empty header → 401. When the server is configured with an
/// expected token, a mismatch → 403. Without a configured token any
/// non-empty value is accepted (open mode for self-hosted deployments).
pub fn require_token(headers: &HeaderMap, config: &AppConfig) -> Result<String, StatusCode> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    if let Some(ref expected) = config.api_token {
        if token != expected {
            return Err(StatusCode::FORBIDDEN);
        }
    }

    Ok(token.to_string())
}
