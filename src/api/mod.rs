use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::AppState;

pub mod auth;
mod state;
mod sync;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/state", get(state::get_state).put(state::put_state))
        .route("/sync", post(sync::post_sync))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, AppPaths};
    use crate::models::{RecordResponse, SeriesRecord, SyncAck};
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use tower::ServiceExt;

    async fn test_app(api_token: Option<&str>) -> Router {
        // One connection, kept alive: a pooled in-memory SQLite database
        // vanishes with its connection.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::migrate(&pool).await.unwrap();

        let config = AppConfig {
            paths: AppPaths::current_dir(),
            port: 0,
            bind_address: "127.0.0.1".to_string(),
            api_token: api_token.map(str::to_string),
            api_base: None,
        };

        routes().with_state(Arc::new(AppState { db: pool, config }))
    }

    fn request(method: Method, uri: &str, token: Option<&str>, body: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, token);
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body<T: serde::de::DeserializeOwned>(
        response: axum::response::Response,
    ) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn sample(url: &str) -> String {
        serde_json::to_string(&SeriesRecord::new(url, "BECK")).unwrap()
    }

    #[tokio::test]
    async fn test_missing_auth_is_401() {
        let app = test_app(None).await;
        let response = app
            .oneshot(request(Method::GET, "/state", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrong_token_is_403() {
        let app = test_app(Some("expected")).await;
        let response = app
            .oneshot(request(Method::GET, "/state", Some("other"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_open_mode_accepts_any_token() {
        let app = test_app(None).await;
        let response = app
            .oneshot(request(Method::GET, "/state", Some("anything"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_put_empty_body_is_400() {
        let app = test_app(None).await;
        let response = app
            .oneshot(request(Method::PUT, "/state", Some("tok"), Some("{}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let app = test_app(None).await;
        let url = "https://example.com/anime/beck/";

        let response = app
            .clone()
            .oneshot(request(Method::PUT, "/state", Some("tok"), Some(&sample(url))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request(
                Method::GET,
                "/state?seriesUrl=https%3A%2F%2Fexample.com%2Fanime%2Fbeck%2F",
                Some("tok"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: RecordResponse = json_body(response).await;
        assert_eq!(body.record.unwrap().series_url, url);
    }

    #[tokio::test]
    async fn test_get_unknown_series_returns_null_record() {
        let app = test_app(None).await;
        let response = app
            .oneshot(request(
                Method::GET,
                "/state?seriesUrl=https%3A%2F%2Fexample.com%2Fnope%2F",
                Some("tok"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: RecordResponse = json_body(response).await;
        assert!(body.record.is_none());
    }

    #[tokio::test]
    async fn test_sync_same_key_twice_keeps_last() {
        let app = test_app(None).await;
        let url = "https://example.com/anime/beck/";
        let mut first = SeriesRecord::new(url, "first");
        first.last_updated = 1;
        let mut second = SeriesRecord::new(url, "second");
        second.last_updated = 2;
        let body = serde_json::json!({ "series": [first, second] }).to_string();

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/sync", Some("tok"), Some(&body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let ack: SyncAck = json_body(response).await;
        assert!(ack.ok);
        assert_eq!(ack.count, 2);

        let response = app
            .oneshot(request(
                Method::GET,
                "/state?seriesUrl=https%3A%2F%2Fexample.com%2Fanime%2Fbeck%2F",
                Some("tok"),
                None,
            ))
            .await
            .unwrap();
        let body: RecordResponse = json_body(response).await;
        assert_eq!(body.record.unwrap().title, "second");
    }

    #[tokio::test]
    async fn test_sync_with_invalid_element_commits_nothing() {
        let app = test_app(None).await;
        let valid = SeriesRecord::new("https://example.com/anime/beck/", "BECK");
        let body =
            serde_json::json!({ "series": [valid, { "title": "no url" }] }).to_string();

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/sync", Some("tok"), Some(&body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // The valid element before the bad one must not have been applied.
        let response = app
            .oneshot(request(Method::GET, "/state", Some("tok"), None))
            .await
            .unwrap();
        let body: crate::models::RecordsResponse = json_body(response).await;
        assert!(body.records.is_empty());
    }

    #[tokio::test]
    async fn test_tokens_are_isolated() {
        let app = test_app(None).await;
        let url = "https://example.com/anime/beck/";

        app.clone()
            .oneshot(request(Method::PUT, "/state", Some("alice"), Some(&sample(url))))
            .await
            .unwrap();

        let response = app
            .oneshot(request(Method::GET, "/state", Some("bob"), None))
            .await
            .unwrap();
        let body: crate::models::RecordsResponse = json_body(response).await;
        assert!(body.records.is_empty());
    }
}
