pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod scanner;
pub mod store;
pub mod sync;
pub mod tracker;

use config::AppConfig;

/// Shared state for the sync server.
pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: AppConfig,
}
