use anyhow::Result;
use sqlx::{SqliteConnection, SqlitePool};

use crate::models::{now_ms, SeriesRecord, SeriesRow};

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS series_state (
            auth_token TEXT NOT NULL,
            series_url TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            is_favorite INTEGER NOT NULL DEFAULT 0,
            completed_episodes TEXT NOT NULL DEFAULT '[]',
            total_episodes INTEGER,
            last_updated INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (auth_token, series_url)
        );

        CREATE INDEX IF NOT EXISTS idx_series_state_token
            ON series_state (auth_token);
        "#,
    )
    .execute(pool)
    .await?;

    tracing::debug!("Database migration complete");
    Ok(())
}

/// Fetch one record scoped to (token, series_url).
pub async fn get_record(
    pool: &SqlitePool,
    token: &str,
    series_url: &str,
) -> Result<Option<SeriesRecord>> {
    let row: Option<SeriesRow> =
        sqlx::query_as("SELECT * FROM series_state WHERE auth_token = ? AND series_url = ?")
            .bind(token)
            .bind(series_url)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(SeriesRow::into_record))
}

/// Fetch all records for a token. Tokens never see each other's rows.
pub async fn get_records(pool: &SqlitePool, token: &str) -> Result<Vec<SeriesRecord>> {
    let rows: Vec<SeriesRow> =
        sqlx::query_as("SELECT * FROM series_state WHERE auth_token = ? ORDER BY series_url")
            .bind(token)
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().map(SeriesRow::into_record).collect())
}

/// Upsert one record with full column replacement (last-write-wins).
pub async fn upsert_record(pool: &SqlitePool, token: &str, record: &SeriesRecord) -> Result<()> {
    let mut conn = pool.acquire().await?;
    upsert_on(&mut conn, token, record).await
}

/// Upsert a batch inside a single transaction. Either every record lands or
/// none do.
pub async fn upsert_batch(pool: &SqlitePool, token: &str, records: &[SeriesRecord]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for record in records {
        upsert_on(&mut tx, token, record).await?;
    }
    tx.commit().await?;
    Ok(())
}

async fn upsert_on(conn: &mut SqliteConnection, token: &str, record: &SeriesRecord) -> Result<()> {
    let completed_json = serde_json::to_string(&record.completed_episodes)?;
    let last_updated = if record.last_updated > 0 {
        record.last_updated
    } else {
        now_ms()
    };

    sqlx::query(
        r#"
        INSERT INTO series_state
            (auth_token, series_url, title, is_favorite, completed_episodes,
             total_episodes, last_updated, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, strftime('%s','now'))
        ON CONFLICT (auth_token, series_url) DO UPDATE SET
            title = excluded.title,
            is_favorite = excluded.is_favorite,
            completed_episodes = excluded.completed_episodes,
            total_episodes = excluded.total_episodes,
            last_updated = excluded.last_updated,
            updated_at = strftime('%s','now')
        "#,
    )
    .bind(token)
    .bind(&record.series_url)
    .bind(&record.title)
    .bind(record.is_favorite)
    .bind(&completed_json)
    .bind(record.total_episodes.map(i64::from))
    .bind(last_updated)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
