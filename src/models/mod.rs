use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current time as epoch milliseconds, the timestamp unit used on the wire
/// and in the `last_updated` column.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Tracked state for one series, keyed by its normalized detail-page URL.
///
/// This is the wire shape shared by the local store, the pending queue and
/// the sync API (camelCase field names).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeriesRecord {
    pub title: String,
    pub series_url: String,
    pub is_favorite: bool,
    pub completed_episodes: Vec<String>,
    pub total_episodes: Option<u32>,
    pub last_updated: i64,
}

impl Default for SeriesRecord {
    fn default() -> Self {
        Self {
            title: String::new(),
            series_url: String::new(),
            is_favorite: false,
            completed_episodes: Vec::new(),
            total_episodes: None,
            last_updated: now_ms(),
        }
    }
}

impl SeriesRecord {
    pub fn new(series_url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            series_url: series_url.into(),
            ..Default::default()
        }
    }

    pub fn is_completed(&self, episode_url: &str) -> bool {
        self.completed_episodes.iter().any(|u| u == episode_url)
    }

    /// Add an episode URL to the completed set. Returns false when it was
    /// already present (set semantics, no duplicates).
    pub fn mark_completed(&mut self, episode_url: &str) -> bool {
        if self.is_completed(episode_url) {
            return false;
        }
        self.completed_episodes.push(episode_url.to_string());
        true
    }

    /// Remove an episode URL from the completed set. Returns false when it
    /// was not present.
    pub fn unmark_completed(&mut self, episode_url: &str) -> bool {
        let before = self.completed_episodes.len();
        self.completed_episodes.retain(|u| u != episode_url);
        self.completed_episodes.len() != before
    }

    pub fn completed_count(&self) -> usize {
        self.completed_episodes.len()
    }
}

/// One `series_state` row. `completed_episodes` is a JSON array text column.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SeriesRow {
    pub auth_token: String,
    pub series_url: String,
    pub title: String,
    pub is_favorite: bool,
    pub completed_episodes: String,
    pub total_episodes: Option<i64>,
    pub last_updated: i64,
    pub updated_at: i64,
}

impl SeriesRow {
    pub fn into_record(self) -> SeriesRecord {
        SeriesRecord {
            title: self.title,
            series_url: self.series_url,
            is_favorite: self.is_favorite,
            completed_episodes: serde_json::from_str(&self.completed_episodes)
                .unwrap_or_default(),
            total_episodes: self.total_episodes.and_then(|n| u32::try_from(n).ok()),
            last_updated: self.last_updated,
        }
    }
}

// === API request/response shapes ===

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordResponse {
    pub record: Option<SeriesRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordsResponse {
    pub records: Vec<SeriesRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncRequest {
    pub series: Vec<SeriesRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PutAck {
    pub ok: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncAck {
    pub ok: bool,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_completed_is_a_set() {
        let mut record = SeriesRecord::new("https://example.com/anime/beck/", "BECK");
        assert!(record.mark_completed("https://example.com/beck-episode-1/"));
        assert!(!record.mark_completed("https://example.com/beck-episode-1/"));
        assert_eq!(record.completed_count(), 1);

        assert!(record.unmark_completed("https://example.com/beck-episode-1/"));
        assert!(!record.unmark_completed("https://example.com/beck-episode-1/"));
        assert_eq!(record.completed_count(), 0);
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let mut record = SeriesRecord::new("https://example.com/anime/beck/", "BECK");
        record.is_favorite = true;
        record.total_episodes = Some(26);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["seriesUrl"], "https://example.com/anime/beck/");
        assert_eq!(value["isFavorite"], true);
        assert_eq!(value["totalEpisodes"], 26);
        assert!(value["completedEpisodes"].is_array());
    }

    #[test]
    fn test_missing_fields_deserialize_to_defaults() {
        // The worker validates seriesUrl itself, so `{}` must parse.
        let record: SeriesRecord = serde_json::from_str("{}").unwrap();
        assert!(record.series_url.is_empty());
        assert!(!record.is_favorite);
        assert!(record.completed_episodes.is_empty());
    }

    #[test]
    fn test_row_round_trip() {
        let row = SeriesRow {
            auth_token: "tok".into(),
            series_url: "https://example.com/anime/beck/".into(),
            title: "BECK".into(),
            is_favorite: true,
            completed_episodes: r#"["https://example.com/beck-episode-1/"]"#.into(),
            total_episodes: Some(26),
            last_updated: 1_700_000_000_000,
            updated_at: 1_700_000_000,
        };
        let record = row.into_record();
        assert_eq!(record.title, "BECK");
        assert_eq!(record.completed_episodes.len(), 1);
        assert_eq!(record.total_episodes, Some(26));
    }

    #[test]
    fn test_row_with_garbage_episode_json_degrades_to_empty() {
        let row = SeriesRow {
            auth_token: "tok".into(),
            series_url: "u".into(),
            title: String::new(),
            is_favorite: false,
            completed_episodes: "not json".into(),
            total_episodes: None,
            last_updated: 0,
            updated_at: 0,
        };
        assert!(row.into_record().completed_episodes.is_empty());
    }
}
