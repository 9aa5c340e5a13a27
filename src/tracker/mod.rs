// Tracking controls for one series page.
//
// `SeriesTracker` is the state behind the page controls: the favorite
// toggle, one completion checkbox per episode and the range-marking form.
// Control state updates synchronously (the UI never waits on persistence);
// each mutation then persists through the synchronizer, which absorbs any
// storage or network failure.

use crate::models::SeriesRecord;
use crate::scanner::EpisodeItem;
use crate::sync::Synchronizer;

/// Result of a range-mark submission, with the inline status text shown to
/// the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// Start or end did not parse as a number.
    InvalidInput,
    /// No visible episode fell inside the interval.
    NoMatch,
    /// This many episodes matched the interval (already-completed ones
    /// included — marking is a set union).
    Marked(usize),
}

impl RangeOutcome {
    pub fn message(&self) -> String {
        match self {
            RangeOutcome::InvalidInput => "Enter start and end.".to_string(),
            RangeOutcome::NoMatch => "No episodes matched.".to_string(),
            RangeOutcome::Marked(n) => format!("Marked {n} episode(s)."),
        }
    }
}

/// One bound episode checkbox.
#[derive(Debug, Clone)]
pub struct EpisodeControl {
    pub url: String,
    pub number: Option<u32>,
    pub checked: bool,
}

pub struct SeriesTracker {
    record: SeriesRecord,
    controls: Vec<EpisodeControl>,
}

impl SeriesTracker {
    pub fn new(record: SeriesRecord) -> Self {
        Self {
            record,
            controls: Vec::new(),
        }
    }

    pub fn record(&self) -> &SeriesRecord {
        &self.record
    }

    pub fn controls(&self) -> &[EpisodeControl] {
        &self.controls
    }

    /// Bind controls for scanned episode items. Idempotent: an URL that
    /// already has a control is skipped, so re-running after a page update
    /// never duplicates controls. Items without a link are ignored.
    pub fn bind(&mut self, episodes: &[EpisodeItem]) {
        for item in episodes {
            let Some(ref url) = item.url else {
                continue;
            };
            if self.controls.iter().any(|c| c.url == *url) {
                continue;
            }
            self.controls.push(EpisodeControl {
                url: url.clone(),
                number: item.number,
                checked: self.record.is_completed(url),
            });
        }
    }

    pub fn is_favorite(&self) -> bool {
        self.record.is_favorite
    }

    pub fn favorite_label(&self) -> &'static str {
        if self.record.is_favorite {
            "Favorited"
        } else {
            "Favorite"
        }
    }

    /// Flip the favorite flag. The returned label reflects the new state
    /// immediately; persistence happens after.
    pub async fn toggle_favorite(&mut self, sync: &Synchronizer) -> &'static str {
        self.record.is_favorite = !self.record.is_favorite;
        let label = self.favorite_label();
        sync.save(&mut self.record).await;
        label
    }

    /// Check or uncheck one episode. Returns false when the URL is unknown.
    pub async fn set_completed(&mut self, sync: &Synchronizer, url: &str, checked: bool) -> bool {
        let Some(control) = self.controls.iter_mut().find(|c| c.url == url) else {
            return false;
        };
        control.checked = checked;

        if checked {
            self.record.mark_completed(url);
        } else {
            self.record.unmark_completed(url);
        }
        sync.save(&mut self.record).await;
        true
    }

    /// Mark every bound episode whose number falls in the closed interval
    /// given by the two free-text fields. Bounds are normalized (start and
    /// end may arrive swapped) and the whole batch persists as one save.
    pub async fn mark_range(
        &mut self,
        sync: &Synchronizer,
        start_text: &str,
        end_text: &str,
    ) -> RangeOutcome {
        let (Ok(a), Ok(b)) = (
            start_text.trim().parse::<i64>(),
            end_text.trim().parse::<i64>(),
        ) else {
            return RangeOutcome::InvalidInput;
        };
        let (start, end) = (a.min(b), a.max(b));

        let mut matched = 0usize;
        for control in &mut self.controls {
            let Some(number) = control.number else {
                continue;
            };
            let number = i64::from(number);
            if number < start || number > end {
                continue;
            }
            self.record.mark_completed(&control.url);
            control.checked = true;
            matched += 1;
        }

        if matched == 0 {
            return RangeOutcome::NoMatch;
        }

        sync.save(&mut self.record).await;
        RangeOutcome::Marked(matched)
    }

    /// Progress readout: completed over the announced total, falling back
    /// to the number of visible episodes, or a bare count when neither is
    /// known.
    pub fn progress_text(&self) -> String {
        let completed = self.record.completed_count();
        let total = self
            .record
            .total_episodes
            .filter(|&n| n > 0)
            .map(|n| n as usize)
            .unwrap_or(self.controls.len());

        if total > 0 {
            format!("Progress: {completed}/{total}")
        } else {
            format!("Progress: {completed}")
        }
    }
}
