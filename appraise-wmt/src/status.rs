//! Task status aggregation and the explicit status cache

use crate::hit::HitSnapshot;
use crate::judgment::ResultRecord;
use appraise_common::time::average_seconds;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Completion band used to colour progress bars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressBand {
    Danger,
    Warning,
    Success,
}

impl ProgressBand {
    /// `< 33` danger, `< 66` warning, otherwise success
    pub fn for_percentage(percentage: f64) -> Self {
        if percentage < 33.0 {
            ProgressBand::Danger
        } else if percentage < 66.0 {
            ProgressBand::Warning
        } else {
            ProgressBand::Success
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressBand::Danger => "danger",
            ProgressBand::Warning => "warning",
            ProgressBand::Success => "success",
        }
    }
}

impl fmt::Display for ProgressBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion and timing of one HIT
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitStatus {
    pub done: usize,
    pub total: usize,
    pub percentage: f64,
    pub band: ProgressBand,
    /// Seconds, over results with a duration only; 0 when there are none
    pub average_duration: f64,
}

impl HitStatus {
    fn new<'a>(done: usize, total: usize, results: impl Iterator<Item = &'a ResultRecord>) -> Self {
        let percentage = 100.0 * done as f64 / total.max(1) as f64;
        Self {
            done,
            total,
            percentage,
            band: ProgressBand::for_percentage(percentage),
            average_duration: average_seconds(results.filter_map(|r| r.duration)),
        }
    }

    /// `done/total`
    pub fn completion(&self) -> String {
        format!("{}/{}", self.done, self.total)
    }

    /// Average duration as `N.NN sec`
    pub fn duration_label(&self) -> String {
        format!("{:.2} sec", self.average_duration)
    }
}

impl fmt::Display for HitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:.2}%, {}) {}",
            self.completion(),
            self.percentage,
            self.band,
            self.duration_label()
        )
    }
}

/// Status of one HIT for one judge
pub fn status_for_user(snapshot: &HitSnapshot, user: &str) -> HitStatus {
    let done = snapshot.results_for_user(user).count();
    HitStatus::new(done, snapshot.hit.segments.len(), snapshot.results_for_user(user))
}

/// Status over all assigned judges: the least-complete judge counts, durations are pooled
pub fn status_for_all_users(snapshot: &HitSnapshot) -> HitStatus {
    let users = &snapshot.hit.users;
    let done = users
        .iter()
        .map(|user| snapshot.results_for_user(user).count())
        .min()
        .unwrap_or(0);
    let results = snapshot.results.iter().filter(|r| users.contains(&r.user));
    HitStatus::new(done, snapshot.hit.segments.len(), results)
}

/// `(done, total)` for one judge
pub fn finished_for_user(snapshot: &HitSnapshot, user: &str) -> (usize, usize) {
    (
        snapshot.results_for_user(user).count(),
        snapshot.hit.segments.len(),
    )
}

pub fn is_finished_for_user(snapshot: &HitSnapshot, user: &str) -> bool {
    let (done, total) = finished_for_user(snapshot, user);
    done == total
}

/// Cached per-user HIT status.
///
/// Entries change only through [`StatusCache::refresh`] and
/// [`StatusCache::invalidate_hit`]; the submission path calls `refresh` after
/// every stored result.
#[derive(Debug, Default)]
pub struct StatusCache {
    entries: Mutex<HashMap<(String, String), HitStatus>>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(String, String), HitStatus>> {
        // Entries are replaced whole, so a poisoned map is still consistent
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, hit_id: &str, user: &str) -> Option<HitStatus> {
        self.lock()
            .get(&(hit_id.to_string(), user.to_string()))
            .cloned()
    }

    /// Recompute the status of every assigned user of this HIT
    pub fn refresh(&self, snapshot: &HitSnapshot) {
        let hit_id = &snapshot.hit.id;
        let mut entries = self.lock();
        entries.retain(|(id, _), _| id != hit_id);
        for user in &snapshot.hit.users {
            entries.insert(
                (hit_id.clone(), user.clone()),
                status_for_user(snapshot, user),
            );
        }
    }

    pub fn invalidate_hit(&self, hit_id: &str) {
        self.lock().retain(|(id, _), _| id != hit_id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
