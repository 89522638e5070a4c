//! In-memory [`HitStore`]

use super::{validate_new_result, HitStore};
use crate::error::{Error, Result};
use crate::hit::Hit;
use crate::judgment::{NewResult, ResultRecord};
use appraise_common::time::now;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    hits: HashMap<String, Hit>,
    /// Submission order
    results: Vec<ResultRecord>,
    last_segment_id: i64,
    last_result_id: i64,
}

/// Mutex-protected maps; cloning shares the same state
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl HitStore for MemoryStore {
    async fn hit_id_exists(&self, hit_id: &str) -> Result<bool> {
        Ok(self.state().hits.contains_key(hit_id))
    }

    async fn insert_hits(&self, mut hits: Vec<Hit>) -> Result<Vec<Hit>> {
        let mut state = self.state();
        let mut seen = HashSet::new();
        for hit in &hits {
            if state.hits.contains_key(&hit.id) || !seen.insert(hit.id.as_str()) {
                return Err(Error::DuplicateHitId(hit.id.clone()));
            }
        }

        for hit in &mut hits {
            for segment in &mut hit.segments {
                state.last_segment_id += 1;
                segment.id = state.last_segment_id;
                segment.hit_id = hit.id.clone();
            }
            state.hits.insert(hit.id.clone(), hit.clone());
        }
        Ok(hits)
    }

    async fn get_hit(&self, hit_id: &str) -> Result<Option<Hit>> {
        Ok(self.state().hits.get(hit_id).cloned())
    }

    async fn list_hits(&self) -> Result<Vec<Hit>> {
        let mut hits: Vec<Hit> = self.state().hits.values().cloned().collect();
        hits.sort_by(|a, b| {
            (a.block_id, a.language_pair.code(), &a.id).cmp(&(b.block_id, b.language_pair.code(), &b.id))
        });
        Ok(hits)
    }

    async fn update_hit(&self, hit: &Hit) -> Result<()> {
        let mut state = self.state();
        let stored = state
            .hits
            .get_mut(&hit.id)
            .ok_or_else(|| Error::NotFound(format!("HIT {}", hit.id)))?;
        stored.users = hit.users.clone();
        stored.active = hit.active;
        Ok(())
    }

    async fn delete_hit(&self, hit_id: &str) -> Result<bool> {
        let mut state = self.state();
        if state.hits.remove(hit_id).is_none() {
            return Ok(false);
        }
        state.results.retain(|r| r.hit_id != hit_id);
        Ok(true)
    }

    async fn source_file_references(&self, key: &str) -> Result<usize> {
        Ok(self
            .state()
            .hits
            .values()
            .filter(|h| h.source_file.as_deref() == Some(key))
            .count())
    }

    async fn insert_result(&self, result: NewResult) -> Result<ResultRecord> {
        validate_new_result(&result)?;

        let mut state = self.state();
        let hit_id = state
            .hits
            .values()
            .find(|h| h.segment(result.segment_id).is_some())
            .map(|h| h.id.clone())
            .ok_or_else(|| Error::NotFound(format!("segment {}", result.segment_id)))?;

        state.last_result_id += 1;
        let record = ResultRecord {
            id: state.last_result_id,
            segment_id: result.segment_id,
            hit_id,
            user: result.user,
            duration: result.duration,
            raw_result: result.raw_result,
            created_at: now(),
        };
        state.results.push(record.clone());
        Ok(record)
    }

    async fn results_for_hit(&self, hit_id: &str) -> Result<Vec<ResultRecord>> {
        Ok(self
            .state()
            .results
            .iter()
            .filter(|r| r.hit_id == hit_id)
            .cloned()
            .collect())
    }
}
