//! HIT service: creation, import, submission and deletion over the storage traits

use crate::error::{Error, Result};
use crate::hit::{split_batch, Hit, HitSnapshot};
use crate::judgment::{NewResult, ResultRecord};
use crate::status::{self, HitStatus, StatusCache};
use crate::store::{BlobStore, HitStore};
use crate::task_type::TaskType;
use appraise_common::uuid_utils::generate_hit_id;
use appraise_common::LanguagePair;
use tracing::{debug, info, warn};

/// Attempts at finding an unused HIT id before giving up
pub const MAX_ID_ATTEMPTS: usize = 16;

pub struct HitService<S, B> {
    store: S,
    blobs: B,
    cache: StatusCache,
}

impl<S: HitStore, B: BlobStore> HitService<S, B> {
    pub fn new(store: S, blobs: B) -> Self {
        Self {
            store,
            blobs,
            cache: StatusCache::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn cache(&self) -> &StatusCache {
        &self.cache
    }

    /// Ids unused in the store and distinct from each other
    async fn fresh_hit_ids(&self, count: usize) -> Result<Vec<String>> {
        let mut ids: Vec<String> = Vec::with_capacity(count);
        while ids.len() < count {
            let mut attempts = 0;
            let id = loop {
                let id = generate_hit_id();
                if !ids.contains(&id) && !self.store.hit_id_exists(&id).await? {
                    break id;
                }
                debug!("HIT id {} already taken", id);
                attempts += 1;
                if attempts == MAX_ID_ATTEMPTS {
                    return Err(appraise_common::Error::Internal("no unused HIT id found".to_string()).into());
                }
            };
            ids.push(id);
        }
        Ok(ids)
    }

    /// Give validated HITs fresh ids and store them with their segments, all or none
    async fn persist_new(&self, mut hits: Vec<Hit>) -> Result<Vec<Hit>> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let ids = self.fresh_hit_ids(hits.len()).await?;
            for (hit, id) in hits.iter_mut().zip(ids) {
                hit.id = id;
            }
            match self.store.insert_hits(hits.clone()).await {
                Ok(stored) => {
                    for hit in &stored {
                        info!(
                            "Created {} HIT {} (block {}, {})",
                            hit.task_type,
                            hit.id,
                            hit.block_id,
                            hit.language_pair.label()
                        );
                    }
                    return Ok(stored);
                }
                Err(Error::DuplicateHitId(id)) => warn!("HIT id {} was taken concurrently, retrying", id),
                Err(e) => return Err(e),
            }
        }
        Err(appraise_common::Error::Internal("no unused HIT id found".to_string()).into())
    }

    /// Blob key for an uploaded file: its name, unless a blob or a HIT already uses it
    async fn fresh_blob_key(&self, name: &str) -> Result<String> {
        let mut key = name.to_string();
        for _ in 0..MAX_ID_ATTEMPTS {
            if !self.blobs.exists(&key).await? && self.store.source_file_references(&key).await? == 0 {
                return Ok(key);
            }
            key = format!("{}-{}", generate_hit_id(), name);
        }
        Err(appraise_common::Error::Internal(format!("no unused blob key for {}", name)).into())
    }

    /// Validate a single-HIT document and store it with a fresh id.
    ///
    /// A batch document must hold exactly one `<hit>`. Nothing is stored
    /// when validation fails.
    pub async fn create_task(
        &self,
        xml: &str,
        block_id: i64,
        language_pair: LanguagePair,
        task_type: TaskType,
    ) -> Result<Hit> {
        let hit = Hit::from_xml(String::new(), xml, block_id, language_pair, task_type)?;
        self.persist_new(vec![hit])
            .await?
            .pop()
            .ok_or_else(|| Error::NotFound("created HIT".to_string()))
    }

    /// Create one HIT per `<hit>` of a batch document.
    ///
    /// Block ids come from `block-id`, language pairs from
    /// `source-language`/`target-language` unless `language_pair` overrides
    /// them. Every HIT is validated first, then all of them are stored in one
    /// step. With `source_name` the document is kept as a blob under a key
    /// derived from that name, and the HITs refer to it.
    pub async fn import_batch(
        &self,
        xml: &str,
        language_pair: Option<LanguagePair>,
        task_type: TaskType,
        source_name: Option<&str>,
    ) -> Result<Vec<Hit>> {
        let mut pending = Vec::new();
        for entry in split_batch(xml)? {
            let block_id = entry.block_id().ok_or_else(|| {
                Error::InvalidInput(format!(
                    "block-id is not an integer: {:?}",
                    entry.attributes.get("block-id")
                ))
            })?;
            let pair = match language_pair {
                Some(pair) => pair,
                None => LanguagePair::from_codes(
                    entry.attributes.get("source-language").map(String::as_str).unwrap_or_default(),
                    entry.attributes.get("target-language").map(String::as_str).unwrap_or_default(),
                )?,
            };

            pending.push(Hit::from_xml(String::new(), &entry.xml, block_id, pair, task_type)?);
        }

        let key = match source_name {
            Some(name) => {
                let key = self.fresh_blob_key(name).await?;
                self.blobs.store(&key, xml).await?;
                for hit in &mut pending {
                    hit.source_file = Some(key.clone());
                }
                Some(key)
            }
            None => None,
        };

        match self.persist_new(pending).await {
            Ok(created) => {
                info!("Imported {} HITs", created.len());
                Ok(created)
            }
            Err(e) => {
                if let Some(key) = key {
                    if let Err(remove_err) = self.blobs.remove(&key).await {
                        warn!("Cannot release source file {}: {}", key, remove_err);
                    }
                }
                Err(e)
            }
        }
    }

    pub async fn get_hit(&self, hit_id: &str) -> Result<Hit> {
        self.store
            .get_hit(hit_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("HIT {}", hit_id)))
    }

    pub async fn list_hits(&self) -> Result<Vec<Hit>> {
        self.store.list_hits().await
    }

    pub async fn snapshot(&self, hit_id: &str) -> Result<HitSnapshot> {
        self.store
            .snapshot(hit_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("HIT {}", hit_id)))
    }

    /// Snapshots of the given HITs, or of every HIT when `hit_ids` is empty
    pub async fn snapshots(&self, hit_ids: &[String]) -> Result<Vec<HitSnapshot>> {
        let ids: Vec<String> = if hit_ids.is_empty() {
            self.store.list_hits().await?.into_iter().map(|h| h.id).collect()
        } else {
            hit_ids.to_vec()
        };

        let mut snapshots = Vec::with_capacity(ids.len());
        for id in &ids {
            snapshots.push(self.snapshot(id).await?);
        }
        Ok(snapshots)
    }

    async fn update_and_refresh(&self, hit: &Hit) -> Result<()> {
        self.store.update_hit(hit).await?;
        let snapshot = self.snapshot(&hit.id).await?;
        self.cache.refresh(&snapshot);
        Ok(())
    }

    pub async fn assign_user(&self, hit_id: &str, user: &str) -> Result<Hit> {
        if user.is_empty() {
            return Err(Error::InvalidInput("user must not be empty".to_string()));
        }
        let mut hit = self.get_hit(hit_id).await?;
        if hit.users.insert(user.to_string()) {
            self.update_and_refresh(&hit).await?;
            info!("Assigned {} to HIT {}", user, hit_id);
        }
        Ok(hit)
    }

    pub async fn unassign_user(&self, hit_id: &str, user: &str) -> Result<Hit> {
        let mut hit = self.get_hit(hit_id).await?;
        if hit.users.remove(user) {
            self.update_and_refresh(&hit).await?;
            info!("Unassigned {} from HIT {}", user, hit_id);
        }
        Ok(hit)
    }

    pub async fn set_active(&self, hit_id: &str, active: bool) -> Result<Hit> {
        let mut hit = self.get_hit(hit_id).await?;
        if hit.active != active {
            hit.active = active;
            self.store.update_hit(&hit).await?;
        }
        Ok(hit)
    }

    /// Store a judge's result and refresh the cached status of its HIT
    pub async fn submit_result(&self, result: NewResult) -> Result<ResultRecord> {
        let record = self.store.insert_result(result).await?;
        let snapshot = self.snapshot(&record.hit_id).await?;
        self.cache.refresh(&snapshot);
        debug!(
            "Stored result {} for segment {} by {}",
            record.id, record.segment_id, record.user
        );
        Ok(record)
    }

    /// Cached status of a HIT for one judge, computed on a cache miss
    pub async fn status_for_user(&self, hit_id: &str, user: &str) -> Result<HitStatus> {
        if let Some(status) = self.cache.get(hit_id, user) {
            return Ok(status);
        }
        let snapshot = self.snapshot(hit_id).await?;
        self.cache.refresh(&snapshot);
        Ok(status::status_for_user(&snapshot, user))
    }

    pub async fn status_for_all_users(&self, hit_id: &str) -> Result<HitStatus> {
        Ok(status::status_for_all_users(&self.snapshot(hit_id).await?))
    }

    /// Delete a HIT with everything it owns, then release its source blob
    /// unless another HIT still refers to it.
    ///
    /// Returns false when there was no such HIT.
    pub async fn delete_hit(&self, hit_id: &str) -> Result<bool> {
        let Some(hit) = self.store.get_hit(hit_id).await? else {
            return Ok(false);
        };

        let deleted = self.store.delete_hit(hit_id).await?;
        self.cache.invalidate_hit(hit_id);
        if !deleted {
            return Ok(false);
        }
        info!("Deleted HIT {}", hit_id);

        if let Some(key) = &hit.source_file {
            if self.store.source_file_references(key).await? == 0 {
                match self.blobs.remove(key).await {
                    Ok(true) => info!("Released source file {}", key),
                    Ok(false) => debug!("Source file {} was already gone", key),
                    Err(e) => warn!("Cannot release source file {}: {}", key, e),
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DirectoryBlobStore, MemoryStore};
    use crate::test_support::{batch_xml, hit_xml};
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> HitService<MemoryStore, DirectoryBlobStore> {
        HitService::new(MemoryStore::new(), DirectoryBlobStore::new(dir.path()))
    }

    fn pair() -> LanguagePair {
        "eng2deu".parse().unwrap()
    }

    #[tokio::test]
    async fn test_create_task_assigns_id() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let hit = service
            .create_task(&batch_xml(1), 7, pair(), TaskType::Ranking)
            .await
            .unwrap();
        assert_eq!(hit.id.len(), 8);
        assert_eq!(hit.block_id, 7);
        assert!(hit.segments.iter().all(|s| s.hit_id == hit.id && s.id > 0));
        assert!(service.store().hit_id_exists(&hit.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_schema_failure_persists_nothing() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let broken = hit_xml(1).replace(" systems=\"sys-a,sys-b,sys-c,sys-d,sys-e\"", "");

        let err = service
            .create_task(&broken, 1, pair(), TaskType::Ranking)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
        assert!(service.list_hits().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_batch_reads_attributes() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let hits = service
            .import_batch(&batch_xml(2), None, TaskType::Ranking, Some("batch.xml"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].block_id, 2);
        assert_eq!(hits[0].language_pair, pair());
        assert_eq!(hits[0].source_file.as_deref(), Some("batch.xml"));
        assert_eq!(service.blobs().read("batch.xml").await.unwrap(), batch_xml(2));
    }

    #[tokio::test]
    async fn test_import_same_name_keeps_earlier_blob() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let first = service
            .import_batch(&batch_xml(1), None, TaskType::Ranking, Some("batch.xml"))
            .await
            .unwrap();
        let second = service
            .import_batch(&batch_xml(2), None, TaskType::Ranking, Some("batch.xml"))
            .await
            .unwrap();

        let first_key = first[0].source_file.clone().unwrap();
        let second_key = second[0].source_file.clone().unwrap();
        assert_eq!(first_key, "batch.xml");
        assert_ne!(second_key, first_key);
        assert!(second_key.ends_with("-batch.xml"));
        assert!(second.iter().all(|h| h.source_file.as_deref() == Some(second_key.as_str())));

        assert_eq!(service.blobs().read(&first_key).await.unwrap(), batch_xml(1));
        assert_eq!(service.blobs().read(&second_key).await.unwrap(), batch_xml(2));
    }

    /// Delegates to a [`MemoryStore`] but refuses every HIT insert
    struct RejectingStore(MemoryStore);

    #[async_trait::async_trait]
    impl HitStore for RejectingStore {
        async fn hit_id_exists(&self, hit_id: &str) -> Result<bool> {
            self.0.hit_id_exists(hit_id).await
        }
        async fn insert_hits(&self, _hits: Vec<Hit>) -> Result<Vec<Hit>> {
            Err(Error::InvalidInput("store is read-only".to_string()))
        }
        async fn get_hit(&self, hit_id: &str) -> Result<Option<Hit>> {
            self.0.get_hit(hit_id).await
        }
        async fn list_hits(&self) -> Result<Vec<Hit>> {
            self.0.list_hits().await
        }
        async fn update_hit(&self, hit: &Hit) -> Result<()> {
            self.0.update_hit(hit).await
        }
        async fn delete_hit(&self, hit_id: &str) -> Result<bool> {
            self.0.delete_hit(hit_id).await
        }
        async fn source_file_references(&self, key: &str) -> Result<usize> {
            self.0.source_file_references(key).await
        }
        async fn insert_result(&self, result: NewResult) -> Result<ResultRecord> {
            self.0.insert_result(result).await
        }
        async fn results_for_hit(&self, hit_id: &str) -> Result<Vec<ResultRecord>> {
            self.0.results_for_hit(hit_id).await
        }
    }

    #[tokio::test]
    async fn test_failed_import_releases_blob() {
        let dir = TempDir::new().unwrap();
        let service = HitService::new(RejectingStore(MemoryStore::new()), DirectoryBlobStore::new(dir.path()));

        let err = service
            .import_batch(&batch_xml(2), None, TaskType::Ranking, Some("batch.xml"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(!service.blobs().exists("batch.xml").await.unwrap());
        assert!(service.list_hits().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_batch_is_all_or_nothing() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let xml = batch_xml(2).replacen("block-id=\"2\"", "block-id=\"two\"", 1);

        let err = service
            .import_batch(&xml, None, TaskType::Ranking, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(service.list_hits().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_refreshes_status_cache() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let hit = service
            .create_task(&hit_xml(1), 1, pair(), TaskType::Ranking)
            .await
            .unwrap();
        service.assign_user(&hit.id, "alice").await.unwrap();
        assert_eq!(service.cache().get(&hit.id, "alice").map(|s| s.done), Some(0));

        service
            .submit_result(NewResult::new(hit.segments[0].id, "alice", "1,2,3,4,5"))
            .await
            .unwrap();
        assert_eq!(service.cache().get(&hit.id, "alice").map(|s| s.done), Some(1));

        let status = service.status_for_user(&hit.id, "alice").await.unwrap();
        assert_eq!(status.completion(), "1/3");
    }

    #[tokio::test]
    async fn test_delete_releases_unshared_blob() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let hits = service
            .import_batch(&batch_xml(2), None, TaskType::Ranking, Some("batch.xml"))
            .await
            .unwrap();

        assert!(service.delete_hit(&hits[0].id).await.unwrap());
        // still referenced by the second HIT
        assert!(service.blobs().read("batch.xml").await.is_ok());

        assert!(service.delete_hit(&hits[1].id).await.unwrap());
        assert!(service.blobs().read("batch.xml").await.is_err());
        assert!(!service.delete_hit(&hits[1].id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_hit() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        assert!(matches!(
            service.assign_user("00000000", "alice").await,
            Err(Error::NotFound(_))
        ));
    }
}
