//! Storage collaborators
//!
//! [`HitStore`] persists HITs, their segments and results. [`BlobStore`]
//! holds uploaded XML documents referenced by [`Hit::source_file`].

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::{Error, Result};
use crate::hit::{Hit, HitSnapshot};
use crate::judgment::{NewResult, ResultRecord};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

#[async_trait]
pub trait HitStore: Send + Sync {
    async fn hit_id_exists(&self, hit_id: &str) -> Result<bool>;

    /// Persist HITs and their segments in one step: all of them or none.
    ///
    /// Returns the stored HITs with segment ids assigned. Fails with
    /// [`Error::DuplicateHitId`] when an id is taken or repeated.
    async fn insert_hits(&self, hits: Vec<Hit>) -> Result<Vec<Hit>>;

    async fn insert_hit(&self, hit: Hit) -> Result<Hit> {
        let id = hit.id.clone();
        self.insert_hits(vec![hit])
            .await?
            .pop()
            .ok_or_else(|| Error::NotFound(format!("HIT {}", id)))
    }

    async fn get_hit(&self, hit_id: &str) -> Result<Option<Hit>>;

    /// All HITs ordered by `(block_id, language_pair, id)`
    async fn list_hits(&self) -> Result<Vec<Hit>>;

    /// Store assigned users and the active flag; segments are never touched
    async fn update_hit(&self, hit: &Hit) -> Result<()>;

    /// Remove a HIT with its segments, results and assignments.
    /// Returns false if there was no such HIT.
    async fn delete_hit(&self, hit_id: &str) -> Result<bool>;

    /// Number of HITs whose `source_file` is `key`
    async fn source_file_references(&self, key: &str) -> Result<usize>;

    /// Store a result for an existing segment
    async fn insert_result(&self, result: NewResult) -> Result<ResultRecord>;

    /// Results of every segment of a HIT, in submission order
    async fn results_for_hit(&self, hit_id: &str) -> Result<Vec<ResultRecord>>;

    async fn snapshot(&self, hit_id: &str) -> Result<Option<HitSnapshot>> {
        let Some(hit) = self.get_hit(hit_id).await? else {
            return Ok(None);
        };
        let results = self.results_for_hit(hit_id).await?;
        Ok(Some(HitSnapshot::new(hit, results)))
    }
}

pub(crate) fn validate_new_result(result: &NewResult) -> Result<()> {
    if result.raw_result.is_empty() {
        return Err(Error::InvalidInput("raw result must not be empty".to_string()));
    }
    if result.user.is_empty() {
        return Err(Error::InvalidInput("user must not be empty".to_string()));
    }
    Ok(())
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn store(&self, key: &str, contents: &str) -> Result<()>;

    async fn read(&self, key: &str) -> Result<String>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Delete a blob; returns false if it did not exist
    async fn remove(&self, key: &str) -> Result<bool>;
}

/// Blobs as files in one directory, named by their key
#[derive(Debug, Clone)]
pub struct DirectoryBlobStore {
    root: PathBuf,
}

impl DirectoryBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key == "." || key == ".." || key.contains(&['/', '\\'][..]) {
            return Err(Error::InvalidInput(format!("invalid blob key: {:?}", key)));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for DirectoryBlobStore {
    async fn store(&self, key: &str, contents: &str) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&path, contents).await?;
        debug!("Stored blob {}", path.display());
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<String> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("blob {}", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path_for(key)?).await?)
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed blob {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
