use async_trait::async_trait;
use progress_core::model::{CourseId, CourseProgress, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The stored version no longer matches the writer's base version.
    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for per-(user, course) progress aggregates.
///
/// Implementations replace or create the whole aggregate atomically; readers
/// never observe a partially written record.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the stored record for a user and course.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read or decoded.
    async fn load(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<CourseProgress>, StorageError>;

    /// Create or replace a record, checking `progress.version()` against the
    /// stored version. A version of `0` expects no stored record.
    ///
    /// Returns the new stored version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the base version is stale, or other
    /// storage errors. Nothing is written on error.
    async fn upsert(&self, progress: &CourseProgress) -> Result<u64, StorageError>;

    /// Remove a stored record. Returns `false` if there was nothing to remove.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete cannot be executed.
    async fn delete(&self, user_id: &UserId, course_id: &CourseId) -> Result<bool, StorageError>;
}

type ProgressKey = (UserId, CourseId);

/// In-memory repository for tests and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryProgressRepository {
    records: Arc<Mutex<HashMap<ProgressKey, CourseProgress>>>,
}

impl InMemoryProgressRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressRepository for InMemoryProgressRepository {
    async fn load(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<CourseProgress>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(user_id.clone(), course_id.clone())).cloned())
    }

    async fn upsert(&self, progress: &CourseProgress) -> Result<u64, StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let key = (progress.user_id().clone(), progress.course_id().clone());
        let stored_version = guard.get(&key).map_or(0, CourseProgress::version);
        if stored_version != progress.version() {
            return Err(StorageError::Conflict);
        }
        let next = stored_version + 1;
        guard.insert(key, progress.clone().with_version(next));
        Ok(next)
    }

    async fn delete(&self, user_id: &UserId, course_id: &CourseId) -> Result<bool, StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .remove(&(user_id.clone(), course_id.clone()))
            .is_some())
    }
}

/// Aggregates the repositories behind trait objects for easy swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let progress: Arc<dyn ProgressRepository> = Arc::new(InMemoryProgressRepository::new());
        Self { progress }
    }
}
