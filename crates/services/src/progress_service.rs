use std::future::Future;
use std::sync::Arc;

use progress_core::model::{
    CourseId, CourseProgress, CourseProgressView, CourseShape, LectureId, SubLectureId, UserId,
};
use progress_core::{Aggregation, aggregate};
use storage::repository::{ProgressRepository, StorageError};
use tracing::{debug, info, warn};

use crate::Clock;
use crate::catalog::CatalogShapeResolver;
use crate::config::ProgressConfig;
use crate::error::ProgressServiceError;

/// Reads and updates per-(user, course) progress.
///
/// Every write is a load → mutate → aggregate → versioned upsert cycle on the
/// whole `CourseProgress` aggregate. A version conflict re-runs the cycle
/// with the same logical mutation, up to `ProgressConfig::max_attempts`.
///
/// Access control is the caller's job: the service assumes the user is
/// enrolled in the course.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    progress: Arc<dyn ProgressRepository>,
    catalog: Arc<dyn CatalogShapeResolver>,
    config: ProgressConfig,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        progress: Arc<dyn ProgressRepository>,
        catalog: Arc<dyn CatalogShapeResolver>,
    ) -> Self {
        Self::with_config(clock, progress, catalog, ProgressConfig::default())
    }

    #[must_use]
    pub fn with_config(
        clock: Clock,
        progress: Arc<dyn ProgressRepository>,
        catalog: Arc<dyn CatalogShapeResolver>,
        config: ProgressConfig,
    ) -> Self {
        Self {
            clock,
            progress,
            catalog,
            config,
        }
    }

    /// Current progress of a user in a course.
    ///
    /// The first read for a pair materializes and persists an empty record;
    /// later reads never write.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::CourseNotFound` for an unknown course,
    /// `Timeout`/`Storage`/`Catalog` if a collaborator fails.
    pub async fn get_course_progress(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<CourseProgressView, ProgressServiceError> {
        let shape = self.shape(course_id).await?;

        if let Some(record) = self.load(user_id, course_id).await? {
            return Ok(aggregate(&record, &shape).view);
        }

        let empty = CourseProgress::empty(user_id.clone(), course_id.clone(), self.clock.now());
        let Aggregation { record, view } = aggregate(&empty, &shape);
        match self.store(self.progress.upsert(&record)).await {
            Ok(version) => {
                info!(%user_id, %course_id, version, "materialized course progress");
                Ok(view)
            }
            Err(ProgressServiceError::Conflict) => {
                // Another request created the record first; report theirs.
                debug!(%user_id, %course_id, "lost first-access race; reloading");
                let winner = self
                    .load(user_id, course_id)
                    .await?
                    .ok_or(ProgressServiceError::Conflict)?;
                Ok(aggregate(&winner, &shape).view)
            }
            Err(err) => Err(err),
        }
    }

    /// Marks one sub-lecture viewed (or unviewed when `completed` is
    /// `Some(false)`) and returns the resulting percentage.
    ///
    /// Repeating a call leaves state unchanged and skips the write.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::CourseNotFound`, `LectureNotFound`, or
    /// `SubLectureNotFound` when the IDs are not in the current catalog,
    /// `Conflict` once the retry budget is spent, or collaborator failures.
    pub async fn update_lecture_progress(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        lecture_id: &LectureId,
        sub_lecture_id: &SubLectureId,
        completed: Option<bool>,
    ) -> Result<u8, ProgressServiceError> {
        let shape = self.shape(course_id).await?;
        let lecture = shape
            .lecture(lecture_id)
            .ok_or_else(|| ProgressServiceError::LectureNotFound {
                course: course_id.clone(),
                lecture: lecture_id.clone(),
            })?;
        if !lecture.contains(sub_lecture_id) {
            return Err(ProgressServiceError::SubLectureNotFound {
                lecture: lecture_id.clone(),
                sub_lecture: sub_lecture_id.clone(),
            });
        }

        let viewed = completed.unwrap_or(true);
        let view = self
            .mutate(user_id, &shape, |record| {
                record.set_sub_lecture_viewed(lecture_id, sub_lecture_id, viewed);
            })
            .await?;
        Ok(view.progress_percentage)
    }

    /// Forces every unit of the course viewed.
    ///
    /// # Errors
    ///
    /// Same as [`ProgressService::update_lecture_progress`], minus the
    /// lecture-level lookups.
    pub async fn mark_as_completed(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<CourseProgressView, ProgressServiceError> {
        self.mark_all(user_id, course_id, true).await
    }

    /// Forces every unit of the course unviewed.
    ///
    /// # Errors
    ///
    /// Same as [`ProgressService::mark_as_completed`].
    pub async fn mark_as_in_completed(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<CourseProgressView, ProgressServiceError> {
        self.mark_all(user_id, course_id, false).await
    }

    /// Drops stored progress, e.g. after unenrollment.
    ///
    /// Returns `false` when nothing was stored; the next access lazily
    /// recreates an empty record either way.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` or `Storage` if the delete fails.
    pub async fn clear_course_progress(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<bool, ProgressServiceError> {
        let removed = self
            .store(self.progress.delete(user_id, course_id))
            .await?;
        if removed {
            info!(%user_id, %course_id, "cleared course progress");
        }
        Ok(removed)
    }

    async fn mark_all(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        viewed: bool,
    ) -> Result<CourseProgressView, ProgressServiceError> {
        let shape = self.shape(course_id).await?;
        self.mutate(user_id, &shape, |record| record.set_all_viewed(&shape, viewed))
            .await
    }

    async fn mutate<F>(
        &self,
        user_id: &UserId,
        shape: &CourseShape,
        apply: F,
    ) -> Result<CourseProgressView, ProgressServiceError>
    where
        F: Fn(&mut CourseProgress) + Send + Sync,
    {
        let course_id = shape.course_id();
        for attempt in 1..=self.config.max_attempts() {
            let base = self.load(user_id, course_id).await?.unwrap_or_else(|| {
                CourseProgress::empty(user_id.clone(), course_id.clone(), self.clock.now())
            });

            let mut next = aggregate(&base, shape).record;
            apply(&mut next);
            let Aggregation { mut record, view } = aggregate(&next, shape);

            if base.is_persisted() && record.same_progress(&base) {
                debug!(%user_id, %course_id, "progress unchanged; skipping write");
                return Ok(view);
            }

            record.touch(self.clock.now());
            match self.store(self.progress.upsert(&record)).await {
                Ok(version) => {
                    info!(
                        %user_id,
                        %course_id,
                        version,
                        percentage = view.progress_percentage,
                        completed = view.completed,
                        "persisted course progress"
                    );
                    return Ok(view);
                }
                Err(ProgressServiceError::Conflict) => {
                    warn!(%user_id, %course_id, attempt, "version conflict; retrying");
                }
                Err(err) => return Err(err),
            }
        }

        warn!(
            %user_id,
            %course_id,
            attempts = self.config.max_attempts(),
            "giving up after repeated version conflicts"
        );
        Err(ProgressServiceError::Conflict)
    }

    async fn shape(&self, course_id: &CourseId) -> Result<CourseShape, ProgressServiceError> {
        self.catalog
            .shape_of(course_id)
            .await?
            .ok_or_else(|| ProgressServiceError::CourseNotFound(course_id.clone()))
    }

    async fn load(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<CourseProgress>, ProgressServiceError> {
        let loaded = self.store(self.progress.load(user_id, course_id)).await?;
        debug!(
            %user_id,
            %course_id,
            version = loaded.as_ref().map(CourseProgress::version),
            "loaded course progress"
        );
        Ok(loaded)
    }

    async fn store<T>(
        &self,
        call: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, ProgressServiceError> {
        match tokio::time::timeout(self.config.store_timeout(), call).await {
            Ok(result) => result.map_err(ProgressServiceError::from),
            Err(_) => {
                warn!(timeout = ?self.config.store_timeout(), "progress store call timed out");
                Err(ProgressServiceError::Timeout)
            }
        }
    }
}
