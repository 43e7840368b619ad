//! Shared error types for the services crate.

use thiserror::Error;

use progress_core::model::{CourseId, IdError, LectureId, SubLectureId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by a `CatalogShapeResolver`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Coarse classification of a failure, one status per taxonomy entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; retrying will not help.
    InvalidArgument,
    /// Unknown course, lecture, or sub-lecture in the current catalog.
    NotFound,
    /// Concurrent writers won every attempt; the caller may try again.
    Conflict,
    /// A collaborator failed or timed out.
    Unavailable,
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    InvalidArgument(#[from] IdError),
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error("lecture {lecture} not found in course {course}")]
    LectureNotFound { course: CourseId, lecture: LectureId },
    #[error("sub-lecture {sub_lecture} not found in lecture {lecture}")]
    SubLectureNotFound {
        lecture: LectureId,
        sub_lecture: SubLectureId,
    },
    #[error("progress was modified concurrently; retry budget exhausted")]
    Conflict,
    #[error("progress store timed out")]
    Timeout,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Storage(StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

impl ProgressServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::CourseNotFound(_) | Self::LectureNotFound { .. } | Self::SubLectureNotFound { .. } => {
                ErrorKind::NotFound
            }
            Self::Conflict => ErrorKind::Conflict,
            Self::Timeout | Self::Catalog(_) | Self::Storage(_) => ErrorKind::Unavailable,
        }
    }
}

impl From<StorageError> for ProgressServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict => Self::Conflict,
            other => Self::Storage(other),
        }
    }
}
