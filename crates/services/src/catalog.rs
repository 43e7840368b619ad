use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use progress_core::model::{CourseId, CourseShape};

use crate::error::CatalogError;

/// Supplies the current lecture/sub-lecture layout of a course.
///
/// Implementations may lag behind catalog edits; callers resolve the shape
/// once per operation.
#[async_trait]
pub trait CatalogShapeResolver: Send + Sync {
    /// Returns `Ok(None)` for a course the catalog does not know.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the catalog cannot be reached.
    async fn shape_of(&self, course_id: &CourseId) -> Result<Option<CourseShape>, CatalogError>;
}

/// Catalog held in memory; edits are visible to the next lookup.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    shapes: Arc<RwLock<HashMap<CourseId, CourseShape>>>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_shapes(shapes: impl IntoIterator<Item = CourseShape>) -> Self {
        let map = shapes
            .into_iter()
            .map(|shape| (shape.course_id().clone(), shape))
            .collect();
        Self {
            shapes: Arc::new(RwLock::new(map)),
        }
    }

    /// Adds or replaces a course layout, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Unavailable` if the lock is poisoned.
    pub fn insert(&self, shape: CourseShape) -> Result<Option<CourseShape>, CatalogError> {
        let mut guard = self
            .shapes
            .write()
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;
        Ok(guard.insert(shape.course_id().clone(), shape))
    }

    /// Removes a course from the catalog.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Unavailable` if the lock is poisoned.
    pub fn remove(&self, course_id: &CourseId) -> Result<Option<CourseShape>, CatalogError> {
        let mut guard = self
            .shapes
            .write()
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;
        Ok(guard.remove(course_id))
    }
}

#[async_trait]
impl CatalogShapeResolver for InMemoryCatalog {
    async fn shape_of(&self, course_id: &CourseId) -> Result<Option<CourseShape>, CatalogError> {
        let guard = self
            .shapes
            .read()
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;
        Ok(guard.get(course_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use progress_core::model::{LectureId, LectureShape};

    #[tokio::test]
    async fn edits_are_visible_to_the_next_lookup() {
        let course = CourseId::new("c1").unwrap();
        let catalog = InMemoryCatalog::new();
        assert!(catalog.shape_of(&course).await.unwrap().is_none());

        let shape = CourseShape::new(
            course.clone(),
            vec![LectureShape::new(LectureId::new("A").unwrap(), Vec::new()).unwrap()],
        )
        .unwrap();
        catalog.insert(shape.clone()).unwrap();
        assert_eq!(catalog.shape_of(&course).await.unwrap(), Some(shape));

        catalog.remove(&course).unwrap();
        assert!(catalog.shape_of(&course).await.unwrap().is_none());
    }
}
