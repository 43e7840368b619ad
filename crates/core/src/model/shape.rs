use std::collections::HashSet;

use thiserror::Error;

use crate::model::ids::{CourseId, LectureId, SubLectureId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ShapeError {
    #[error("lecture {0} appears more than once in the course")]
    DuplicateLecture(LectureId),

    #[error("sub-lecture {sub_lecture} appears more than once in lecture {lecture}")]
    DuplicateSubLecture {
        lecture: LectureId,
        sub_lecture: SubLectureId,
    },
}

/// One lecture of the catalog and its ordered sub-lectures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LectureShape {
    lecture_id: LectureId,
    sub_lectures: Vec<SubLectureId>,
}

impl LectureShape {
    /// Creates a lecture shape.
    ///
    /// # Errors
    ///
    /// Returns `ShapeError::DuplicateSubLecture` if a sub-lecture ID repeats.
    pub fn new(lecture_id: LectureId, sub_lectures: Vec<SubLectureId>) -> Result<Self, ShapeError> {
        let mut seen = HashSet::with_capacity(sub_lectures.len());
        for sub in &sub_lectures {
            if !seen.insert(sub) {
                return Err(ShapeError::DuplicateSubLecture {
                    lecture: lecture_id,
                    sub_lecture: sub.clone(),
                });
            }
        }
        Ok(Self {
            lecture_id,
            sub_lectures,
        })
    }

    #[must_use]
    pub fn lecture_id(&self) -> &LectureId {
        &self.lecture_id
    }

    #[must_use]
    pub fn sub_lectures(&self) -> &[SubLectureId] {
        &self.sub_lectures
    }

    #[must_use]
    pub fn contains(&self, sub_lecture: &SubLectureId) -> bool {
        self.sub_lectures.contains(sub_lecture)
    }

    /// Units this lecture contributes: its sub-lectures, or itself when it has none.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.sub_lectures.len().max(1)
    }
}

/// The current lecture/sub-lecture layout of a course, as supplied by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseShape {
    course_id: CourseId,
    lectures: Vec<LectureShape>,
}

impl CourseShape {
    /// Creates a course shape.
    ///
    /// # Errors
    ///
    /// Returns `ShapeError::DuplicateLecture` if a lecture ID repeats.
    pub fn new(course_id: CourseId, lectures: Vec<LectureShape>) -> Result<Self, ShapeError> {
        let mut seen = HashSet::with_capacity(lectures.len());
        for lecture in &lectures {
            if !seen.insert(lecture.lecture_id()) {
                return Err(ShapeError::DuplicateLecture(lecture.lecture_id().clone()));
            }
        }
        Ok(Self { course_id, lectures })
    }

    #[must_use]
    pub fn course_id(&self) -> &CourseId {
        &self.course_id
    }

    #[must_use]
    pub fn lectures(&self) -> &[LectureShape] {
        &self.lectures
    }

    #[must_use]
    pub fn lecture(&self, lecture_id: &LectureId) -> Option<&LectureShape> {
        self.lectures.iter().find(|l| l.lecture_id() == lecture_id)
    }

    #[must_use]
    pub fn contains_sub_lecture(&self, lecture_id: &LectureId, sub_lecture: &SubLectureId) -> bool {
        self.lecture(lecture_id)
            .is_some_and(|lecture| lecture.contains(sub_lecture))
    }

    #[must_use]
    pub fn total_units(&self) -> usize {
        self.lectures.iter().map(LectureShape::unit_count).sum()
    }
}
