use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{CourseId, LectureId, SubLectureId, UserId};
use crate::model::shape::CourseShape;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("lecture {0} is recorded more than once")]
    DuplicateLecture(LectureId),

    #[error("sub-lecture {sub_lecture} is recorded more than once in lecture {lecture}")]
    DuplicateSubLecture {
        lecture: LectureId,
        sub_lecture: SubLectureId,
    },

    #[error("updated_at is before created_at")]
    InvalidTimeRange,
}

//
// ─── STORED STATE ──────────────────────────────────────────────────────────────
//

/// Whether a single sub-lecture has been viewed.
///
/// Entries are created lazily; a missing entry reads as unviewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubLectureProgress {
    pub sub_lecture_id: SubLectureId,
    pub viewed: bool,
}

/// Stored progress for one lecture.
///
/// `viewed` is the lecture-as-unit flag and only counts while the catalog
/// lists no sub-lectures for the lecture. Completion is never stored; see
/// [`crate::aggregate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LectureProgress {
    lecture_id: LectureId,
    viewed: bool,
    sub_lectures: Vec<SubLectureProgress>,
}

impl LectureProgress {
    #[must_use]
    pub fn new(lecture_id: LectureId) -> Self {
        Self {
            lecture_id,
            viewed: false,
            sub_lectures: Vec::new(),
        }
    }

    /// Rehydrate a lecture entry from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::DuplicateSubLecture` if a sub-lecture repeats.
    pub fn from_persisted(
        lecture_id: LectureId,
        viewed: bool,
        sub_lectures: Vec<SubLectureProgress>,
    ) -> Result<Self, ProgressError> {
        let mut seen = HashSet::with_capacity(sub_lectures.len());
        for sub in &sub_lectures {
            if !seen.insert(&sub.sub_lecture_id) {
                return Err(ProgressError::DuplicateSubLecture {
                    lecture: lecture_id,
                    sub_lecture: sub.sub_lecture_id.clone(),
                });
            }
        }
        Ok(Self {
            lecture_id,
            viewed,
            sub_lectures,
        })
    }

    #[must_use]
    pub fn lecture_id(&self) -> &LectureId {
        &self.lecture_id
    }

    #[must_use]
    pub fn viewed(&self) -> bool {
        self.viewed
    }

    /// Sub-lecture entries in the order they were first touched.
    #[must_use]
    pub fn sub_lectures(&self) -> &[SubLectureProgress] {
        &self.sub_lectures
    }

    #[must_use]
    pub fn is_sub_lecture_viewed(&self, sub_lecture: &SubLectureId) -> bool {
        self.sub_lectures
            .iter()
            .any(|s| &s.sub_lecture_id == sub_lecture && s.viewed)
    }

    fn set_sub_lecture_viewed(&mut self, sub_lecture: &SubLectureId, viewed: bool) {
        // An explicit un-view also drops a lecture-level force from a bulk mark.
        if !viewed {
            self.viewed = false;
        }
        match self
            .sub_lectures
            .iter_mut()
            .find(|s| &s.sub_lecture_id == sub_lecture)
        {
            Some(entry) => entry.viewed = viewed,
            None => self.sub_lectures.push(SubLectureProgress {
                sub_lecture_id: sub_lecture.clone(),
                viewed,
            }),
        }
    }

    pub(crate) fn retain_sub_lectures(&mut self, keep: impl Fn(&SubLectureId) -> bool) {
        self.sub_lectures.retain(|s| keep(&s.sub_lecture_id));
    }
}

/// The aggregate root: all progress of one user in one course.
///
/// `version` is the optimistic-concurrency counter maintained by the store;
/// `0` marks a record that has never been persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseProgress {
    user_id: UserId,
    course_id: CourseId,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    lectures: Vec<LectureProgress>,
}

impl CourseProgress {
    /// A fresh, unpersisted record with nothing viewed.
    #[must_use]
    pub fn empty(user_id: UserId, course_id: CourseId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            course_id,
            version: 0,
            created_at: now,
            updated_at: now,
            lectures: Vec::new(),
        }
    }

    /// Rehydrate a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::DuplicateLecture` if a lecture repeats, or
    /// `ProgressError::InvalidTimeRange` if the timestamps are inverted.
    pub fn from_persisted(
        user_id: UserId,
        course_id: CourseId,
        version: u64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        lectures: Vec<LectureProgress>,
    ) -> Result<Self, ProgressError> {
        if updated_at < created_at {
            return Err(ProgressError::InvalidTimeRange);
        }
        let mut seen = HashSet::with_capacity(lectures.len());
        for lecture in &lectures {
            if !seen.insert(lecture.lecture_id()) {
                return Err(ProgressError::DuplicateLecture(lecture.lecture_id().clone()));
            }
        }
        Ok(Self {
            user_id,
            course_id,
            version,
            created_at,
            updated_at,
            lectures,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn course_id(&self) -> &CourseId {
        &self.course_id
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    #[must_use]
    pub fn lectures(&self) -> &[LectureProgress] {
        &self.lectures
    }

    #[must_use]
    pub fn lecture(&self, lecture_id: &LectureId) -> Option<&LectureProgress> {
        self.lectures.iter().find(|l| l.lecture_id() == lecture_id)
    }

    /// Returns a copy stamped with the version a store assigned on write.
    #[must_use]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Records the time of a write. Never moves `updated_at` backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Sets the viewed flag of one sub-lecture, creating its entries on first touch.
    pub fn set_sub_lecture_viewed(
        &mut self,
        lecture_id: &LectureId,
        sub_lecture: &SubLectureId,
        viewed: bool,
    ) {
        self.lecture_entry(lecture_id)
            .set_sub_lecture_viewed(sub_lecture, viewed);
    }

    /// Forces every unit of the course to `viewed`.
    ///
    /// Materializes entries for every lecture and sub-lecture in `shape`, so
    /// the result holds an explicit flag for each unit.
    pub fn set_all_viewed(&mut self, shape: &CourseShape, viewed: bool) {
        for lecture_shape in shape.lectures() {
            let entry = self.lecture_entry(lecture_shape.lecture_id());
            entry.viewed = viewed;
            for sub in lecture_shape.sub_lectures() {
                entry.set_sub_lecture_viewed(sub, viewed);
            }
        }
    }

    /// Compares the tracked progress, ignoring version and timestamps.
    #[must_use]
    pub fn same_progress(&self, other: &Self) -> bool {
        self.user_id == other.user_id
            && self.course_id == other.course_id
            && self.lectures == other.lectures
    }

    pub(crate) fn replace_lectures(&mut self, lectures: Vec<LectureProgress>) {
        self.lectures = lectures;
    }

    pub(crate) fn take_lecture(&mut self, lecture_id: &LectureId) -> Option<LectureProgress> {
        let idx = self
            .lectures
            .iter()
            .position(|l| l.lecture_id() == lecture_id)?;
        Some(self.lectures.remove(idx))
    }

    fn lecture_entry(&mut self, lecture_id: &LectureId) -> &mut LectureProgress {
        let idx = match self
            .lectures
            .iter()
            .position(|l| l.lecture_id() == lecture_id)
        {
            Some(idx) => idx,
            None => {
                self.lectures.push(LectureProgress::new(lecture_id.clone()));
                self.lectures.len() - 1
            }
        };
        &mut self.lectures[idx]
    }
}

//
// ─── DERIVED VIEWS ─────────────────────────────────────────────────────────────
//

/// Lecture progress as observed by callers, with completion derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureProgressView {
    pub lecture_id: LectureId,
    pub completed: bool,
    pub sub_lecture_progress: Vec<SubLectureProgress>,
}

/// Course progress as observed by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgressView {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub completed: bool,
    pub progress_percentage: u8,
    pub lecture_progress: Vec<LectureProgressView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::shape::LectureShape;
    use crate::time::fixed_now;

    fn lid(s: &str) -> LectureId {
        LectureId::new(s).unwrap()
    }

    fn sid(s: &str) -> SubLectureId {
        SubLectureId::new(s).unwrap()
    }

    fn empty() -> CourseProgress {
        CourseProgress::empty(
            UserId::new("u1").unwrap(),
            CourseId::new("c1").unwrap(),
            fixed_now(),
        )
    }

    #[test]
    fn first_touch_creates_entries_in_insertion_order() {
        let mut record = empty();
        record.set_sub_lecture_viewed(&lid("A"), &sid("a2"), true);
        record.set_sub_lecture_viewed(&lid("A"), &sid("a1"), true);

        let lecture = record.lecture(&lid("A")).unwrap();
        let order: Vec<_> = lecture
            .sub_lectures()
            .iter()
            .map(|s| s.sub_lecture_id.as_str())
            .collect();
        assert_eq!(order, ["a2", "a1"]);
    }

    #[test]
    fn re_setting_a_sub_lecture_does_not_duplicate_it() {
        let mut record = empty();
        record.set_sub_lecture_viewed(&lid("A"), &sid("a1"), true);
        record.set_sub_lecture_viewed(&lid("A"), &sid("a1"), false);

        let lecture = record.lecture(&lid("A")).unwrap();
        assert_eq!(lecture.sub_lectures().len(), 1);
        assert!(!lecture.is_sub_lecture_viewed(&sid("a1")));
    }

    #[test]
    fn set_all_viewed_covers_childless_lectures() {
        let shape = CourseShape::new(
            CourseId::new("c1").unwrap(),
            vec![
                LectureShape::new(lid("A"), vec![sid("a1")]).unwrap(),
                LectureShape::new(lid("B"), Vec::new()).unwrap(),
            ],
        )
        .unwrap();
        let mut record = empty();
        record.set_all_viewed(&shape, true);

        assert!(record.lecture(&lid("B")).unwrap().viewed());
        assert!(record.lecture(&lid("A")).unwrap().is_sub_lecture_viewed(&sid("a1")));
    }

    #[test]
    fn from_persisted_rejects_duplicate_lectures() {
        let err = CourseProgress::from_persisted(
            UserId::new("u1").unwrap(),
            CourseId::new("c1").unwrap(),
            1,
            fixed_now(),
            fixed_now(),
            vec![LectureProgress::new(lid("A")), LectureProgress::new(lid("A"))],
        )
        .unwrap_err();
        assert_eq!(err, ProgressError::DuplicateLecture(lid("A")));
    }

    #[test]
    fn touch_never_rewinds() {
        let mut record = empty();
        record.touch(fixed_now() - chrono::Duration::hours(1));
        assert_eq!(record.updated_at(), fixed_now());
        record.touch(fixed_now() + chrono::Duration::hours(1));
        assert_eq!(record.updated_at(), fixed_now() + chrono::Duration::hours(1));
    }

    #[test]
    fn view_serializes_in_camel_case() {
        let view = CourseProgressView {
            user_id: UserId::new("u1").unwrap(),
            course_id: CourseId::new("c1").unwrap(),
            completed: false,
            progress_percentage: 33,
            lecture_progress: vec![LectureProgressView {
                lecture_id: lid("A"),
                completed: false,
                sub_lecture_progress: vec![SubLectureProgress {
                    sub_lecture_id: sid("a1"),
                    viewed: true,
                }],
            }],
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["progressPercentage"], 33);
        assert_eq!(
            json["lectureProgress"][0]["subLectureProgress"][0]["subLectureId"],
            "a1"
        );
    }
}
