//! Completion aggregation.
//!
//! Reconciles a stored [`CourseProgress`] against the current [`CourseShape`]
//! and derives lecture completion, course completion, and the progress
//! percentage. Pure: the same inputs always yield the same output.

use crate::model::{
    CourseProgress, CourseProgressView, CourseShape, LectureProgress, LectureProgressView,
};

/// Output of one aggregation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    /// The record reconciled with the catalog: one entry per catalog lecture,
    /// in catalog order, with orphaned entries pruned.
    pub record: CourseProgress,
    /// Derived completion state as returned to callers.
    pub view: CourseProgressView,
}

/// Rounds `100 * viewed / total` half-up. An empty course reports 0.
#[must_use]
pub fn percentage(viewed_units: usize, total_units: usize) -> u8 {
    if total_units == 0 {
        return 0;
    }
    let viewed = viewed_units.min(total_units) as u64;
    let total = total_units as u64;
    let pct = (200 * viewed + total) / (2 * total);
    u8::try_from(pct).unwrap_or(100)
}

/// Reconciles `record` with `shape` and derives completion.
#[must_use]
pub fn aggregate(record: &CourseProgress, shape: &CourseShape) -> Aggregation {
    let mut next = record.clone();
    let mut lectures = Vec::with_capacity(shape.lectures().len());
    let mut lecture_views = Vec::with_capacity(shape.lectures().len());
    let mut viewed_units = 0usize;
    let mut all_completed = true;

    for lecture_shape in shape.lectures() {
        let mut entry = next
            .take_lecture(lecture_shape.lecture_id())
            .unwrap_or_else(|| LectureProgress::new(lecture_shape.lecture_id().clone()));
        entry.retain_sub_lectures(|sub| lecture_shape.contains(sub));

        let (viewed, completed) = if lecture_shape.sub_lectures().is_empty() {
            // Only a bulk mark sets the lecture-level flag.
            (usize::from(entry.viewed()), entry.viewed())
        } else {
            let viewed = lecture_shape
                .sub_lectures()
                .iter()
                .filter(|sub| entry.is_sub_lecture_viewed(sub))
                .count();
            (viewed, viewed == lecture_shape.sub_lectures().len())
        };

        viewed_units += viewed;
        all_completed &= completed;
        lecture_views.push(LectureProgressView {
            lecture_id: entry.lecture_id().clone(),
            completed,
            sub_lecture_progress: entry.sub_lectures().to_vec(),
        });
        lectures.push(entry);
    }

    // Whatever was not taken above is no longer in the catalog.
    next.replace_lectures(lectures);

    let total_units = shape.total_units();
    let view = CourseProgressView {
        user_id: next.user_id().clone(),
        course_id: next.course_id().clone(),
        completed: total_units > 0 && all_completed,
        progress_percentage: percentage(viewed_units, total_units),
        lecture_progress: lecture_views,
    };

    Aggregation { record: next, view }
}
