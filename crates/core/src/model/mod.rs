mod ids;
mod progress;
mod shape;

pub use ids::{CourseId, IdError, LectureId, MAX_ID_LEN, SubLectureId, UserId};
pub use progress::{
    CourseProgress, CourseProgressView, LectureProgress, LectureProgressView, ProgressError,
    SubLectureProgress,
};
pub use shape::{CourseShape, LectureShape, ShapeError};
