use std::collections::HashMap;

use progress_core::model::{
    CourseId, CourseProgress, LectureId, LectureProgress, SubLectureId, SubLectureProgress, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    bool_from_i64, bool_to_i64, id_from_str, position_to_i64, ser, version_from_i64,
    version_to_i64,
};
use crate::repository::{ProgressRepository, StorageError};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn map_sub_lecture_row(row: &SqliteRow) -> Result<(LectureId, SubLectureProgress), StorageError> {
    let lecture_id = id_from_str("lecture_id", &row.try_get::<String, _>("lecture_id").map_err(ser)?)?;
    let sub_lecture_id = id_from_str::<SubLectureId>(
        "sub_lecture_id",
        &row.try_get::<String, _>("sub_lecture_id").map_err(ser)?,
    )?;
    let viewed = bool_from_i64("viewed", row.try_get::<i64, _>("viewed").map_err(ser)?)?;
    Ok((
        lecture_id,
        SubLectureProgress {
            sub_lecture_id,
            viewed,
        },
    ))
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn load(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<CourseProgress>, StorageError> {
        // One read transaction so the three selects see the same snapshot.
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let Some(head) = sqlx::query(
            r"
            SELECT version, created_at, updated_at
            FROM course_progress
            WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(user_id.as_str())
        .bind(course_id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(conn)?
        else {
            return Ok(None);
        };

        let lecture_rows = sqlx::query(
            r"
            SELECT lecture_id, viewed
            FROM lecture_progress
            WHERE user_id = ?1 AND course_id = ?2
            ORDER BY position ASC
            ",
        )
        .bind(user_id.as_str())
        .bind(course_id.as_str())
        .fetch_all(&mut *tx)
        .await
        .map_err(conn)?;

        let sub_rows = sqlx::query(
            r"
            SELECT lecture_id, sub_lecture_id, viewed
            FROM sub_lecture_progress
            WHERE user_id = ?1 AND course_id = ?2
            ORDER BY lecture_id ASC, position ASC
            ",
        )
        .bind(user_id.as_str())
        .bind(course_id.as_str())
        .fetch_all(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;

        let mut subs_by_lecture: HashMap<LectureId, Vec<SubLectureProgress>> = HashMap::new();
        for row in &sub_rows {
            let (lecture_id, sub) = map_sub_lecture_row(row)?;
            subs_by_lecture.entry(lecture_id).or_default().push(sub);
        }

        let mut lectures = Vec::with_capacity(lecture_rows.len());
        for row in &lecture_rows {
            let lecture_id: LectureId =
                id_from_str("lecture_id", &row.try_get::<String, _>("lecture_id").map_err(ser)?)?;
            let viewed = bool_from_i64("viewed", row.try_get::<i64, _>("viewed").map_err(ser)?)?;
            let subs = subs_by_lecture.remove(&lecture_id).unwrap_or_default();
            lectures.push(LectureProgress::from_persisted(lecture_id, viewed, subs).map_err(ser)?);
        }

        CourseProgress::from_persisted(
            user_id.clone(),
            course_id.clone(),
            version_from_i64(head.try_get::<i64, _>("version").map_err(ser)?)?,
            head.try_get("created_at").map_err(ser)?,
            head.try_get("updated_at").map_err(ser)?,
            lectures,
        )
        .map(Some)
        .map_err(ser)
    }

    async fn upsert(&self, progress: &CourseProgress) -> Result<u64, StorageError> {
        let user_id = progress.user_id().as_str();
        let course_id = progress.course_id().as_str();
        let base = progress.version();
        let next = base + 1;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        if base == 0 {
            let res = sqlx::query(
                r"
                INSERT INTO course_progress (user_id, course_id, version, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(user_id, course_id) DO NOTHING
                ",
            )
            .bind(user_id)
            .bind(course_id)
            .bind(version_to_i64(next)?)
            .bind(progress.created_at())
            .bind(progress.updated_at())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
            if res.rows_affected() == 0 {
                return Err(StorageError::Conflict);
            }
        } else {
            let res = sqlx::query(
                r"
                UPDATE course_progress
                SET version = ?1, updated_at = ?2
                WHERE user_id = ?3 AND course_id = ?4 AND version = ?5
                ",
            )
            .bind(version_to_i64(next)?)
            .bind(progress.updated_at())
            .bind(user_id)
            .bind(course_id)
            .bind(version_to_i64(base)?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
            if res.rows_affected() == 0 {
                return Err(StorageError::Conflict);
            }

            // Sub-lecture rows cascade.
            sqlx::query("DELETE FROM lecture_progress WHERE user_id = ?1 AND course_id = ?2")
                .bind(user_id)
                .bind(course_id)
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
        }

        for (position, lecture) in progress.lectures().iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO lecture_progress (user_id, course_id, lecture_id, position, viewed)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(user_id)
            .bind(course_id)
            .bind(lecture.lecture_id().as_str())
            .bind(position_to_i64(position)?)
            .bind(bool_to_i64(lecture.viewed()))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

            for (sub_position, sub) in lecture.sub_lectures().iter().enumerate() {
                sqlx::query(
                    r"
                    INSERT INTO sub_lecture_progress (
                        user_id, course_id, lecture_id, sub_lecture_id, position, viewed
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ",
                )
                .bind(user_id)
                .bind(course_id)
                .bind(lecture.lecture_id().as_str())
                .bind(sub.sub_lecture_id.as_str())
                .bind(position_to_i64(sub_position)?)
                .bind(bool_to_i64(sub.viewed))
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
            }
        }

        tx.commit().await.map_err(conn)?;
        Ok(next)
    }

    async fn delete(&self, user_id: &UserId, course_id: &CourseId) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM course_progress WHERE user_id = ?1 AND course_id = ?2")
            .bind(user_id.as_str())
            .bind(course_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(res.rows_affected() > 0)
    }
}
