use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs versioned schema migrations.
///
/// Version 1 creates the progress aggregate tables: one row per
/// (user, course) in `course_progress`, with lecture and sub-lecture entries
/// hanging off it by cascading foreign keys.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS course_progress (
                    user_id TEXT NOT NULL,
                    course_id TEXT NOT NULL,
                    version INTEGER NOT NULL CHECK (version > 0),
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, course_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS lecture_progress (
                    user_id TEXT NOT NULL,
                    course_id TEXT NOT NULL,
                    lecture_id TEXT NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    viewed INTEGER NOT NULL CHECK (viewed IN (0, 1)),
                    PRIMARY KEY (user_id, course_id, lecture_id),
                    FOREIGN KEY (user_id, course_id)
                        REFERENCES course_progress(user_id, course_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS sub_lecture_progress (
                    user_id TEXT NOT NULL,
                    course_id TEXT NOT NULL,
                    lecture_id TEXT NOT NULL,
                    sub_lecture_id TEXT NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    viewed INTEGER NOT NULL CHECK (viewed IN (0, 1)),
                    PRIMARY KEY (user_id, course_id, lecture_id, sub_lecture_id),
                    FOREIGN KEY (user_id, course_id, lecture_id)
                        REFERENCES lecture_progress(user_id, course_id, lecture_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
