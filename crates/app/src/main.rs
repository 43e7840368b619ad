use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use progress_core::model::{CourseId, LectureId, SubLectureId, UserId};
use serde_json::json;
use services::{AppServices, Clock, ErrorKind, ProgressConfig, ProgressServiceError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod catalog_file;
mod db_url;

use catalog_file::load_catalog;
use db_url::{normalize_sqlite_url, prepare_sqlite_file};

#[derive(Parser, Debug)]
#[command(name = "progress")]
#[command(about = "Course progress tracking over a SQLite store")]
struct Cli {
    /// SQLite database URL or path
    #[arg(long, env = "PROGRESS_DB_URL", default_value = "sqlite:progress.sqlite3")]
    db: String,

    /// JSON file describing course/lecture/sub-lecture layout
    #[arg(long, env = "PROGRESS_CATALOG")]
    catalog: PathBuf,

    /// Attempts per write before giving up on version conflicts
    #[arg(long, env = "PROGRESS_MAX_ATTEMPTS", default_value_t = ProgressConfig::DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Timeout for each store call, in milliseconds
    #[arg(long, env = "PROGRESS_STORE_TIMEOUT_MS", default_value_t = 5_000)]
    store_timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show progress for a user in a course
    Get {
        #[arg(long)]
        user: String,
        #[arg(long)]
        course: String,
    },
    /// Mark one sub-lecture viewed (or unviewed with --completed false)
    Update {
        #[arg(long)]
        user: String,
        #[arg(long)]
        course: String,
        #[arg(long)]
        lecture: String,
        #[arg(long)]
        sub_lecture: String,
        #[arg(long)]
        completed: Option<bool>,
    },
    /// Mark the whole course completed
    Complete {
        #[arg(long)]
        user: String,
        #[arg(long)]
        course: String,
    },
    /// Mark the whole course not completed
    Incomplete {
        #[arg(long)]
        user: String,
        #[arg(long)]
        course: String,
    },
    /// Drop stored progress (unenrollment)
    Clear {
        #[arg(long)]
        user: String,
        #[arg(long)]
        course: String,
    },
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
    #[error(transparent)]
    Catalog(#[from] catalog_file::CatalogFileError),
    #[error(transparent)]
    DbUrl(#[from] db_url::DbUrlError),
    #[error(transparent)]
    Services(#[from] services::AppServicesError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Distinct exit status per failure class so scripts can tell
    /// "not found" apart from "try again".
    fn exit_code(&self) -> u8 {
        match self {
            AppError::Progress(err) => match err.kind() {
                ErrorKind::InvalidArgument => 2,
                ErrorKind::NotFound => 3,
                ErrorKind::Conflict => 4,
                ErrorKind::Unavailable => 5,
            },
            AppError::Catalog(_) | AppError::DbUrl(_) | AppError::Services(_) => 6,
            AppError::Json(_) => 1,
        }
    }
}

fn ids(user: &str, course: &str) -> Result<(UserId, CourseId), ProgressServiceError> {
    Ok((UserId::new(user)?, CourseId::new(course)?))
}

async fn run(cli: Cli) -> Result<serde_json::Value, AppError> {
    let catalog = Arc::new(load_catalog(&cli.catalog)?);
    let db_url = normalize_sqlite_url(&cli.db);
    prepare_sqlite_file(&db_url)?;

    let config = ProgressConfig::new(cli.max_attempts, Duration::from_millis(cli.store_timeout_ms));
    info!(db = %db_url, catalog = %cli.catalog.display(), ?config, "starting progress");
    let services = AppServices::new_sqlite(&db_url, Clock::System, catalog, config).await?;
    let progress = services.progress();

    let output = match cli.command {
        Command::Get { user, course } => {
            let (user, course) = ids(&user, &course)?;
            serde_json::to_value(progress.get_course_progress(&user, &course).await?)?
        }
        Command::Update {
            user,
            course,
            lecture,
            sub_lecture,
            completed,
        } => {
            let (user, course) = ids(&user, &course)?;
            let lecture = LectureId::new(lecture).map_err(ProgressServiceError::from)?;
            let sub_lecture = SubLectureId::new(sub_lecture).map_err(ProgressServiceError::from)?;
            let pct = progress
                .update_lecture_progress(&user, &course, &lecture, &sub_lecture, completed)
                .await?;
            json!({ "progressPercentage": pct })
        }
        Command::Complete { user, course } => {
            let (user, course) = ids(&user, &course)?;
            serde_json::to_value(progress.mark_as_completed(&user, &course).await?)?
        }
        Command::Incomplete { user, course } => {
            let (user, course) = ids(&user, &course)?;
            serde_json::to_value(progress.mark_as_in_completed(&user, &course).await?)?
        }
        Command::Clear { user, course } => {
            let (user, course) = ids(&user, &course)?;
            json!({ "removed": progress.clear_course_progress(&user, &course).await? })
        }
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("progress=info,services=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_optional_completed_flag() {
        let cli = Cli::try_parse_from([
            "progress",
            "--catalog",
            "catalog.json",
            "update",
            "--user",
            "u1",
            "--course",
            "c1",
            "--lecture",
            "A",
            "--sub-lecture",
            "a1",
            "--completed",
            "false",
        ])
        .unwrap();
        match cli.command {
            Command::Update { completed, .. } => assert_eq!(completed, Some(false)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn malformed_ids_exit_with_invalid_argument_status() {
        let err = AppError::from(ids("bad id", "c1").unwrap_err());
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn runs_a_command_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = dir.path().join("catalog.json");
        std::fs::write(
            &catalog,
            r#"{ "courses": [ { "id": "c1", "lectures": [
                { "id": "A", "subLectures": ["a1", "a2"] }, { "id": "B" } ] } ] }"#,
        )
        .unwrap();
        let db = format!("sqlite://{}", dir.path().join("p.sqlite3").display());
        let base = ["progress", "--db", db.as_str(), "--catalog", catalog.to_str().unwrap()];

        let update = Cli::try_parse_from(base.iter().copied().chain([
            "update",
            "--user",
            "u1",
            "--course",
            "c1",
            "--lecture",
            "A",
            "--sub-lecture",
            "a1",
        ]))
        .unwrap();
        let out = run(update).await.unwrap();
        assert_eq!(out["progressPercentage"], 33);

        let missing = Cli::try_parse_from(
            base.iter()
                .copied()
                .chain(["get", "--user", "u1", "--course", "nope"]),
        )
        .unwrap();
        let err = run(missing).await.unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
