//! JSON catalog file consumed by the CLI.
//!
//! ```json
//! { "courses": [
//!     { "id": "rust-101",
//!       "lectures": [ { "id": "A", "subLectures": ["a1", "a2"] }, { "id": "B" } ] }
//! ] }
//! ```

use std::path::Path;

use progress_core::model::{CourseId, CourseShape, LectureId, LectureShape, SubLectureId};
use services::InMemoryCatalog;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogFileError {
    #[error("cannot read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed catalog: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid catalog: {0}")]
    Shape(#[from] progress_core::Error),
}

#[derive(Debug, Deserialize)]
struct CatalogDoc {
    courses: Vec<CourseDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseDoc {
    id: CourseId,
    #[serde(default)]
    lectures: Vec<LectureDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LectureDoc {
    id: LectureId,
    #[serde(default)]
    sub_lectures: Vec<SubLectureId>,
}

/// Parses catalog JSON into validated course shapes.
///
/// # Errors
///
/// Returns `CatalogFileError::Json` for malformed JSON or IDs, and
/// `CatalogFileError::Shape` for duplicate lecture or sub-lecture IDs.
pub fn parse_catalog(json: &str) -> Result<Vec<CourseShape>, CatalogFileError> {
    let doc: CatalogDoc = serde_json::from_str(json)?;
    let mut shapes = Vec::with_capacity(doc.courses.len());
    for course in doc.courses {
        let lectures = course
            .lectures
            .into_iter()
            .map(|l| LectureShape::new(l.id, l.sub_lectures))
            .collect::<Result<Vec<_>, _>>()
            .map_err(progress_core::Error::from)?;
        shapes.push(CourseShape::new(course.id, lectures).map_err(progress_core::Error::from)?);
    }
    Ok(shapes)
}

/// Loads a catalog file into an in-memory resolver.
///
/// # Errors
///
/// Returns `CatalogFileError::Io` if the file cannot be read, otherwise as
/// [`parse_catalog`].
pub fn load_catalog(path: &Path) -> Result<InMemoryCatalog, CatalogFileError> {
    let json = std::fs::read_to_string(path).map_err(|source| CatalogFileError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(InMemoryCatalog::from_shapes(parse_catalog(&json)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use services::CatalogShapeResolver;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "courses": [
            { "id": "rust-101",
              "lectures": [
                { "id": "A", "subLectures": ["a1", "a2"] },
                { "id": "B" }
              ] }
        ]
    }"#;

    #[test]
    fn parses_lectures_without_sub_lectures() {
        let shapes = parse_catalog(SAMPLE).unwrap();
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].total_units(), 3);
        assert!(shapes[0].lectures()[1].sub_lectures().is_empty());
    }

    #[test]
    fn rejects_duplicate_sub_lectures() {
        let json = r#"{ "courses": [ { "id": "c", "lectures": [
            { "id": "A", "subLectures": ["x", "x"] } ] } ] }"#;
        assert!(matches!(
            parse_catalog(json),
            Err(CatalogFileError::Shape(_))
        ));
    }

    #[test]
    fn rejects_malformed_ids() {
        let json = r#"{ "courses": [ { "id": "has space" } ] }"#;
        assert!(matches!(parse_catalog(json), Err(CatalogFileError::Json(_))));
    }

    #[tokio::test]
    async fn loads_catalog_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let catalog = load_catalog(file.path()).unwrap();
        let shape = catalog
            .shape_of(&CourseId::new("rust-101").unwrap())
            .await
            .unwrap();
        assert!(shape.is_some());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            load_catalog(Path::new("/definitely/not/here.json")),
            Err(CatalogFileError::Io { .. })
        ));
    }
}
