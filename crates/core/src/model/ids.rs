use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest identifier accepted from callers or the catalog.
pub const MAX_ID_LEN: usize = 64;

/// Reasons an identifier is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IdError {
    #[error("{kind} cannot be empty")]
    Empty { kind: &'static str },

    #[error("{kind} is longer than {max} bytes", max = MAX_ID_LEN)]
    TooLong { kind: &'static str },

    #[error("{kind} contains invalid character {ch:?}")]
    InvalidChar { kind: &'static str, ch: char },
}

fn validate(kind: &'static str, raw: &str) -> Result<(), IdError> {
    if raw.is_empty() {
        return Err(IdError::Empty { kind });
    }
    if raw.len() > MAX_ID_LEN {
        return Err(IdError::TooLong { kind });
    }
    match raw
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        Some(ch) => Err(IdError::InvalidChar { kind, ch }),
        None => Ok(()),
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Validates and wraps a raw identifier.
            ///
            /// # Errors
            ///
            /// Returns `IdError` if the identifier is empty, too long, or
            /// contains characters outside `[A-Za-z0-9_-]`.
            pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
                let raw = raw.into();
                validate(stringify!($name), &raw)?;
                Ok(Self(raw))
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

string_id!(
    /// Identifies the learner whose progress is tracked.
    UserId
);
string_id!(
    /// Identifies a course in the catalog.
    CourseId
);
string_id!(
    /// Identifies a lecture within a course.
    LectureId
);
string_id!(
    /// Identifies a sub-lecture within a lecture.
    SubLectureId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_object_id_style_strings() {
        let id: CourseId = "65f1c2a9e4b0a1d2c3e4f5a6".parse().unwrap();
        assert_eq!(id.as_str(), "65f1c2a9e4b0a1d2c3e4f5a6");
        assert_eq!(id.to_string(), "65f1c2a9e4b0a1d2c3e4f5a6");
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(
            UserId::new(""),
            Err(IdError::Empty { kind: "UserId" })
        );
    }

    #[test]
    fn rejects_too_long() {
        let raw = "a".repeat(MAX_ID_LEN + 1);
        assert_eq!(
            LectureId::new(raw),
            Err(IdError::TooLong { kind: "LectureId" })
        );
        assert!(LectureId::new("a".repeat(MAX_ID_LEN)).is_ok());
    }

    #[test]
    fn rejects_path_characters() {
        let err = "lec/../1".parse::<SubLectureId>().unwrap_err();
        assert_eq!(
            err,
            IdError::InvalidChar {
                kind: "SubLectureId",
                ch: '/'
            }
        );
    }

    #[test]
    fn debug_names_the_kind() {
        let id = UserId::new("u-1").unwrap();
        assert_eq!(format!("{id:?}"), "UserId(u-1)");
    }

    #[test]
    fn deserialize_validates() {
        let ok: CourseId = serde_json::from_str("\"course_1\"").unwrap();
        assert_eq!(ok.as_str(), "course_1");
        assert!(serde_json::from_str::<CourseId>("\"\"").is_err());
    }
}
