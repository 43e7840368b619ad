use std::str::FromStr;

use progress_core::model::IdError;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn id_from_str<T>(field: &'static str, raw: &str) -> Result<T, StorageError>
where
    T: FromStr<Err = IdError>,
{
    raw.parse::<T>()
        .map_err(|e| StorageError::Serialization(format!("invalid {field}: {e}")))
}

pub(crate) fn version_to_i64(version: u64) -> Result<i64, StorageError> {
    i64::try_from(version).map_err(|_| StorageError::Serialization("version overflow".into()))
}

pub(crate) fn version_from_i64(v: i64) -> Result<u64, StorageError> {
    match u64::try_from(v) {
        Ok(version) if version > 0 => Ok(version),
        _ => Err(StorageError::Serialization(format!("invalid version: {v}"))),
    }
}

pub(crate) fn position_to_i64(position: usize) -> Result<i64, StorageError> {
    i64::try_from(position).map_err(|_| StorageError::Serialization("position overflow".into()))
}

pub(crate) fn bool_to_i64(flag: bool) -> i64 {
    i64::from(flag)
}

pub(crate) fn bool_from_i64(field: &'static str, v: i64) -> Result<bool, StorageError> {
    match v {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StorageError::Serialization(format!(
            "invalid {field}: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use progress_core::model::LectureId;

    #[test]
    fn rejects_zero_and_negative_versions() {
        assert!(version_from_i64(0).is_err());
        assert!(version_from_i64(-3).is_err());
        assert_eq!(version_from_i64(7).unwrap(), 7);
    }

    #[test]
    fn rejects_non_boolean_flags() {
        assert!(bool_from_i64("viewed", 2).is_err());
        assert!(bool_from_i64("viewed", 1).unwrap());
    }

    #[test]
    fn surfaces_corrupt_ids_as_serialization_errors() {
        let err = id_from_str::<LectureId>("lecture_id", "").unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }
}
