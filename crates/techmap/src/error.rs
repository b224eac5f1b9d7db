//! Error types and result alias for the crate.
//!
//! This module defines [`enum@crate::error::Error`] and the crate-wide [Result] alias. Variants cover
//! invalid configuration, unusable input or output files, malformed or unreadable containers, worker
//! failures, IO, and generic errors. Non-fatal conditions are reported as
//! [`crate::events::TechMapEvent::Warning`] instead.
use std::path::PathBuf;

use thiserror::Error;

use crate::container::DType;

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("file input error: {0}")]
    FileInput(String),

    #[error("dataset '{name}' not found in '{}'", path.display())]
    MissingDataset { path: PathBuf, name: String },

    #[error("malformed container '{}': {message}", path.display())]
    Format { path: PathBuf, message: String },

    #[error("storage error in '{}': {message}", path.display())]
    Storage { path: PathBuf, message: String },

    #[error("dataset '{name}' has dtype {found}, expected {expected}")]
    DTypeMismatch {
        name: String,
        expected: DType,
        found: DType,
    },

    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    #[error("worker failure: {0}")]
    Worker(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::Other(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_string_uses_other_variant() {
        let err: Error = String::from("boom").into();
        matches!(err, Error::Other(_))
            .then_some(())
            .expect("expected Other variant");
    }

    #[test]
    fn from_str_allocates_owned_message() {
        let err: Error = "issue".into();
        assert!(matches!(err, Error::Other(ref msg) if msg == "issue"));
    }

    #[test]
    fn missing_dataset_message_names_file_and_dataset() {
        let err = Error::MissingDataset {
            path: PathBuf::from("/tmp/map.tmap"),
            name: "res_map".into(),
        };
        assert_eq!(
            err.to_string(),
            "dataset 'res_map' not found in '/tmp/map.tmap'"
        );
    }

    #[test]
    fn dtype_mismatch_message_lists_both_types() {
        let err = Error::DTypeMismatch {
            name: "latitude".into(),
            expected: DType::F32,
            found: DType::I32,
        };
        assert_eq!(
            err.to_string(),
            "dataset 'latitude' has dtype i32, expected f32"
        );
    }
}
