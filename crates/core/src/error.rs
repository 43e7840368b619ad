use thiserror::Error;

use crate::model::{IdError, ProgressError, ShapeError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Id(#[from] IdError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}
