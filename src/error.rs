use std::path::PathBuf;
use thiserror::Error;
use ndarray_npy::{ReadNpyError, ReadNpzError, WriteNpyError, WriteNpzError};
use crate::bank::MatrixKind;

pub type Result<T> = std::result::Result<T, ConvertError>;

#[derive(Debug, Error)]
pub enum ConvertError {
    /// missing or invalid scenario, missing zone numbers. Raised before any matrix moves.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("matrix '{0}' not found")]
    MatrixNotFound(String),

    #[error("matrix '{name}' is {kind} type, only FULL matrices can be transferred")]
    KindMismatch { name: String, kind: MatrixKind },

    #[error("invalid matrix identifier '{0}'")]
    InvalidMatrixId(String),

    #[error("matrix identifier '{0}' is already in use")]
    MatrixExists(String),

    #[error("matrix name '{0}' is already in use")]
    DuplicateName(String),

    #[error("no free {0} matrix identifier left in the emmebank")]
    BankFull(MatrixKind),

    #[error("matrix '{name}' has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        found: Vec<usize>,
        expected: Vec<usize>,
    },

    #[error("emmebank at {} is locked by another writer", .0.display())]
    BankLocked(PathBuf),

    #[error("interchange file was opened read-only")]
    ReadOnly,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("emmebank manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    ReadNpy(#[from] ReadNpyError),

    #[error(transparent)]
    WriteNpy(#[from] WriteNpyError),

    #[error(transparent)]
    ReadNpz(#[from] ReadNpzError),

    #[error(transparent)]
    WriteNpz(#[from] WriteNpzError),
}
