/*
    Conversion of square origin-destination matrices between an emmebank and an
    open matrix (OMX) interchange file, in either direction.
    Matrices are addressed by position in a scenario's zone numbering, which is
    resolved once per conversion and shared by every matrix moved.
 */
pub mod bank;
pub mod config;
pub mod convert;
pub mod error;
pub mod omx;
pub mod shape;
pub mod transfer;
pub mod zones;

#[cfg(test)]
mod testing;

pub use bank::{BankMode, Emmebank, MatrixBank, MatrixData, MatrixKind};
pub use config::{ConvertConfig, Direction};
pub use error::{ConvertError, Result};
pub use omx::{MatrixInterchange, OmxArray, OmxFile, OmxMode};
pub use shape::ShapePolicy;
pub use transfer::{export_all, import_all, TransferSummary};
pub use zones::{resolve, ScenarioSelector, ZoneIndex};
