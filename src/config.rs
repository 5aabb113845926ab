use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;
use crate::error::Result;
use crate::shape::ShapePolicy;
use crate::zones::ScenarioSelector;

/// substring that marks an input path as an emmebank
pub const BANK_PATH_MARKER:&str = "emmebank";


#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Direction {
    /// emmebank to interchange file
    BankToOmx,
    /// interchange file to emmebank
    OmxToBank,
}

impl Direction {
    pub fn detect(input:&Path) -> Direction {
        if input.to_string_lossy().contains(BANK_PATH_MARKER) {
            Direction::BankToOmx
        } else {
            Direction::OmxToBank
        }
    }
}

/// everything one conversion call needs
#[derive(Clone,Debug)]
pub struct ConvertConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub scenario: ScenarioSelector,
    /// restricts the transfer to these matrices, in this order
    pub matrix_list: Option<Vec<String>>,
    pub shape_policy: ShapePolicy,
}

impl ConvertConfig {

    pub fn direction(&self) -> Direction {
        Direction::detect(&self.input)
    }

}

/// read a json array of matrix names
pub fn read_matrix_list(file:impl AsRef<Path>) -> Result<Vec<String>> {
    let f = File::open(file.as_ref())?;
    let names:Vec<String> = serde_json::from_reader(BufReader::new(f))?;
    debug!("{} matrices listed in {}",names.len(),file.as_ref().display());
    Ok(names)
}
