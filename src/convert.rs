use std::path::Path;
use tracing::info;
use crate::bank::{BankMode, Emmebank};
use crate::config::{ConvertConfig, Direction};
use crate::error::Result;
use crate::omx::{OmxFile, OmxMode};
use crate::shape::ShapePolicy;
use crate::transfer::{export_all, import_all, TransferSummary};
use crate::zones::{resolve, ScenarioSelector};

/// One conversion call. Both stores are opened here and released on every path.
pub fn run(config:&ConvertConfig) -> Result<TransferSummary> {
    let names = config.matrix_list.as_deref();
    let summary = match config.direction() {
        Direction::BankToOmx => emme_to_omx(&config.input,&config.output,&config.scenario,names,config.shape_policy)?,
        Direction::OmxToBank => omx_to_emme(&config.input,&config.output,&config.scenario,names,config.shape_policy)?,
    };
    info!("matrices converted! {} transferred, {} skipped",summary.transferred,summary.skipped);
    Ok(summary)
}

/// export FULL matrices of an emmebank into a new interchange file
pub fn emme_to_omx(
    emmebank:impl AsRef<Path>,
    omx_file:impl AsRef<Path>,
    scenario:&ScenarioSelector,
    names:Option<&[String]>,
    policy:ShapePolicy,
) -> Result<TransferSummary> {
    let bank = Emmebank::open(emmebank,BankMode::Read)?;
    let zones = resolve(&bank,scenario)?;
    let mut omx = OmxFile::open(omx_file,OmxMode::Write)?;
    zones.register(&mut omx)?;
    let summary = export_all(&bank,&mut omx,&zones,names,policy)?;
    omx.close()?;
    bank.dispose();
    Ok(summary)
}

/// import interchange matrices into an existing emmebank
pub fn omx_to_emme(
    omx_file:impl AsRef<Path>,
    emmebank:impl AsRef<Path>,
    scenario:&ScenarioSelector,
    names:Option<&[String]>,
    policy:ShapePolicy,
) -> Result<TransferSummary> {
    let mut bank = Emmebank::open(emmebank,BankMode::Write)?;
    let zones = resolve(&bank,scenario)?;
    let mut omx = OmxFile::open(omx_file,OmxMode::Read)?;
    let summary = import_all(&mut omx,&mut bank,&zones,names,policy)?;
    omx.close()?;
    bank.dispose();
    Ok(summary)
}
