use std::path::PathBuf;
use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;
use emme_omx::config::{read_matrix_list, ConvertConfig};
use emme_omx::convert;
use emme_omx::error::ConvertError;
use emme_omx::shape::ShapePolicy;
use emme_omx::zones::ScenarioSelector;

/// Convert matrices between an emmebank and an OMX file.
/// The direction follows from the input path: a path containing "emmebank" is exported to OMX,
/// anything else is read as an OMX file and imported into the emmebank given as output.
#[derive(Parser, Debug)]
struct Args {
    /// emmebank directory or OMX file to read
    input_path: PathBuf,
    /// OMX file or emmebank directory to write
    output_path: PathBuf,
    /// scenario that supplies the zone numbering. Leave blank ("") for the first scenario
    scenario_id: String,
    /// json file holding a list of matrix names to convert
    matrix_list_file: Option<PathBuf>,

    /// truncate or zero-pad matrices whose shape does not match the zone count instead of failing
    #[clap(long)]
    resize: bool,

    /// more logging (-v debug, -vv trace)
    #[clap(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn into_config(self) -> Result<ConvertConfig, ConvertError> {
        let matrix_list = self.matrix_list_file.map(read_matrix_list).transpose()?;
        Ok(ConvertConfig {
            input: self.input_path,
            output: self.output_path,
            scenario: ScenarioSelector::parse(&self.scenario_id),
            matrix_list,
            shape_policy: if self.resize { ShapePolicy::Resize } else { ShapePolicy::Strict },
        })
    }
}

fn main() -> Result<(), ConvertError> {

    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match args.verbose {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = args.into_config()?;
    convert::run(&config)?;

    Ok(())

}
