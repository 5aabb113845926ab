use tracing::{info, warn};
use crate::bank::{MatrixBank, Scenario};
use crate::error::{ConvertError, Result};
use crate::omx::MatrixInterchange;

/// label of the zone mapping written to interchange files
pub const ZONE_MAPPING:&str = "taz";


/// which bank scenario supplies the zone numbering
#[derive(Clone,Debug,Default,PartialEq,Eq)]
pub enum ScenarioSelector {
    /// first scenario in enumeration order
    #[default]
    Default,
    ByKey(String),
}

impl ScenarioSelector {

    /// a blank key is not a usable scenario id and falls back to the default scenario
    pub fn parse(key:&str) -> ScenarioSelector {
        let key = key.trim();
        if key.is_empty() {
            warn!("blank scenario id; the first scenario is used by default");
            ScenarioSelector::Default
        } else {
            ScenarioSelector::ByKey(key.to_string())
        }
    }

}

impl From<Option<String>> for ScenarioSelector {
    fn from(key:Option<String>) -> Self {
        key.map_or(ScenarioSelector::Default,|k| ScenarioSelector::parse(&k))
    }
}

/// Zone numbering of one scenario. Position `i` labels row and column `i` of every transferred matrix.
#[derive(Clone,Debug,PartialEq)]
pub struct ZoneIndex {
    scenario: Scenario,
}

impl ZoneIndex {

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn zones(&self) -> &[i64] {
        &self.scenario.zones
    }

    /// matrix side length
    pub fn len(&self) -> usize {
        self.scenario.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenario.zones.is_empty()
    }

    /// write the zone numbers as the interchange file's zone mapping
    pub fn register(&self, omx:&mut impl MatrixInterchange) -> Result<()> {
        omx.create_mapping(ZONE_MAPPING,self.zones())
    }

}

/// resolve the zone numbering for a conversion. Fails before anything is transferred.
pub fn resolve(bank:&impl MatrixBank, selector:&ScenarioSelector) -> Result<ZoneIndex> {
    let scenario = match selector {
        ScenarioSelector::Default => bank.scenarios().into_iter().next()
            .ok_or_else(|| ConvertError::Config("emmebank has no scenarios".to_string()))?,
        ScenarioSelector::ByKey(key) => bank.scenario(key)
            .ok_or_else(|| ConvertError::Config(format!("scenario '{key}' not found; check the scenario id or leave it blank to use the first scenario")))?,
    };
    if scenario.zones.is_empty() {
        return Err(ConvertError::Config(format!("no zone numbers found for scenario '{}'",scenario.id)));
    }
    info!("using scenario '{}' with {} zones",scenario.id,scenario.zones.len());
    Ok(ZoneIndex { scenario })
}
