use std::collections::BTreeMap;
use ndarray::Array2;
use crate::bank::{
    check_new_id, check_rename, find_matrix, free_identifier, MatrixBank, MatrixData, MatrixInfo,
    MatrixKind, Scenario, ValueType, DEFAULT_MAX_MATRICES,
};
use crate::error::{ConvertError, Result};
use crate::omx::{MatrixInterchange, OmxArray};

/// In-memory bank following the same lookup and uniqueness rules as `Emmebank`
#[derive(Default)]
pub struct FakeBank {
    scenarios: Vec<Scenario>,
    matrices: Vec<MatrixInfo>,
    data: BTreeMap<String, MatrixData>,
}

impl FakeBank {

    pub fn add_scenario(&mut self, id:&str, zones:&[i64]) {
        self.scenarios.push(Scenario { id: id.to_string(), title: String::new(), zones: zones.to_vec() });
    }

    /// register a matrix and its payload in one go
    pub fn add_matrix(&mut self, id:&str, name:&str, data:MatrixData) {
        let kind = MatrixKind::from_id(id).unwrap();
        self.matrices.push(MatrixInfo {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            value_type: data.value_type(),
            description: String::new(),
        });
        self.data.insert(id.to_string(),data);
    }

    pub fn data(&self, name:&str) -> Option<&MatrixData> {
        let info = find_matrix(&self.matrices,name)?;
        self.data.get(&info.id)
    }

}

impl MatrixBank for FakeBank {

    fn scenarios(&self) -> Vec<Scenario> {
        self.scenarios.clone()
    }

    fn scenario(&self, id:&str) -> Option<Scenario> {
        self.scenarios.iter().find(|s| s.id == id).cloned()
    }

    fn matrices(&self) -> Vec<MatrixInfo> {
        self.matrices.clone()
    }

    fn matrix(&self, name_or_id:&str) -> Option<MatrixInfo> {
        find_matrix(&self.matrices,name_or_id).cloned()
    }

    fn available_identifier_excluding(&self, kind:MatrixKind, reserved:&[String]) -> Result<String> {
        free_identifier(&self.matrices,kind,DEFAULT_MAX_MATRICES,reserved)
    }

    fn create_matrix(&mut self, id:&str) -> Result<MatrixInfo> {
        let kind = check_new_id(&self.matrices,id,DEFAULT_MAX_MATRICES)?;
        let info = MatrixInfo { id: id.to_string(), name: String::new(), kind, value_type: ValueType::Float, description: String::new() };
        self.matrices.push(info.clone());
        Ok(info)
    }

    fn rename_matrix(&mut self, id:&str, name:&str) -> Result<()> {
        check_rename(&self.matrices,id,name)?;
        let m = self.matrices.iter_mut().find(|m| m.id == id)
            .ok_or_else(|| ConvertError::MatrixNotFound(id.to_string()))?;
        m.name = name.to_string();
        Ok(())
    }

    fn get_data(&self, id:&str, scenario:&Scenario) -> Result<MatrixData> {
        let info = self.matrix(id).ok_or_else(|| ConvertError::MatrixNotFound(id.to_string()))?;
        Ok(self.data.get(&info.id).cloned()
            .unwrap_or_else(|| MatrixData::Float(Array2::zeros(info.kind.shape(scenario.zones.len())))))
    }

    fn set_data(&mut self, id:&str, _scenario:&Scenario, data:MatrixData) -> Result<()> {
        let info = self.matrix(id).ok_or_else(|| ConvertError::MatrixNotFound(id.to_string()))?;
        self.data.insert(info.id,data);
        Ok(())
    }

}

/// In-memory interchange file
#[derive(Default)]
pub struct FakeOmx {
    pub mappings: BTreeMap<String, Vec<i64>>,
    pub matrices: BTreeMap<String, OmxArray>,
}

impl MatrixInterchange for FakeOmx {

    fn create_mapping(&mut self, label:&str, zones:&[i64]) -> Result<()> {
        self.mappings.insert(label.to_string(),zones.to_vec());
        Ok(())
    }

    fn mapping(&self, label:&str) -> Option<Vec<i64>> {
        self.mappings.get(label).cloned()
    }

    fn list_matrices(&self) -> Vec<String> {
        self.matrices.keys().cloned().collect()
    }

    fn read_matrix(&mut self, name:&str) -> Result<OmxArray> {
        self.matrices.get(name).cloned().ok_or_else(|| ConvertError::MatrixNotFound(name.to_string()))
    }

    fn write_matrix(&mut self, name:&str, array:OmxArray) -> Result<()> {
        self.matrices.insert(name.to_string(),array);
        Ok(())
    }

}
