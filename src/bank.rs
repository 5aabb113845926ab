use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use ndarray::Array2;
use ndarray_npy::{read_npy, write_npy};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use crate::error::{ConvertError, Result};


pub const MANIFEST_FILE:&str = "emmebank.json";
pub const LOCK_FILE:&str = "emmebank.lock";
pub const MATRIX_DIR:&str = "matrices";

/// default number of identifiers per matrix kind
pub const DEFAULT_MAX_MATRICES:usize = 99;

#[derive(Clone,Copy,Debug,PartialEq,Eq,Hash,Serialize,Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatrixKind {
    Full,
    Origin,
    Destination,
    Scalar,
}

impl MatrixKind {

    pub fn prefix(&self) -> &'static str {
        match self {
            MatrixKind::Full => "mf",
            MatrixKind::Origin => "mo",
            MatrixKind::Destination => "md",
            MatrixKind::Scalar => "ms",
        }
    }

    pub fn id(&self, number:usize) -> String {
        format!("{}{number}",self.prefix())
    }

    /// the kind encoded in a matrix identifier such as `mf12`
    pub fn from_id(id:&str) -> Option<MatrixKind> {
        Self::parse_id(id).map(|(kind,_)| kind)
    }

    fn parse_id(id:&str) -> Option<(MatrixKind, usize)> {
        let kind = [MatrixKind::Full,MatrixKind::Origin,MatrixKind::Destination,MatrixKind::Scalar]
            .into_iter()
            .find(|k| id.starts_with(k.prefix()))?;
        let digits = &id[2..];
        // canonical form only, so `mf01` or `mf+1` never alias `mf1`
        if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let number:usize = digits.parse().ok()?;
        Some((kind,number))
    }

    /// payload shape for a scenario with `n_zones` zones
    pub fn shape(&self, n_zones:usize) -> (usize, usize) {
        match self {
            MatrixKind::Full => (n_zones,n_zones),
            MatrixKind::Origin => (n_zones,1),
            MatrixKind::Destination => (1,n_zones),
            MatrixKind::Scalar => (1,1),
        }
    }

}

impl fmt::Display for MatrixKind {
    fn fmt(&self, f:&mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatrixKind::Full => "FULL",
            MatrixKind::Origin => "ORIGIN",
            MatrixKind::Destination => "DESTINATION",
            MatrixKind::Scalar => "SCALAR",
        };
        f.write_str(s)
    }
}

#[derive(Clone,Copy,Debug,Default,PartialEq,Eq,Serialize,Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    Float,
    Int,
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct Scenario {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// zone numbers in matrix index order
    pub zones: Vec<i64>,
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct MatrixInfo {
    pub id: String,
    pub name: String,
    pub kind: MatrixKind,
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub description: String,
}

/// row-major matrix payload
#[derive(Clone,Debug,PartialEq)]
pub enum MatrixData {
    Float(Array2<f64>),
    Int(Array2<i64>),
}

impl MatrixData {

    pub fn shape(&self) -> &[usize] {
        match self {
            MatrixData::Float(a) => a.shape(),
            MatrixData::Int(a) => a.shape(),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            MatrixData::Float(_) => ValueType::Float,
            MatrixData::Int(_) => ValueType::Int,
        }
    }

}

/// Store operations the transfer pipeline relies on.
pub trait MatrixBank {
    /// scenarios in enumeration order
    fn scenarios(&self) -> Vec<Scenario>;
    fn scenario(&self, id:&str) -> Option<Scenario>;
    /// matrices in registry order
    fn matrices(&self) -> Vec<MatrixInfo>;
    /// look up a matrix by name, then by identifier
    fn matrix(&self, name_or_id:&str) -> Option<MatrixInfo>;
    /// lowest identifier of `kind` that is neither in use as an identifier or name nor listed in `reserved`
    fn available_identifier_excluding(&self, kind:MatrixKind, reserved:&[String]) -> Result<String>;
    /// lowest identifier of `kind` not in use as an identifier or name
    fn available_matrix_identifier(&self, kind:MatrixKind) -> Result<String> {
        self.available_identifier_excluding(kind,&[])
    }
    /// register a new, unnamed matrix. The kind follows from the identifier,
    /// which must not already be a matrix identifier or name.
    fn create_matrix(&mut self, id:&str) -> Result<MatrixInfo>;
    /// names are unique and may not be another matrix's identifier
    fn rename_matrix(&mut self, id:&str, name:&str) -> Result<()>;
    fn get_data(&self, id:&str, scenario:&Scenario) -> Result<MatrixData>;
    fn set_data(&mut self, id:&str, scenario:&Scenario, data:MatrixData) -> Result<()>;
}

/// name lookup first, identifier second
pub(crate) fn find_matrix<'a>(matrices:&'a [MatrixInfo], name_or_id:&str) -> Option<&'a MatrixInfo> {
    matrices.iter().find(|m| m.name == name_or_id)
        .or_else(|| matrices.iter().find(|m| m.id == name_or_id))
}

/// true when `key` is some matrix's identifier or name
pub(crate) fn key_in_use(matrices:&[MatrixInfo], key:&str) -> bool {
    matrices.iter().any(|m| m.id == key || m.name == key)
}

pub(crate) fn free_identifier(matrices:&[MatrixInfo], kind:MatrixKind, max_matrices:usize, reserved:&[String]) -> Result<String> {
    (1..=max_matrices)
        .map(|n| kind.id(n))
        .find(|id| !key_in_use(matrices,id) && !reserved.contains(id))
        .ok_or(ConvertError::BankFull(kind))
}

/// validate a new identifier against the registry, returning its kind
pub(crate) fn check_new_id(matrices:&[MatrixInfo], id:&str, max_matrices:usize) -> Result<MatrixKind> {
    let (kind,number) = MatrixKind::parse_id(id)
        .ok_or_else(|| ConvertError::InvalidMatrixId(id.to_string()))?;
    if number > max_matrices {
        return Err(ConvertError::InvalidMatrixId(id.to_string()));
    }
    if key_in_use(matrices,id) {
        return Err(ConvertError::MatrixExists(id.to_string()));
    }
    Ok(kind)
}

pub(crate) fn check_rename(matrices:&[MatrixInfo], id:&str, name:&str) -> Result<()> {
    if matrices.iter().any(|m| m.id != id && (m.name == name || m.id == name)) {
        return Err(ConvertError::DuplicateName(name.to_string()));
    }
    Ok(())
}

#[derive(Clone,Debug,Serialize,Deserialize)]
struct Manifest {
    title: String,
    #[serde(default = "default_max_matrices")]
    max_matrices: usize,
    scenarios: Vec<Scenario>,
    #[serde(default)]
    matrices: Vec<MatrixInfo>,
}

fn default_max_matrices() -> usize {
    DEFAULT_MAX_MATRICES
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum BankMode {
    /// shared access, refused while a writer holds the bank
    Read,
    /// exclusive access, holds the lock file until disposed
    Write,
}

/// lock file removed when dropped
#[derive(Debug)]
struct BankLock {
    path: PathBuf,
}

impl BankLock {
    fn acquire(dir:&Path) -> Result<BankLock> {
        let path = dir.join(LOCK_FILE);
        match File::options().write(true).create_new(true).open(&path) {
            Ok(mut f) => {
                writeln!(f,"{}",std::process::id())?;
                debug!("acquired {}",path.display());
                Ok(BankLock { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(ConvertError::BankLocked(dir.to_path_buf())),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for BankLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("failed to release emmebank lock {}: {e}",self.path.display());
        }
    }
}

/// Directory-backed matrix bank: a json manifest (`emmebank.json`) and one `.npy` payload per
/// matrix under `matrices/`.
/// Every mutation is written through to disk immediately, so work done before a failure persists.
#[derive(Debug)]
pub struct Emmebank {
    dir: PathBuf,
    manifest: Manifest,
    _lock: Option<BankLock>,
}

impl Emmebank {

    /// initialize an empty bank in `dir` and return it opened for writing
    pub fn create(dir:impl AsRef<Path>, title:&str, scenarios:Vec<Scenario>) -> Result<Emmebank> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir.join(MATRIX_DIR))?;
        let lock = BankLock::acquire(dir)?;
        let bank = Emmebank {
            dir: dir.to_path_buf(),
            manifest: Manifest {
                title: title.to_string(),
                max_matrices: DEFAULT_MAX_MATRICES,
                scenarios,
                matrices: vec![],
            },
            _lock: Some(lock),
        };
        bank.save_manifest()?;
        Ok(bank)
    }

    pub fn open(dir:impl AsRef<Path>, mode:BankMode) -> Result<Emmebank> {
        let dir = dir.as_ref();
        let lock = match mode {
            BankMode::Write => Some(BankLock::acquire(dir)?),
            BankMode::Read => {
                if dir.join(LOCK_FILE).exists() {
                    return Err(ConvertError::BankLocked(dir.to_path_buf()));
                }
                None
            }
        };
        let f = File::open(dir.join(MANIFEST_FILE))?;
        let manifest:Manifest = serde_json::from_reader(BufReader::new(f))?;
        debug!("opened emmebank '{}' ({} scenarios, {} matrices)",manifest.title,manifest.scenarios.len(),manifest.matrices.len());
        Ok(Emmebank {
            dir: dir.to_path_buf(),
            manifest,
            _lock: lock,
        })
    }

    /// release the bank. The write lock is also released on drop.
    pub fn dispose(self) {
        debug!("disposing emmebank {}",self.dir.display());
    }

    pub fn title(&self) -> &str {
        &self.manifest.title
    }

    fn payload_path(&self, id:&str) -> PathBuf {
        self.dir.join(MATRIX_DIR).join(id).with_extension("npy")
    }

    fn save_manifest(&self) -> Result<()> {
        let tmp = self.dir.join(MANIFEST_FILE).with_extension("json.tmp");
        {
            let mut w = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut w,&self.manifest)?;
            w.flush()?;
        }
        fs::rename(tmp,self.dir.join(MANIFEST_FILE))?;
        Ok(())
    }

    fn entry_mut(&mut self, id:&str) -> Result<&mut MatrixInfo> {
        self.manifest.matrices.iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| ConvertError::MatrixNotFound(id.to_string()))
    }

}

impl MatrixBank for Emmebank {

    fn scenarios(&self) -> Vec<Scenario> {
        self.manifest.scenarios.clone()
    }

    fn scenario(&self, id:&str) -> Option<Scenario> {
        self.manifest.scenarios.iter().find(|s| s.id == id).cloned()
    }

    fn matrices(&self) -> Vec<MatrixInfo> {
        self.manifest.matrices.clone()
    }

    fn matrix(&self, name_or_id:&str) -> Option<MatrixInfo> {
        find_matrix(&self.manifest.matrices,name_or_id).cloned()
    }

    fn available_identifier_excluding(&self, kind:MatrixKind, reserved:&[String]) -> Result<String> {
        free_identifier(&self.manifest.matrices,kind,self.manifest.max_matrices,reserved)
    }

    fn create_matrix(&mut self, id:&str) -> Result<MatrixInfo> {
        let kind = check_new_id(&self.manifest.matrices,id,self.manifest.max_matrices)?;
        let info = MatrixInfo {
            id: id.to_string(),
            name: String::new(),
            kind,
            value_type: ValueType::Float,
            description: String::new(),
        };
        self.manifest.matrices.push(info.clone());
        self.save_manifest()?;
        debug!("created matrix {id}");
        Ok(info)
    }

    fn rename_matrix(&mut self, id:&str, name:&str) -> Result<()> {
        check_rename(&self.manifest.matrices,id,name)?;
        self.entry_mut(id)?.name = name.to_string();
        self.save_manifest()
    }

    fn get_data(&self, id:&str, scenario:&Scenario) -> Result<MatrixData> {
        let info = self.matrix(id).ok_or_else(|| ConvertError::MatrixNotFound(id.to_string()))?;
        let path = self.payload_path(&info.id);
        if !path.exists() {
            return Ok(MatrixData::Float(Array2::zeros(info.kind.shape(scenario.zones.len()))));
        }
        let data = match info.value_type {
            ValueType::Float => MatrixData::Float(read_npy(&path)?),
            ValueType::Int => MatrixData::Int(read_npy(&path)?),
        };
        Ok(data)
    }

    fn set_data(&mut self, id:&str, scenario:&Scenario, data:MatrixData) -> Result<()> {
        let info = self.matrix(id).ok_or_else(|| ConvertError::MatrixNotFound(id.to_string()))?;
        let (rows,cols) = info.kind.shape(scenario.zones.len());
        if data.shape() != [rows,cols] {
            return Err(ConvertError::ShapeMismatch {
                name: info.name,
                found: data.shape().to_vec(),
                expected: vec![rows,cols],
            });
        }
        let path = self.payload_path(&info.id);
        match &data {
            MatrixData::Float(a) => write_npy(&path,a)?,
            MatrixData::Int(a) => write_npy(&path,a)?,
        }
        let value_type = data.value_type();
        let entry = self.entry_mut(&info.id)?;
        if entry.value_type != value_type {
            entry.value_type = value_type;
            self.save_manifest()?;
        }
        Ok(())
    }

}
