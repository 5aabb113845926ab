use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use ndarray::{Array1, ArrayD};
use ndarray_npy::{NpzReader, NpzWriter, ReadNpyError, ReadNpzError};
use num_traits::AsPrimitive;
use tracing::{debug, warn};
use crate::error::{ConvertError, Result};

#[cfg(test)]
mod tests {
    use ndarray::{array, IxDyn};
    use tempfile::tempdir;
    use super::*;

    #[test]
    fn write_then_read() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("skims.omx");

        let mut omx = OmxFile::open(&path,OmxMode::Write).unwrap();
        omx.create_mapping("taz",&[1,2,3]).unwrap();
        omx.write_matrix("time",OmxArray::Float64(array![[0.,1.5],[2.5,0.]].into_dyn())).unwrap();
        omx.write_matrix("trips",OmxArray::UInt16(array![[1u16,2],[3,65535]].into_dyn())).unwrap();
        // overwrite replaces the earlier entry
        omx.write_matrix("time",OmxArray::Float64(array![[0.,1.],[1.,0.]].into_dyn())).unwrap();
        omx.close().unwrap();

        let mut omx = OmxFile::open(&path,OmxMode::Read).unwrap();
        let mut names = omx.list_matrices();
        names.sort();
        assert_eq!(names,vec!["time".to_string(),"trips".to_string()]);
        assert_eq!(omx.mapping("taz"),Some(vec![1,2,3]));
        assert_eq!(omx.mapping("county"),None);
        match omx.read_matrix("trips").unwrap() {
            OmxArray::UInt16(a) => assert_eq!(a,array![[1u16,2],[3,65535]].into_dyn()),
            other => panic!("unexpected element type {other:?}"),
        }
        assert_eq!(omx.read_matrix("time").unwrap().to_f64(),array![[0.,1.],[1.,0.]].into_dyn());
        assert!(matches!(omx.read_matrix("dist"),Err(ConvertError::MatrixNotFound(_))));
    }

    #[test]
    fn read_only() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("empty.omx");
        OmxFile::open(&path,OmxMode::Write).unwrap().close().unwrap();
        let mut omx = OmxFile::open(&path,OmxMode::Read).unwrap();
        assert!(omx.list_matrices().is_empty());
        let a = OmxArray::Float64(ArrayD::zeros(IxDyn(&[1,1])));
        assert!(matches!(omx.write_matrix("x",a),Err(ConvertError::ReadOnly)));
        assert!(matches!(omx.create_mapping("taz",&[1]),Err(ConvertError::ReadOnly)));
    }

    #[test]
    fn unclosed_writer_flushes_on_drop() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("partial.omx");
        {
            let mut omx = OmxFile::open(&path,OmxMode::Write).unwrap();
            omx.write_matrix("mf1",OmxArray::Int32(array![[7]].into_dyn())).unwrap();
        }
        let mut omx = OmxFile::open(&path,OmxMode::Read).unwrap();
        assert_eq!(omx.read_matrix("mf1").unwrap().to_f64(),array![[7.]].into_dyn());
    }

    #[test]
    fn reads_narrow_integer_entries() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("counts.omx");
        {
            let mut npz = NpzWriter::new(File::create(&path).unwrap());
            npz.add_array("bytes",&array![[1u8,2],[3,255]]).unwrap();
            npz.add_array("shorts",&array![[-1i16,2],[3,4]]).unwrap();
            npz.add_array("wide",&array![[1u64,2],[3,4]]).unwrap();
            npz.finish().unwrap();
        }
        let mut omx = OmxFile::open(&path,OmxMode::Read).unwrap();
        assert_eq!(omx.read_matrix("bytes").unwrap(),OmxArray::UInt8(array![[1u8,2],[3,255]].into_dyn()));
        assert_eq!(omx.read_matrix("bytes").unwrap().to_f64(),array![[1.,2.],[3.,255.]].into_dyn());
        assert_eq!(omx.read_matrix("shorts").unwrap().to_f64(),array![[-1.,2.],[3.,4.]].into_dyn());
        assert_eq!(omx.read_matrix("wide").unwrap(),OmxArray::UInt64(array![[1u64,2],[3,4]].into_dyn()));
    }

    #[test]
    fn unsupported_element_type_is_reported() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("flags.omx");
        {
            let mut npz = NpzWriter::new(File::create(&path).unwrap());
            npz.add_array("mask",&array![[true,false],[false,true]]).unwrap();
            npz.finish().unwrap();
        }
        let mut omx = OmxFile::open(&path,OmxMode::Read).unwrap();
        let err = omx.read_matrix("mask").unwrap_err();
        assert!(matches!(err,ConvertError::ReadNpz(ReadNpzError::Npy(ReadNpyError::WrongDescriptor(_)))));
    }

    #[test]
    fn cast_to_f64() {
        let a = OmxArray::Float32(array![[0.5f32,2.]].into_dyn());
        assert_eq!(a.to_f64(),array![[0.5,2.]].into_dyn());
        assert_eq!(a.shape(),&[1,2]);
        assert_eq!(a.to_i64(),None);
        assert_eq!(OmxArray::Int32(array![-1,4].into_dyn()).to_i64(),Some(array![-1i64,4].into_dyn()));
    }

}

/// archive prefix of zone mapping entries
pub const LOOKUP_PREFIX:&str = "lookup/";

/// an interchange array of one of the supported element types
#[derive(Clone,Debug,PartialEq)]
pub enum OmxArray {
    Float64(ArrayD<f64>),
    Float32(ArrayD<f32>),
    Int64(ArrayD<i64>),
    Int32(ArrayD<i32>),
    Int16(ArrayD<i16>),
    Int8(ArrayD<i8>),
    UInt64(ArrayD<u64>),
    UInt32(ArrayD<u32>),
    UInt16(ArrayD<u16>),
    UInt8(ArrayD<u8>),
}

/// apply the same expression to the array of any variant
macro_rules! each_array {
    ($value:expr, $a:ident => $body:expr) => {
        match $value {
            OmxArray::Float64($a) => $body,
            OmxArray::Float32($a) => $body,
            OmxArray::Int64($a) => $body,
            OmxArray::Int32($a) => $body,
            OmxArray::Int16($a) => $body,
            OmxArray::Int8($a) => $body,
            OmxArray::UInt64($a) => $body,
            OmxArray::UInt32($a) => $body,
            OmxArray::UInt16($a) => $body,
            OmxArray::UInt8($a) => $body,
        }
    };
}

fn cast<T,U>(array:&ArrayD<T>) -> ArrayD<U>
where T:AsPrimitive<U>, U:Copy + 'static
{
    array.mapv(|v| v.as_())
}

impl OmxArray {

    pub fn shape(&self) -> &[usize] {
        each_array!(self, a => a.shape())
    }

    pub fn to_f64(&self) -> ArrayD<f64> {
        each_array!(self, a => cast(a))
    }

    /// integer arrays only
    pub fn to_i64(&self) -> Option<ArrayD<i64>> {
        match self {
            OmxArray::Float64(_) | OmxArray::Float32(_) => None,
            OmxArray::Int64(a) => Some(a.clone()),
            OmxArray::Int32(a) => Some(cast(a)),
            OmxArray::Int16(a) => Some(cast(a)),
            OmxArray::Int8(a) => Some(cast(a)),
            OmxArray::UInt64(a) => Some(cast(a)),
            OmxArray::UInt32(a) => Some(cast(a)),
            OmxArray::UInt16(a) => Some(cast(a)),
            OmxArray::UInt8(a) => Some(cast(a)),
        }
    }

}

/// Interchange file operations the transfer pipeline relies on.
pub trait MatrixInterchange {
    /// add or replace a zone mapping table
    fn create_mapping(&mut self, label:&str, zones:&[i64]) -> Result<()>;
    fn mapping(&self, label:&str) -> Option<Vec<i64>>;
    /// matrix names, mapping tables excluded
    fn list_matrices(&self) -> Vec<String>;
    fn read_matrix(&mut self, name:&str) -> Result<OmxArray>;
    /// add a matrix, replacing any matrix of the same name
    fn write_matrix(&mut self, name:&str, array:OmxArray) -> Result<()>;
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum OmxMode {
    Read,
    /// truncates the file. Contents are written on close.
    Write,
}

/// Interchange file stored as an `.npz` archive. Matrices are top-level entries,
/// zone mappings are 1-d `i64` entries under `lookup/<label>`.
pub struct OmxFile {
    path: PathBuf,
    mode: OmxMode,
    reader: Option<NpzReader<File>>,
    /// matrix name and its archive entry name, in archive order
    entries: Vec<(String, String)>,
    mappings: BTreeMap<String, Vec<i64>>,
    pending: BTreeMap<String, OmxArray>,
    dirty: bool,
}

/// archive entry name without the `.npy` suffix numpy adds
fn entry_name(raw:&str) -> &str {
    raw.strip_suffix(".npy").unwrap_or(raw)
}

/// try one element type; a descriptor mismatch moves on to the next, any other error is returned
macro_rules! try_read {
    ($reader:expr, $raw:expr, $variant:ident) => {
        match $reader.by_name($raw) {
            Ok(a) => return Ok(OmxArray::$variant(a)),
            Err(ReadNpzError::Npy(ReadNpyError::WrongDescriptor(_))) => {}
            Err(e) => return Err(e.into()),
        }
    };
}

/// read an archive entry as the element type named in its header
fn read_entry(reader:&mut NpzReader<File>, raw:&str) -> Result<OmxArray> {
    try_read!(reader, raw, Float64);
    try_read!(reader, raw, Float32);
    try_read!(reader, raw, Int64);
    try_read!(reader, raw, Int32);
    try_read!(reader, raw, Int16);
    try_read!(reader, raw, Int8);
    try_read!(reader, raw, UInt64);
    try_read!(reader, raw, UInt32);
    try_read!(reader, raw, UInt16);
    Ok(OmxArray::UInt8(reader.by_name(raw)?))
}

impl OmxFile {

    pub fn open(path:impl AsRef<Path>, mode:OmxMode) -> Result<OmxFile> {
        let path = path.as_ref().to_path_buf();
        let mut omx = OmxFile {
            path,
            mode,
            reader: None,
            entries: vec![],
            mappings: BTreeMap::new(),
            pending: BTreeMap::new(),
            dirty: false,
        };
        match mode {
            OmxMode::Write => {
                // fail now rather than on close if the destination is not writable
                File::create(&omx.path)?;
                omx.dirty = true;
            }
            OmxMode::Read => {
                let mut reader = NpzReader::new(File::open(&omx.path)?)?;
                for raw in reader.names()? {
                    let name = entry_name(&raw).to_string();
                    if let Some(label) = name.strip_prefix(LOOKUP_PREFIX) {
                        match read_entry(&mut reader,&raw)?.to_i64() {
                            Some(zones) => {
                                omx.mappings.insert(label.to_string(),zones.iter().copied().collect());
                            }
                            None => warn!("{}: mapping '{label}' is not integer valued, ignored",omx.path.display()),
                        }
                        continue;
                    }
                    omx.entries.push((name,raw));
                }
                omx.reader = Some(reader);
            }
        }
        debug!("opened {} ({:?})",omx.path.display(),mode);
        Ok(omx)
    }

    /// write out pending contents and release the file
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    fn flush(&mut self) -> Result<()> {
        if self.mode != OmxMode::Write || !self.dirty {
            return Ok(());
        }
        let mut npz = NpzWriter::new(File::create(&self.path)?);
        for (label,zones) in &self.mappings {
            npz.add_array(format!("{LOOKUP_PREFIX}{label}"),&Array1::from(zones.clone()))?;
        }
        for (name,array) in &self.pending {
            each_array!(array, a => npz.add_array(name.as_str(),a)?);
        }
        npz.finish()?;
        self.dirty = false;
        debug!("wrote {} matrices to {}",self.pending.len(),self.path.display());
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        match self.mode {
            OmxMode::Write => Ok(()),
            OmxMode::Read => Err(ConvertError::ReadOnly),
        }
    }

}

impl Drop for OmxFile {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("failed to write {}: {e}",self.path.display());
        }
    }
}

impl MatrixInterchange for OmxFile {

    fn create_mapping(&mut self, label:&str, zones:&[i64]) -> Result<()> {
        self.check_writable()?;
        self.mappings.insert(label.to_string(),zones.to_vec());
        self.dirty = true;
        Ok(())
    }

    fn mapping(&self, label:&str) -> Option<Vec<i64>> {
        self.mappings.get(label).cloned()
    }

    fn list_matrices(&self) -> Vec<String> {
        match self.mode {
            OmxMode::Read => self.entries.iter().map(|(name,_)| name.clone()).collect(),
            OmxMode::Write => self.pending.keys().cloned().collect(),
        }
    }

    fn read_matrix(&mut self, name:&str) -> Result<OmxArray> {
        if self.mode == OmxMode::Write {
            return self.pending.get(name).cloned()
                .ok_or_else(|| ConvertError::MatrixNotFound(name.to_string()));
        }
        let raw = self.entries.iter()
            .find(|(n,_)| n == name)
            .map(|(_,raw)| raw.clone())
            .ok_or_else(|| ConvertError::MatrixNotFound(name.to_string()))?;
        let reader = self.reader.as_mut().ok_or_else(|| ConvertError::MatrixNotFound(name.to_string()))?;
        read_entry(reader,&raw)
    }

    fn write_matrix(&mut self, name:&str, array:OmxArray) -> Result<()> {
        self.check_writable()?;
        self.pending.insert(name.to_string(),array);
        self.dirty = true;
        Ok(())
    }

}
