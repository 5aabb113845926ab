use tracing::{debug, info, warn};
use crate::bank::{MatrixBank, MatrixData, MatrixInfo, MatrixKind};
use crate::error::{ConvertError, Result};
use crate::omx::{MatrixInterchange, OmxArray};
use crate::shape::{clamp_u16, fit_square, ShapePolicy};
use crate::zones::ZoneIndex;


/// outcome of one pipeline pass
#[derive(Clone,Copy,Debug,Default,PartialEq,Eq)]
pub struct TransferSummary {
    pub transferred: usize,
    /// matrices left out because they are not FULL. Always zero on import.
    pub skipped: usize,
}

/// the name a matrix is written under in the interchange file
fn export_name(info:&MatrixInfo) -> &str {
    if info.name.is_empty() { &info.id } else { &info.name }
}

/// Copy FULL matrices from the bank into the interchange file.
/// `names` restricts the transfer to those matrices (by name or identifier), in that order.
pub fn export_all(
    bank:&impl MatrixBank,
    omx:&mut impl MatrixInterchange,
    zones:&ZoneIndex,
    names:Option<&[String]>,
    policy:ShapePolicy,
) -> Result<TransferSummary> {

    let candidates = match names {
        Some(names) => names.iter()
            .map(|n| bank.matrix(n).ok_or_else(|| ConvertError::MatrixNotFound(n.clone())))
            .collect::<Result<Vec<_>>>()?,
        None => bank.matrices(),
    };

    let n = zones.len();
    let mut summary = TransferSummary::default();

    for info in candidates {
        let name = export_name(&info);
        if info.kind != MatrixKind::Full {
            warn!("matrix '{name}' is {} type and was not converted, only FULL matrices are supported",info.kind);
            summary.skipped += 1;
            continue;
        }

        let array = match bank.get_data(&info.id,zones.scenario())? {
            MatrixData::Float(a) => {
                OmxArray::Float64(fit_square(name,a.into_dyn(),n,policy)?.into_dyn())
            }
            MatrixData::Int(a) => {
                let a = fit_square(name,a.into_dyn(),n,policy)?;
                OmxArray::UInt16(clamp_u16(&a).into_dyn())
            }
        };

        omx.write_matrix(name,array)?;
        info!("{name} added to OMX");
        summary.transferred += 1;
    }

    debug!("export: {summary:?}");
    Ok(summary)
}

/// Copy interchange matrices into the bank as FULL float matrices.
/// Existing matrices are matched by name, then identifier, and overwritten; others are created.
pub fn import_all(
    omx:&mut impl MatrixInterchange,
    bank:&mut impl MatrixBank,
    zones:&ZoneIndex,
    names:Option<&[String]>,
    policy:ShapePolicy,
) -> Result<TransferSummary> {

    let names = match names {
        Some(names) => names.to_vec(),
        None => omx.list_matrices(),
    };

    // entry names that are FULL identifiers keep those identifiers for themselves
    let reserved:Vec<String> = names.iter()
        .filter(|n| MatrixKind::from_id(n) == Some(MatrixKind::Full))
        .cloned()
        .collect();

    let n = zones.len();
    let mut summary = TransferSummary::default();

    for name in &names {
        info!("processing {name}");
        let array = omx.read_matrix(name)?.to_f64();
        let data = MatrixData::Float(fit_square(name,array,n,policy)?);

        let id = match bank.matrix(name) {
            Some(info) if info.kind == MatrixKind::Full => {
                info!("{name} exists, overwriting emme matrix {}",info.id);
                info.id
            }
            Some(info) => {
                return Err(ConvertError::KindMismatch { name: name.clone(), kind: info.kind });
            }
            None => {
                let id = if MatrixKind::from_id(name) == Some(MatrixKind::Full) {
                    name.clone()
                } else {
                    bank.available_identifier_excluding(MatrixKind::Full,&reserved)?
                };
                bank.create_matrix(&id)?;
                bank.rename_matrix(&id,name)?;
                info!("{name} does not exist, created emme matrix {id}");
                id
            }
        };

        bank.set_data(&id,zones.scenario(),data)?;
        summary.transferred += 1;
    }

    debug!("import: {summary:?}");
    Ok(summary)
}
