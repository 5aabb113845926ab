use ndarray::{Array2, ArrayD, Axis};
use num_traits::Zero;
use tracing::warn;
use crate::error::{ConvertError, Result};


/// How a payload whose shape differs from the zone count is handled
#[derive(Clone,Copy,Debug,Default,PartialEq,Eq)]
pub enum ShapePolicy {
    /// the payload must already be (N,N) once trailing singleton axes are removed
    #[default]
    Strict,
    /// row-major truncate or zero-pad to N*N cells, then reshape to (N,N)
    Resize,
}

/// return the shape with trailing singleton dimensions removed, keeping at least `min_ndim` axes
pub fn shape_ns(shape:&[usize], min_ndim:usize) -> &[usize] {
    let mut len = shape.len();
    while len > min_ndim && shape[len - 1] == 1 {
        len -= 1;
    }
    &shape[..len]
}

/// drops trailing length-1 axes down to a 2-d array
pub fn squeeze_trailing<T>(mut array:ArrayD<T>) -> ArrayD<T> {
    let ndim = shape_ns(array.shape(),2).len();
    while array.ndim() > ndim {
        let last = Axis(array.ndim() - 1);
        array = array.index_axis_move(last,0);
    }
    array
}

/// align an array of any shape to a square (n,n) matrix according to `policy`.
/// `name` is only used for diagnostics.
pub fn fit_square<T>(name:&str, array:ArrayD<T>, n:usize, policy:ShapePolicy) -> Result<Array2<T>>
where T:Clone + Zero
{
    let array = squeeze_trailing(array);
    let mismatch = |found:&[usize]| ConvertError::ShapeMismatch {
        name: name.to_string(),
        found: found.to_vec(),
        expected: vec![n,n],
    };

    let n_cells = n * n;
    match policy {
        ShapePolicy::Strict => {
            if array.shape() != [n,n] {
                return Err(mismatch(array.shape()));
            }
        }
        ShapePolicy::Resize => {
            if array.len() > n_cells {
                warn!("{name}: {:?} truncated to ({n},{n}), {} cells dropped",array.shape(),array.len() - n_cells);
            } else if array.len() < n_cells {
                warn!("{name}: {:?} padded to ({n},{n}), {} zero cells added",array.shape(),n_cells - array.len());
            }
        }
    }

    let found = array.shape().to_vec();
    // logical iteration order is row-major regardless of memory layout
    let mut flat:Vec<T> = array.iter().take(n_cells).cloned().collect();
    flat.resize(n_cells,T::zero());
    Array2::from_shape_vec((n,n),flat).map_err(|_| mismatch(&found))
}

/// clamp integer cells into the u16 range
pub fn clamp_u16(array:&Array2<i64>) -> Array2<u16> {
    array.mapv(|v| v.clamp(0,u16::MAX as i64) as u16)
}
