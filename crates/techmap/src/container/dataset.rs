//! Element types, dataset descriptors and the attributes stored next to them.
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use zarrs::array::{DataType, ElementOwned, FillValue};

/// Element type of a stored dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    F32,
    F64,
    I32,
    I64,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    /// The zarr data type arrays of this dtype are stored with.
    pub fn data_type(self) -> DataType {
        match self {
            DType::F32 => DataType::Float32,
            DType::F64 => DataType::Float64,
            DType::I32 => DataType::Int32,
            DType::I64 => DataType::Int64,
        }
    }

    /// Maps a zarr data type back; `None` for types a container never holds.
    pub fn from_data_type(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::Float32 => Some(DType::F32),
            DataType::Float64 => Some(DType::F64),
            DataType::Int32 => Some(DType::I32),
            DataType::Int64 => Some(DType::I64),
            _ => None,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I32 => "i32",
            DType::I64 => "i64",
        };
        f.write_str(name)
    }
}

/// Plain numeric types that can be stored in a container.
pub trait Element: ElementOwned + Copy + Default + Send + Sync + 'static {
    const DTYPE: DType;

    /// Fill value of chunks that were never written.
    fn fill_value() -> FillValue;
}

macro_rules! impl_element {
    ($t:ty, $dtype:expr) => {
        impl Element for $t {
            const DTYPE: DType = $dtype;

            fn fill_value() -> FillValue {
                FillValue::from(<$t>::default())
            }
        }
    };
}

impl_element!(f32, DType::F32);
impl_element!(f64, DType::F64);
impl_element!(i32, DType::I32);
impl_element!(i64, DType::I64);

/// Audit record attached to a tech-map dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Resource or generation file the dataset was mapped against.
    pub source_path: PathBuf,
    /// Nearest-neighbor distance bound in degrees, when one applied.
    pub distance_upper_bound: Option<f64>,
    /// Name the dataset was written under.
    pub dataset_name: String,
}

impl Provenance {
    pub fn new(
        source_path: impl Into<PathBuf>,
        distance_upper_bound: Option<f64>,
        dataset_name: impl Into<String>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            distance_upper_bound,
            dataset_name: dataset_name.into(),
        }
    }
}

/// Shape and attributes of one stored array.
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetHeader {
    pub dtype: DType,
    /// `[rows, cols]`; one-dimensional columns report `[n, 1]`.
    pub shape: [usize; 2],
    /// `true` for one-dimensional arrays.
    pub column: bool,
    pub provenance: Option<Provenance>,
}

impl DatasetHeader {
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.shape[0] * self.shape[1]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` when the window lies inside the dataset.
    pub fn contains_window(
        &self,
        rows: &std::ops::Range<usize>,
        cols: &std::ops::Range<usize>,
    ) -> bool {
        rows.start <= rows.end
            && cols.start <= cols.end
            && rows.end <= self.shape[0]
            && cols.end <= self.shape[1]
    }
}

/// Clips a requested chunk shape to the dataset shape, keeping each axis at least 1.
pub fn clip_chunks(shape: [usize; 2], chunks: [usize; 2]) -> [usize; 2] {
    [
        chunks[0].min(shape[0]).max(1),
        chunks[1].min(shape[1]).max(1),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_chunks_respects_shape_and_minimum() {
        assert_eq!(clip_chunks([100, 50], [128, 128]), [100, 50]);
        assert_eq!(clip_chunks([300, 500], [128, 128]), [128, 128]);
        assert_eq!(clip_chunks([0, 3], [128, 128]), [1, 3]);
    }

    #[test]
    fn data_types_map_both_ways() {
        for dtype in [DType::F32, DType::F64, DType::I32, DType::I64] {
            assert_eq!(DType::from_data_type(&dtype.data_type()), Some(dtype));
        }
        assert_eq!(DType::from_data_type(&DataType::UInt8), None);
    }

    #[test]
    fn window_containment() {
        let header = DatasetHeader {
            dtype: DType::F32,
            shape: [4, 5],
            column: false,
            provenance: None,
        };
        assert!(header.contains_window(&(0..4), &(2..5)));
        assert!(!header.contains_window(&(0..5), &(0..1)));
        assert_eq!(header.len(), 20);
    }

    #[test]
    fn dtype_display_and_size() {
        assert_eq!(DType::F64.to_string(), "f64");
        assert_eq!(DType::I32.size(), 4);
        assert!(DType::F32.is_float());
        assert!(!DType::I64.is_float());
    }
}
