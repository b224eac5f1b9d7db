//! Hierarchical, chunked dataset containers backed by zarr v3 hierarchies.
//!
//! A container is a directory holding a root group and one zarr array per dataset. Dataset
//! names are `/`-separated paths, so `meta/latitude` is an array inside group `meta`. 2D
//! datasets are chunked, which keeps rectangular window reads proportional to the window
//! instead of the dataset; `meta` columns are one-dimensional arrays.
//!
//! The root group attributes carry the file attributes ([`FileAttrs`]) and the names of all
//! stored datasets. Tech-map arrays carry their [`Provenance`] as the `provenance` attribute.
//!
//! Readers are [`Container`]s; containers are rewritten as a whole through [`ContainerWriter`].
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use zarrs::array::Array;
use zarrs::array_subset::ArraySubset;
use zarrs::filesystem::FilesystemStore;
use zarrs::group::Group;

use crate::error::{Error, Result};

mod dataset;
mod writer;

pub use dataset::{clip_chunks, DType, DatasetHeader, Element, Provenance};
pub use writer::ContainerWriter;

/// Separator between group and dataset names.
pub const GROUP_SEPARATOR: char = '/';

/// Node path of the root group.
const ROOT: &str = "/";

/// Array attribute holding a serialized [`Provenance`].
const PROVENANCE_ATTR: &str = "provenance";

/// File-level attributes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FileAttrs {
    /// Exclusion file the stored coordinates were built from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fpath_excl: Option<PathBuf>,
}

/// Attributes of the root group.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct RootAttrs {
    #[serde(flatten)]
    attrs: FileAttrs,
    #[serde(default)]
    datasets: Vec<String>,
}

struct Dataset {
    header: DatasetHeader,
    array: Array<FilesystemStore>,
}

/// Read-only handle on a container.
pub struct Container {
    path: PathBuf,
    attrs: FileAttrs,
    datasets: BTreeMap<String, Dataset>,
}

impl Container {
    /// Opens a container and reads the metadata of every dataset.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("'{}' does not exist", path.display()),
            )));
        }
        if !path.is_dir() {
            return Err(format_error(&path, "not a container directory"));
        }

        let store = Arc::new(FilesystemStore::new(&path).map_err(|e| storage_error(&path, e))?);
        let root = Group::open(store.clone(), ROOT)
            .map_err(|e| format_error(&path, format!("cannot open root group: {e}")))?;
        let root_attrs: RootAttrs =
            serde_json::from_value(Value::Object(root.attributes().clone()))?;

        let mut datasets = BTreeMap::new();
        for name in root_attrs.datasets {
            let array = Array::open(store.clone(), &node_path(&name))
                .map_err(|e| format_error(&path, format!("cannot open dataset '{name}': {e}")))?;
            let header = read_header(&path, &name, &array)?;
            datasets.insert(name, Dataset { header, array });
        }

        Ok(Self {
            path,
            attrs: root_attrs.attrs,
            datasets,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn attrs(&self) -> &FileAttrs {
        &self.attrs
    }

    /// Returns `true` if a dataset with this exact name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.datasets.contains_key(name)
    }

    /// All dataset names, sorted.
    pub fn dataset_names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    /// Dataset names directly or transitively inside `group`.
    pub fn group(&self, group: &str) -> Vec<&str> {
        let prefix = format!("{}{}", group.trim_end_matches(GROUP_SEPARATOR), GROUP_SEPARATOR);
        self.dataset_names()
            .filter(|name| name.starts_with(&prefix))
            .collect()
    }

    pub fn dataset(&self, name: &str) -> Result<&DatasetHeader> {
        self.entry(name).map(|dataset| &dataset.header)
    }

    pub fn provenance(&self, name: &str) -> Result<Option<&Provenance>> {
        Ok(self.dataset(name)?.provenance.as_ref())
    }

    /// Reads a rectangular window of a dataset stored as `T`, row-major.
    ///
    /// Only the chunks intersecting the window are read.
    pub fn read_window<T: Element>(
        &self,
        name: &str,
        rows: Range<usize>,
        cols: Range<usize>,
    ) -> Result<Vec<T>> {
        let dataset = self.entry(name)?;
        let header = &dataset.header;
        if header.dtype != T::DTYPE {
            return Err(Error::DTypeMismatch {
                name: name.to_string(),
                expected: T::DTYPE,
                found: header.dtype,
            });
        }
        if !header.contains_window(&rows, &cols) {
            return Err(Error::OutOfBounds(format!(
                "window {rows:?} x {cols:?} outside dataset '{name}' of shape {:?}",
                header.shape
            )));
        }
        if rows.is_empty() || cols.is_empty() {
            return Ok(Vec::new());
        }

        let subset = window_subset(header.column, &rows, &cols);
        dataset
            .array
            .retrieve_array_subset_elements::<T>(&subset)
            .map_err(|e| storage_error(&self.path, e))
    }

    /// Reads a whole dataset stored as `T`, row-major.
    pub fn read_all<T: Element>(&self, name: &str) -> Result<Vec<T>> {
        let shape = self.dataset(name)?.shape;
        self.read_window(name, 0..shape[0], 0..shape[1])
    }

    /// Reads a window of any numeric dataset, widened to `f64`.
    pub fn read_window_f64(
        &self,
        name: &str,
        rows: Range<usize>,
        cols: Range<usize>,
    ) -> Result<Vec<f64>> {
        match self.dataset(name)?.dtype {
            DType::F32 => Ok(widen(self.read_window::<f32>(name, rows, cols)?, f64::from)),
            DType::F64 => self.read_window::<f64>(name, rows, cols),
            DType::I32 => Ok(widen(self.read_window::<i32>(name, rows, cols)?, f64::from)),
            DType::I64 => Ok(widen(self.read_window::<i64>(name, rows, cols)?, |v| {
                v as f64
            })),
        }
    }

    /// Reads a window of an integer dataset, widened to `i64`.
    pub fn read_window_i64(
        &self,
        name: &str,
        rows: Range<usize>,
        cols: Range<usize>,
    ) -> Result<Vec<i64>> {
        match self.dataset(name)?.dtype {
            DType::I32 => Ok(widen(self.read_window::<i32>(name, rows, cols)?, i64::from)),
            DType::I64 => self.read_window::<i64>(name, rows, cols),
            found => Err(Error::DTypeMismatch {
                name: name.to_string(),
                expected: DType::I64,
                found,
            }),
        }
    }

    /// Reads a single-column dataset as `f64`.
    pub fn read_column_f64(&self, name: &str) -> Result<Vec<f64>> {
        let shape = self.column_shape(name)?;
        self.read_window_f64(name, 0..shape[0], 0..1)
    }

    /// Reads a single-column integer dataset as `i64`.
    pub fn read_column_i64(&self, name: &str) -> Result<Vec<i64>> {
        let shape = self.column_shape(name)?;
        self.read_window_i64(name, 0..shape[0], 0..1)
    }

    fn column_shape(&self, name: &str) -> Result<[usize; 2]> {
        let shape = self.dataset(name)?.shape;
        if shape[1] != 1 {
            return Err(format_error(
                &self.path,
                format!("dataset '{name}' of shape {shape:?} is not a column"),
            ));
        }
        Ok(shape)
    }

    fn entry(&self, name: &str) -> Result<&Dataset> {
        self.datasets.get(name).ok_or_else(|| Error::MissingDataset {
            path: self.path.clone(),
            name: name.to_string(),
        })
    }
}

fn read_header(path: &Path, name: &str, array: &Array<FilesystemStore>) -> Result<DatasetHeader> {
    let dtype = DType::from_data_type(array.data_type()).ok_or_else(|| {
        format_error(
            path,
            format!("dataset '{name}' has unsupported data type {:?}", array.data_type()),
        )
    })?;
    let (shape, column) = match array.shape() {
        &[n] => ([n as usize, 1], true),
        &[rows, cols] => ([rows as usize, cols as usize], false),
        other => {
            return Err(format_error(
                path,
                format!("dataset '{name}' has {} dimensions", other.len()),
            ))
        }
    };
    let provenance = array
        .attributes()
        .get(PROVENANCE_ATTR)
        .cloned()
        .map(serde_json::from_value::<Provenance>)
        .transpose()?;
    Ok(DatasetHeader {
        dtype,
        shape,
        column,
        provenance,
    })
}

fn window_subset(column: bool, rows: &Range<usize>, cols: &Range<usize>) -> ArraySubset {
    let rows = rows.start as u64..rows.end as u64;
    if column {
        ArraySubset::new_with_ranges(&[rows])
    } else {
        ArraySubset::new_with_ranges(&[rows, cols.start as u64..cols.end as u64])
    }
}

/// Zarr node path of a dataset or group name.
fn node_path(name: &str) -> String {
    format!("{GROUP_SEPARATOR}{name}")
}

fn widen<T, U>(values: Vec<T>, f: impl Fn(T) -> U) -> Vec<U> {
    values.into_iter().map(f).collect()
}

pub(crate) fn format_error(path: &Path, message: impl Into<String>) -> Error {
    Error::Format {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

pub(crate) fn storage_error(path: &Path, err: impl fmt::Display) -> Error {
    Error::Storage {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file(dir: &Path) -> PathBuf {
        let path = dir.join("sample.tmap");
        let mut writer = ContainerWriter::create(&path).unwrap();
        let grid: Vec<f32> = (0..20).map(|v| v as f32 * 0.5).collect();
        writer
            .write_dataset("latitude", [4, 5], [3, 2], &grid, None)
            .unwrap();
        writer.write_column("meta/gid", &[7i64, 3, 9]).unwrap();
        writer.write_column("meta/latitude", &[1.0f64, 2.0, 3.0]).unwrap();
        writer.set_fpath_excl("/data/excl.tmap");
        writer.finish().unwrap();
        path
    }

    #[test]
    fn open_reads_attributes_and_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let container = Container::open(sample_file(dir.path())).unwrap();
        assert_eq!(
            container.attrs().fpath_excl.as_deref(),
            Some(Path::new("/data/excl.tmap"))
        );
        assert!(container.contains("latitude"));
        assert!(!container.contains("longitude"));
        assert_eq!(container.dataset("latitude").unwrap().shape, [4, 5]);
        let gid = container.dataset("meta/gid").unwrap();
        assert_eq!(gid.shape, [3, 1]);
        assert!(gid.column);
        assert_eq!(container.group("meta"), vec!["meta/gid", "meta/latitude"]);
    }

    #[test]
    fn window_reads_cross_chunk_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let container = Container::open(sample_file(dir.path())).unwrap();
        let window = container.read_window::<f32>("latitude", 2..4, 1..4).unwrap();
        assert_eq!(window, vec![5.5, 6.0, 6.5, 8.0, 8.5, 9.0]);

        let all = container.read_all::<f32>("latitude").unwrap();
        assert_eq!(all.len(), 20);
        assert_eq!(all[19], 9.5);
        assert!(container
            .read_window::<f32>("latitude", 1..1, 0..5)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn typed_read_rejects_wrong_dtype() {
        let dir = tempfile::tempdir().unwrap();
        let container = Container::open(sample_file(dir.path())).unwrap();
        let err = container.read_all::<i32>("latitude").unwrap_err();
        assert!(matches!(
            err,
            Error::DTypeMismatch {
                expected: DType::I32,
                found: DType::F32,
                ..
            }
        ));
        assert!(container.read_column_i64("meta/latitude").is_err());
    }

    #[test]
    fn column_helpers_widen_values() {
        let dir = tempfile::tempdir().unwrap();
        let container = Container::open(sample_file(dir.path())).unwrap();
        assert_eq!(container.read_column_i64("meta/gid").unwrap(), vec![7, 3, 9]);
        assert_eq!(
            container.read_column_f64("meta/gid").unwrap(),
            vec![7.0, 3.0, 9.0]
        );
        assert!(container.read_column_f64("latitude").is_err());
    }

    #[test]
    fn out_of_bounds_window_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let container = Container::open(sample_file(dir.path())).unwrap();
        let err = container
            .read_window::<f32>("latitude", 0..5, 0..1)
            .unwrap_err();
        assert!(matches!(err, Error::OutOfBounds(_)));
    }

    #[test]
    fn missing_dataset_is_reported_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let container = Container::open(sample_file(dir.path())).unwrap();
        match container.dataset("res_map") {
            Err(Error::MissingDataset { name, .. }) => assert_eq!(name, "res_map"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_plain_files_and_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.tmap");
        std::fs::write(&path, b"definitely not a container").unwrap();
        assert!(matches!(
            Container::open(&path),
            Err(Error::Format { .. })
        ));
        assert!(matches!(
            Container::open(dir.path().join("absent.tmap")),
            Err(Error::Io(_))
        ));
    }
}
