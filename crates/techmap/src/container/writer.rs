//! Whole-container writer.
//!
//! Everything is written into a `<name>.partial` sibling hierarchy which replaces the target
//! only in [`ContainerWriter::finish`]. Dropping an unfinished writer removes the partial
//! hierarchy, so the previous container (if any) stays untouched.
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;
use zarrs::array::ArrayBuilder;
use zarrs::filesystem::FilesystemStore;
use zarrs::group::GroupBuilder;

use super::dataset::{clip_chunks, DType, Element, Provenance};
use super::{node_path, storage_error, Container, RootAttrs, GROUP_SEPARATOR, PROVENANCE_ATTR, ROOT};
use crate::error::{Error, Result};

/// Chunk length used for one-dimensional meta columns.
const COLUMN_CHUNK_ROWS: usize = 4096;

pub struct ContainerWriter {
    path: PathBuf,
    partial_path: PathBuf,
    store: Arc<FilesystemStore>,
    root: RootAttrs,
    groups: BTreeSet<String>,
    finished: bool,
}

impl ContainerWriter {
    /// Starts a new container that will replace `path` on [`finish`](Self::finish).
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let partial_path = sibling(&path, "partial")?;
        remove_path(&partial_path)?;
        fs::create_dir_all(&partial_path)?;
        let store = Arc::new(
            FilesystemStore::new(&partial_path).map_err(|e| storage_error(&partial_path, e))?,
        );

        Ok(Self {
            path,
            partial_path,
            store,
            root: RootAttrs::default(),
            groups: BTreeSet::new(),
            finished: false,
        })
    }

    /// Records the exclusion file the stored coordinates derive from.
    pub fn set_fpath_excl(&mut self, fpath_excl: impl Into<PathBuf>) {
        self.root.attrs.fpath_excl = Some(fpath_excl.into());
    }

    /// Carries over all file attributes of an existing container.
    pub fn copy_attrs_from(&mut self, src: &Container) {
        self.root.attrs = src.attrs().clone();
    }

    /// Writes a row-major 2D dataset chunked by `chunks`, clipped to `shape`.
    pub fn write_dataset<T: Element>(
        &mut self,
        name: &str,
        shape: [usize; 2],
        chunks: [usize; 2],
        data: &[T],
        provenance: Option<Provenance>,
    ) -> Result<()> {
        self.check_name(name)?;
        if data.len() != shape[0] * shape[1] {
            return Err(Error::OutOfBounds(format!(
                "dataset '{name}' has {} values but shape {shape:?}",
                data.len()
            )));
        }
        let chunks = clip_chunks(shape, chunks);
        self.store_array(
            name,
            vec![shape[0] as u64, shape[1] as u64],
            vec![chunks[0] as u64, chunks[1] as u64],
            data,
            provenance,
        )
    }

    /// Writes a one-dimensional meta column.
    pub fn write_column<T: Element>(&mut self, name: &str, data: &[T]) -> Result<()> {
        self.store_column(name, data, None)
    }

    /// Copies a dataset (values, dtype and provenance) from another container, re-chunking 2D
    /// datasets by `chunks`.
    pub fn copy_dataset(&mut self, src: &Container, name: &str, chunks: [usize; 2]) -> Result<()> {
        match src.dataset(name)?.dtype {
            DType::F32 => self.copy_typed::<f32>(src, name, chunks),
            DType::F64 => self.copy_typed::<f64>(src, name, chunks),
            DType::I32 => self.copy_typed::<i32>(src, name, chunks),
            DType::I64 => self.copy_typed::<i64>(src, name, chunks),
        }
    }

    /// Writes the root group and replaces the target container.
    pub fn finish(mut self) -> Result<()> {
        let attributes = match serde_json::to_value(&self.root)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let root = GroupBuilder::new()
            .attributes(attributes)
            .build(self.store.clone(), ROOT)
            .map_err(|e| storage_error(&self.partial_path, e))?;
        root.store_metadata()
            .map_err(|e| storage_error(&self.partial_path, e))?;

        replace_path(&self.partial_path, &self.path)?;
        self.finished = true;
        debug!(
            "Finished container {} with {} datasets.",
            self.path.display(),
            self.root.datasets.len()
        );
        Ok(())
    }

    fn copy_typed<T: Element>(
        &mut self,
        src: &Container,
        name: &str,
        chunks: [usize; 2],
    ) -> Result<()> {
        let header = src.dataset(name)?.clone();
        let data = src.read_all::<T>(name)?;
        if header.column {
            self.store_column(name, &data, header.provenance)
        } else {
            self.write_dataset(name, header.shape, chunks, &data, header.provenance)
        }
    }

    fn store_column<T: Element>(
        &mut self,
        name: &str,
        data: &[T],
        provenance: Option<Provenance>,
    ) -> Result<()> {
        self.check_name(name)?;
        let chunk = data.len().clamp(1, COLUMN_CHUNK_ROWS);
        self.store_array(
            name,
            vec![data.len() as u64],
            vec![chunk as u64],
            data,
            provenance,
        )
    }

    fn store_array<T: Element>(
        &mut self,
        name: &str,
        shape: Vec<u64>,
        chunks: Vec<u64>,
        data: &[T],
        provenance: Option<Provenance>,
    ) -> Result<()> {
        self.store_parent_groups(name)?;

        let mut attributes = Map::new();
        if let Some(provenance) = &provenance {
            attributes.insert(PROVENANCE_ATTR.to_string(), serde_json::to_value(provenance)?);
        }
        let partial = &self.partial_path;
        let array = ArrayBuilder::new(
            shape.clone(),
            T::DTYPE.data_type(),
            chunks.try_into().map_err(|e| storage_error(partial, e))?,
            T::fill_value(),
        )
        .attributes(attributes)
        .build(self.store.clone(), &node_path(name))
        .map_err(|e| storage_error(partial, e))?;
        array
            .store_metadata()
            .map_err(|e| storage_error(partial, e))?;
        if !data.is_empty() {
            array
                .store_array_subset_elements::<T>(&array.subset_all(), data)
                .map_err(|e| storage_error(partial, e))?;
        }

        debug!("Wrote dataset '{}' {:?} ({}).", name, shape, T::DTYPE);
        self.root.datasets.push(name.to_string());
        Ok(())
    }

    /// Stores group metadata for every enclosing group of `name` not written yet.
    fn store_parent_groups(&mut self, name: &str) -> Result<()> {
        let mut prefixes = Vec::new();
        for (at, _) in name.match_indices(GROUP_SEPARATOR) {
            prefixes.push(&name[..at]);
        }
        for prefix in prefixes {
            if self.groups.contains(prefix) {
                continue;
            }
            let group = GroupBuilder::new()
                .build(self.store.clone(), &node_path(prefix))
                .map_err(|e| storage_error(&self.partial_path, e))?;
            group
                .store_metadata()
                .map_err(|e| storage_error(&self.partial_path, e))?;
            self.groups.insert(prefix.to_string());
        }
        Ok(())
    }

    fn check_name(&self, name: &str) -> Result<()> {
        let malformed = name.is_empty()
            || name.starts_with(GROUP_SEPARATOR)
            || name.ends_with(GROUP_SEPARATOR)
            || name.split(GROUP_SEPARATOR).any(str::is_empty);
        if malformed {
            return Err(Error::InvalidConfig(format!(
                "invalid dataset name '{name}'"
            )));
        }
        if self.root.datasets.iter().any(|existing| existing == name) {
            return Err(Error::InvalidConfig(format!(
                "dataset '{name}' written twice"
            )));
        }
        Ok(())
    }
}

impl Drop for ContainerWriter {
    fn drop(&mut self) {
        if !self.finished {
            let _ = remove_path(&self.partial_path);
        }
    }
}

/// `<path>.<suffix>` next to `path`.
fn sibling(path: &Path, suffix: &str) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::InvalidConfig(format!("'{}' has no file name", path.display())))?;
    Ok(path.with_file_name(format!("{}.{suffix}", file_name.to_string_lossy())))
}

fn remove_path(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else if path.exists() {
        fs::remove_file(path)
    } else {
        Ok(())
    }
}

/// Moves `partial` onto `target`. An existing target is parked as `<target>.previous` and
/// restored if the move fails.
fn replace_path(partial: &Path, target: &Path) -> Result<()> {
    if !target.exists() {
        fs::rename(partial, target)?;
        return Ok(());
    }
    let previous = sibling(target, "previous")?;
    remove_path(&previous)?;
    fs::rename(target, &previous)?;
    if let Err(err) = fs::rename(partial, target) {
        let _ = fs::rename(&previous, target);
        return Err(err.into());
    }
    remove_path(&previous)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_replaces_existing_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tmap");

        let mut first = ContainerWriter::create(&path).unwrap();
        first.write_column("a", &[1i32, 2, 3]).unwrap();
        first.finish().unwrap();

        let mut second = ContainerWriter::create(&path).unwrap();
        second.write_column("b", &[4i32]).unwrap();
        second.finish().unwrap();

        let container = Container::open(&path).unwrap();
        assert!(!container.contains("a"));
        assert!(container.contains("b"));
        assert!(!dir.path().join("out.tmap.partial").exists());
        assert!(!dir.path().join("out.tmap.previous").exists());
    }

    #[test]
    fn dropped_writer_leaves_previous_container_intact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tmap");

        let mut first = ContainerWriter::create(&path).unwrap();
        first.write_column("kept", &[1.5f64]).unwrap();
        first.finish().unwrap();

        {
            let mut aborted = ContainerWriter::create(&path).unwrap();
            aborted.write_column("lost", &[2.5f64]).unwrap();
        }

        let container = Container::open(&path).unwrap();
        assert!(container.contains("kept"));
        assert!(!container.contains("lost"));
        assert!(!dir.path().join("out.tmap.partial").exists());
    }

    #[test]
    fn copy_dataset_preserves_values_and_provenance() {
        let dir = tempfile::tempdir().unwrap();
        let src_path = dir.path().join("src.tmap");
        let dst_path = dir.path().join("dst.tmap");

        let data: Vec<i32> = (0..12).collect();
        let provenance = Provenance::new("/data/res.tmap", Some(0.03), "res_map");
        let mut writer = ContainerWriter::create(&src_path).unwrap();
        writer.write_column("meta/pad", &[0i64; 5]).unwrap();
        writer
            .write_dataset("res_map", [3, 4], [2, 2], &data, Some(provenance.clone()))
            .unwrap();
        writer.set_fpath_excl("/data/excl.tmap");
        writer.finish().unwrap();

        let src = Container::open(&src_path).unwrap();
        let mut writer = ContainerWriter::create(&dst_path).unwrap();
        writer.copy_attrs_from(&src);
        writer.copy_dataset(&src, "res_map", [128, 128]).unwrap();
        writer.copy_dataset(&src, "meta/pad", [128, 128]).unwrap();
        writer.finish().unwrap();

        let dst = Container::open(&dst_path).unwrap();
        assert_eq!(dst.read_all::<i32>("res_map").unwrap(), data);
        assert_eq!(dst.provenance("res_map").unwrap(), Some(&provenance));
        assert!(dst.dataset("meta/pad").unwrap().column);
        assert_eq!(dst.read_column_i64("meta/pad").unwrap(), vec![0; 5]);
        assert_eq!(dst.attrs(), src.attrs());
    }

    #[test]
    fn rejects_shape_mismatch_and_bad_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ContainerWriter::create(dir.path().join("x.tmap")).unwrap();
        assert!(matches!(
            writer.write_dataset("grid", [2, 2], [2, 2], &[1.0f32; 3], None),
            Err(Error::OutOfBounds(_))
        ));
        writer.write_column("col", &[1i32]).unwrap();
        for name in ["col", "/bad", "meta/", "meta//gid"] {
            assert!(matches!(
                writer.write_column(name, &[1i32]),
                Err(Error::InvalidConfig(_))
            ));
        }
    }
}
