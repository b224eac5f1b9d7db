//! Output store: validation, persistence and read-back of tech-map files.
//!
//! A tech-map file holds `latitude`/`longitude` (`f32`, raster shape), any number of `i32`
//! index datasets with [`Provenance`], and the `fpath_excl` file attribute naming the
//! exclusion layer the coordinates came from. Saving rewrites the whole container and swaps it
//! in; the orchestrator is the only writer.
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::container::{Container, ContainerWriter, Provenance};
use crate::error::{Error, Result};
use crate::events::{EventSink, TechMapEvent, WarningCategory};
use crate::extent::{LATITUDE, LONGITUDE};

use super::{CoordMap, IndexMap};

/// Extension of tech-map files.
pub const TECHMAP_EXTENSION: &str = "tmap";

/// Appends `.tmap` to paths that do not already end with it.
pub fn normalize_output_path(path: impl Into<PathBuf>) -> PathBuf {
    let path = path.into();
    if path.extension().is_some_and(|ext| ext == TECHMAP_EXTENSION) {
        return path;
    }
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(TECHMAP_EXTENSION);
    PathBuf::from(name)
}

fn warn_file_input(sink: &mut dyn EventSink, message: String) {
    warn!("{}", message);
    sink.send(TechMapEvent::warning(WarningCategory::FileInput, message));
}

/// Checks an existing output file against the current run.
///
/// Missing or mismatched exclusion provenance and an existing `dset` are warnings; a file
/// without `latitude`/`longitude` cannot be extended and is an error. Returns `false` when the
/// file does not exist yet.
pub fn validate_output(
    fpath_out: &Path,
    fpath_excl: &Path,
    dset: &str,
    sink: &mut dyn EventSink,
) -> Result<bool> {
    if !fpath_out.exists() {
        return Ok(false);
    }
    let container = Container::open(fpath_out)?;

    match &container.attrs().fpath_excl {
        None => warn_file_input(
            sink,
            format!(
                "Could not find 'fpath_excl' attribute in '{}'; cannot verify the exclusion \
                 layer it was built from.",
                fpath_out.display()
            ),
        ),
        Some(recorded) if recorded.file_name() != fpath_excl.file_name() => warn_file_input(
            sink,
            format!(
                "Exclusion file '{}' differs from '{}' recorded in '{}'.",
                fpath_excl.display(),
                recorded.display(),
                fpath_out.display()
            ),
        ),
        Some(_) => {}
    }

    if !container.contains(LATITUDE) || !container.contains(LONGITUDE) {
        return Err(Error::FileInput(format!(
            "'{}' exists but is missing '{LATITUDE}' or '{LONGITUDE}'",
            fpath_out.display()
        )));
    }

    if container.contains(dset) {
        warn_file_input(
            sink,
            format!(
                "Dataset '{}' already exists in '{}' and will be replaced.",
                dset,
                fpath_out.display()
            ),
        );
    }
    Ok(true)
}

/// What to persist for one pass.
pub struct SaveRequest<'a> {
    pub fpath_out: &'a Path,
    pub fpath_excl: &'a Path,
    pub dset: &'a str,
    pub index: &'a IndexMap,
    /// Coordinates to store when the file does not hold them yet.
    pub coords: Option<&'a CoordMap>,
    pub provenance: Provenance,
    pub chunks: [usize; 2],
}

/// Writes `request.index` into the tech-map file, creating it or carrying over its other
/// datasets.
pub fn save_tech_map(request: SaveRequest<'_>, sink: &mut dyn EventSink) -> Result<()> {
    let SaveRequest {
        fpath_out,
        fpath_excl,
        dset,
        index,
        coords,
        provenance,
        chunks,
    } = request;
    let (rows, cols) = index.shape();
    let mut writer = ContainerWriter::create(fpath_out)?;

    let mut has_coords = false;
    if fpath_out.exists() {
        let existing = Container::open(fpath_out)?;
        writer.copy_attrs_from(&existing);
        let names: Vec<String> = existing
            .dataset_names()
            .filter(|name| *name != dset)
            .map(str::to_string)
            .collect();
        for name in &names {
            writer.copy_dataset(&existing, name, chunks)?;
        }
        has_coords = existing.contains(LATITUDE) && existing.contains(LONGITUDE);
    }

    if !has_coords {
        let coords = coords.ok_or_else(|| {
            Error::FileInput(format!(
                "'{}' has no coordinates and none were provided",
                fpath_out.display()
            ))
        })?;
        if coords.shape != (rows, cols) {
            return Err(Error::OutOfBounds(format!(
                "coordinate shape {:?} differs from index shape {:?}",
                coords.shape,
                (rows, cols)
            )));
        }
        writer.write_dataset(LATITUDE, [rows, cols], chunks, &coords.latitude, None)?;
        writer.write_dataset(LONGITUDE, [rows, cols], chunks, &coords.longitude, None)?;
        writer.set_fpath_excl(fpath_excl);
    }

    writer.write_dataset(dset, [rows, cols], chunks, index.as_raw(), Some(provenance))?;
    writer.finish()?;

    info!(
        "Saved dataset '{}' ({} of {} pixels mapped) to {}.",
        dset,
        index.mapped_count(),
        index.len(),
        fpath_out.display()
    );
    sink.send(TechMapEvent::DatasetSaved {
        path: fpath_out.to_path_buf(),
        dataset: dset.to_string(),
    });
    Ok(())
}

/// Reads an index dataset back into an [`IndexMap`].
pub fn read_index_map(path: impl AsRef<Path>, dset: &str) -> Result<IndexMap> {
    let container = Container::open(path.as_ref())?;
    let shape = container.dataset(dset)?.shape;
    let data = container.read_all::<i32>(dset)?;
    IndexMap::from_raw((shape[0], shape[1]), data).ok_or_else(|| {
        crate::container::format_error(
            path.as_ref(),
            format!("dataset '{dset}' length does not match its shape"),
        )
    })
}
