//! Fixture writers shared by unit tests.
use std::path::Path;

use crate::container::{ContainerWriter, Element};
use crate::extent::{LATITUDE, LONGITUDE};

/// Writes an exclusion file whose pixel `(r, c)` sits at
/// `(origin.0 - r * step, origin.1 + c * step)` in `(lat, lon)`.
pub(crate) fn write_exclusions(path: &Path, shape: (usize, usize), origin: (f64, f64), step: f64) {
    let (rows, cols) = shape;
    let mut lat = Vec::with_capacity(rows * cols);
    let mut lon = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            lat.push((origin.0 - r as f64 * step) as f32);
            lon.push((origin.1 + c as f64 * step) as f32);
        }
    }
    write_coordinate_grid(path, shape, &lat, &lon);
}

/// Writes `latitude`/`longitude` datasets of the given shape and element type.
pub(crate) fn write_coordinate_grid<T: Element>(
    path: &Path,
    shape: (usize, usize),
    lat: &[T],
    lon: &[T],
) {
    let (rows, cols) = shape;
    let mut writer = ContainerWriter::create(path).unwrap();
    writer
        .write_dataset(LATITUDE, [rows, cols], [128, 128], lat, None)
        .unwrap();
    writer
        .write_dataset(LONGITUDE, [rows, cols], [128, 128], lon, None)
        .unwrap();
    writer.finish().unwrap();
}

/// Writes a resource file with `(lat, lon)` sites.
pub(crate) fn write_resource(path: &Path, sites: &[(f64, f64)]) {
    let lat: Vec<f64> = sites.iter().map(|s| s.0).collect();
    let lon: Vec<f64> = sites.iter().map(|s| s.1).collect();
    let mut writer = ContainerWriter::create(path).unwrap();
    writer.write_column("meta/latitude", &lat).unwrap();
    writer.write_column("meta/longitude", &lon).unwrap();
    writer.finish().unwrap();
}

/// Writes a generation file whose row `i` was simulated from resource site `gids[i]`.
pub(crate) fn write_generation(path: &Path, gids: &[i64]) {
    let mut writer = ContainerWriter::create(path).unwrap();
    writer.write_column("meta/gid", gids).unwrap();
    writer.finish().unwrap();
}

/// Writes a single-site wind file with one `[time, 1]` dataset per entry.
pub(crate) fn write_wind(path: &Path, datasets: &[(&str, Vec<f64>)]) {
    let mut writer = ContainerWriter::create(path).unwrap();
    writer.write_column("meta/latitude", &[40.0f64]).unwrap();
    writer.write_column("meta/longitude", &[-105.0f64]).unwrap();
    for (name, values) in datasets {
        writer
            .write_dataset(name, [values.len(), 1], [1024, 1], values, None)
            .unwrap();
    }
    writer.finish().unwrap();
}
