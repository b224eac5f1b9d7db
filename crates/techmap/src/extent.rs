//! Supply-curve extent: chunked addressing of the exclusion raster.
//!
//! The raster of shape `(rows, cols)` is tiled with `resolution x resolution` blocks, clipped
//! at the bottom and right edges. Each block is a supply-curve gid, numbered row-major over the
//! block grid, so gids `0..len()` cover every pixel exactly once. Pixels are addressed by flat
//! index `row * cols + col`.
use std::ops::Range;
use std::path::{Path, PathBuf};

use glam::DVec2;

use crate::container::Container;
use crate::error::{Error, Result};

/// Supply-curve gid (one exclusion pixel block).
pub type Gid = usize;

/// Exclusion meta dataset holding per-pixel latitude.
pub const LATITUDE: &str = "latitude";
/// Exclusion meta dataset holding per-pixel longitude.
pub const LONGITUDE: &str = "longitude";

/// Chunked addressing over an exclusion raster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExclusionExtent {
    path: PathBuf,
    shape: (usize, usize),
    resolution: usize,
    n_rows: usize,
    n_cols: usize,
}

impl ExclusionExtent {
    /// Opens the exclusion file and reads the raster shape from its `latitude` meta.
    pub fn open(path: impl AsRef<Path>, resolution: usize) -> Result<Self> {
        let container = Container::open(path.as_ref())?;
        Self::from_container(&container, resolution)
    }

    pub fn from_container(container: &Container, resolution: usize) -> Result<Self> {
        let lat = container.dataset(LATITUDE)?.shape;
        let lon = container.dataset(LONGITUDE)?.shape;
        if lat != lon {
            return Err(Error::FileInput(format!(
                "exclusion meta shapes differ in '{}': latitude {:?}, longitude {:?}",
                container.path().display(),
                lat,
                lon
            )));
        }
        Self::new(container.path(), (lat[0], lat[1]), resolution)
    }

    pub fn new(path: impl Into<PathBuf>, shape: (usize, usize), resolution: usize) -> Result<Self> {
        if resolution == 0 {
            return Err(Error::InvalidConfig("resolution must be > 0".into()));
        }
        Ok(Self {
            path: path.into(),
            shape,
            resolution,
            n_rows: shape.0.div_ceil(resolution),
            n_cols: shape.1.div_ceil(resolution),
        })
    }

    /// Path of the exclusion file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raster shape `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Total number of exclusion pixels.
    pub fn n_pixels(&self) -> usize {
        self.shape.0 * self.shape.1
    }

    /// Number of gids along `(rows, cols)`.
    pub fn grid_dims(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    /// Number of supply-curve gids.
    pub fn len(&self) -> usize {
        self.n_rows * self.n_cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn gids(&self) -> Range<Gid> {
        0..self.len()
    }

    /// Pixel row and column window of a gid.
    pub fn excl_slices(&self, gid: Gid) -> Result<(Range<usize>, Range<usize>)> {
        if gid >= self.len() {
            return Err(Error::OutOfBounds(format!(
                "gid {gid} outside extent with {} gids",
                self.len()
            )));
        }
        let row = gid / self.n_cols;
        let col = gid % self.n_cols;
        let r0 = row * self.resolution;
        let c0 = col * self.resolution;
        Ok((
            r0..(r0 + self.resolution).min(self.shape.0),
            c0..(c0 + self.resolution).min(self.shape.1),
        ))
    }

    /// Flat pixel indices of a gid, row-major within its block.
    pub fn flat_excl_ind(&self, gid: Gid) -> Result<Vec<usize>> {
        let (rows, cols) = self.excl_slices(gid)?;
        let width = self.shape.1;
        Ok(rows
            .flat_map(|r| cols.clone().map(move |c| r * width + c))
            .collect())
    }

    /// Per-pixel coordinates of a gid read from a container holding `latitude`/`longitude`
    /// datasets of the raster shape (the exclusion file or a cached tech map).
    ///
    /// Coordinates are `DVec2 { x: longitude, y: latitude }`, row-major within the block, and
    /// rounded to `f32`, the precision tech-map files store them with. A run reading the
    /// exclusion meta and a rerun reading the stored copy therefore see identical pixels.
    pub fn read_coords(&self, container: &Container, gid: Gid) -> Result<Vec<DVec2>> {
        let (rows, cols) = self.excl_slices(gid)?;
        let lat = container.read_window_f64(LATITUDE, rows.clone(), cols.clone())?;
        let lon = container.read_window_f64(LONGITUDE, rows, cols)?;
        Ok(lon
            .into_iter()
            .zip(lat)
            .map(|(x, y)| DVec2::new(round_to_stored(x), round_to_stored(y)))
            .collect())
    }
}

fn round_to_stored(degrees: f64) -> f64 {
    f64::from(degrees as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{write_coordinate_grid, write_exclusions};

    #[test]
    fn hundred_by_hundred_at_ten_has_hundred_gids() {
        let extent = ExclusionExtent::new("excl.tmap", (100, 100), 10).unwrap();
        assert_eq!(extent.len(), 100);
        assert_eq!(extent.grid_dims(), (10, 10));
        assert_eq!(extent.n_pixels(), 10_000);
    }

    #[test]
    fn edge_blocks_are_clipped() {
        let extent = ExclusionExtent::new("excl.tmap", (7, 5), 3).unwrap();
        assert_eq!(extent.grid_dims(), (3, 2));
        assert_eq!(extent.excl_slices(0).unwrap(), (0..3, 0..3));
        assert_eq!(extent.excl_slices(1).unwrap(), (0..3, 3..5));
        assert_eq!(extent.excl_slices(5).unwrap(), (6..7, 3..5));
        assert!(extent.excl_slices(6).is_err());
    }

    #[test]
    fn flat_indices_cover_raster_exactly_once() {
        let extent = ExclusionExtent::new("excl.tmap", (7, 5), 3).unwrap();
        let mut seen = vec![0u8; extent.n_pixels()];
        for gid in extent.gids() {
            for i in extent.flat_excl_ind(gid).unwrap() {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
        assert_eq!(extent.flat_excl_ind(5).unwrap(), vec![33, 34]);
    }

    #[test]
    fn zero_resolution_is_rejected() {
        assert!(matches!(
            ExclusionExtent::new("excl.tmap", (4, 4), 0),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn open_reads_shape_and_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("excl.tmap");
        write_exclusions(&path, (4, 6), (40.0, -105.0), 0.01);

        let extent = ExclusionExtent::open(&path, 3).unwrap();
        assert_eq!(extent.shape(), (4, 6));
        assert_eq!(extent.len(), 4);

        let container = Container::open(&path).unwrap();
        let coords = extent.read_coords(&container, 3).unwrap();
        assert_eq!(coords.len(), 3);
        // gid 3 starts at row 3, col 3.
        assert!((coords[0].y - (40.0 - 0.03)).abs() < 1e-5);
        assert!((coords[0].x - (-105.0 + 0.03)).abs() < 1e-5);
    }

    #[test]
    fn double_precision_meta_is_rounded_to_stored_precision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("excl.tmap");
        write_coordinate_grid(&path, (1, 2), &[40.001f64, 40.001], &[-105.0f64, -104.999]);

        let extent = ExclusionExtent::open(&path, 2).unwrap();
        let container = Container::open(&path).unwrap();
        let coords = extent.read_coords(&container, 0).unwrap();
        assert_eq!(coords[0].y, f64::from(40.001f64 as f32));
        assert_eq!(coords[1].x, f64::from(-104.999f64 as f32));
        assert_ne!(coords[0].y, 40.001);
    }
}
