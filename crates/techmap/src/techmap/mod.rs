//! Tech mapping: nearest-neighbor association of exclusion pixels with resource and
//! generation sites.
//!
//! - [`coords`]: per-gid pixel coordinates and batch bounding boxes
//! - [`mapper`]: stateless batch workers for the resource and generation passes
//! - [`scheduler`]: batch partitioning and the parallel map/scatter loop
//! - [`store`]: output validation, persistence and read-back
//! - [`runner`]: the [`TechMapping`](runner::TechMapping) orchestrator
pub mod config;
pub mod coords;
pub mod mapper;
pub mod runner;
pub mod scheduler;
pub mod store;

use crate::error::{Error, Result};

/// Dense on-disk encoding of [`MappedSite::Unmapped`].
pub const UNMAPPED: i32 = -1;

/// Result of mapping one pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MappedSite {
    /// 0-based resource-site or generation-row id.
    Site(u32),
    /// No site within the distance bound, or no generation row for the resource site.
    Unmapped,
}

impl MappedSite {
    /// Largest id the dense `i32` encoding can hold.
    pub const MAX_ID: u32 = i32::MAX as u32;

    /// Decodes the dense `i32` encoding; any negative value is unmapped.
    pub fn from_raw(raw: i32) -> Self {
        u32::try_from(raw).map_or(MappedSite::Unmapped, MappedSite::Site)
    }

    /// Encodes as `i32`; ids above [`MAX_ID`](Self::MAX_ID) are an error.
    pub fn to_raw(self) -> Result<i32> {
        match self {
            MappedSite::Site(id) => i32::try_from(id).map_err(|_| {
                Error::OutOfBounds(format!("site id {id} exceeds the i32 index encoding"))
            }),
            MappedSite::Unmapped => Ok(UNMAPPED),
        }
    }

    pub fn site(self) -> Option<u32> {
        match self {
            MappedSite::Site(id) => Some(id),
            MappedSite::Unmapped => None,
        }
    }
}

/// Full-raster index map, row-major, densely encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexMap {
    shape: (usize, usize),
    data: Vec<i32>,
}

impl IndexMap {
    /// A map of the given shape with every pixel unmapped.
    pub fn unmapped(shape: (usize, usize)) -> Self {
        Self {
            shape,
            data: vec![UNMAPPED; shape.0 * shape.1],
        }
    }

    /// Wraps raw values; `None` when the length does not match the shape.
    pub fn from_raw(shape: (usize, usize), data: Vec<i32>) -> Option<Self> {
        (data.len() == shape.0 * shape.1).then_some(Self { shape, data })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Site at pixel `(row, col)`; out-of-range pixels are unmapped.
    pub fn get(&self, row: usize, col: usize) -> MappedSite {
        if row >= self.shape.0 || col >= self.shape.1 {
            return MappedSite::Unmapped;
        }
        MappedSite::from_raw(self.data[row * self.shape.1 + col])
    }

    /// Site at a flat pixel index.
    pub fn get_flat(&self, index: usize) -> MappedSite {
        self.data
            .get(index)
            .copied()
            .map_or(MappedSite::Unmapped, MappedSite::from_raw)
    }

    pub fn iter(&self) -> impl Iterator<Item = MappedSite> + '_ {
        self.data.iter().copied().map(MappedSite::from_raw)
    }

    /// Number of pixels that resolved to a site.
    pub fn mapped_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != UNMAPPED).count()
    }

    pub fn as_raw(&self) -> &[i32] {
        &self.data
    }

    /// Writes `values` at the given flat pixel indices.
    pub(crate) fn scatter(&mut self, indices: &[usize], values: &[i32]) {
        debug_assert_eq!(indices.len(), values.len());
        for (&i, &v) in indices.iter().zip(values) {
            self.data[i] = v;
        }
    }
}

/// Full-raster pixel coordinates, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct CoordMap {
    pub shape: (usize, usize),
    pub latitude: Vec<f32>,
    pub longitude: Vec<f32>,
}

impl CoordMap {
    pub fn zeros(shape: (usize, usize)) -> Self {
        let n = shape.0 * shape.1;
        Self {
            shape,
            latitude: vec![0.0; n],
            longitude: vec![0.0; n],
        }
    }

    pub(crate) fn scatter(&mut self, indices: &[usize], coords: &[glam::DVec2]) {
        debug_assert_eq!(indices.len(), coords.len());
        for (&i, p) in indices.iter().zip(coords) {
            self.latitude[i] = p.y as f32;
            self.longitude[i] = p.x as f32;
        }
    }
}
