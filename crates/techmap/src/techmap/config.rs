//! Configuration for tech-mapping runs.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_RESOLUTION: usize = 2560;
pub const DEFAULT_MARGIN: f64 = 0.1;
pub const DEFAULT_GIDS_PER_BATCH: usize = 2;
pub const DEFAULT_CHUNKS: [usize; 2] = [128, 128];

/// Configuration for a [`TechMapping`](super::runner::TechMapping) pass.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechMapConfig {
    /// Exclusion file (the tech layer) providing raster shape and pixel coordinates.
    pub fpath_excl: PathBuf,
    /// Resource file (resource pass) or generation file (generation pass).
    pub fpath_map: PathBuf,
    /// Output tech-map file; created, or read and extended if it exists.
    pub fpath_out: PathBuf,
    /// Dataset to write the mapping into.
    pub dset: String,
    /// Nearest-neighbor bound in degrees. `None` infers it from resource-site spacing.
    pub distance_upper_bound: Option<f64>,
    /// Edge length in pixels of one supply-curve gid used to batch the work.
    pub resolution: usize,
    /// Worker threads. `None` uses all available cores.
    pub workers: Option<usize>,
    /// Degrees added around a batch's bounding box when pruning candidate sites.
    pub margin: f64,
    /// Gids handled by one worker task.
    pub gids_per_batch: usize,
    /// Chunk shape of the persisted 2D datasets, clipped to the raster shape.
    pub chunks: [usize; 2],
}

impl Default for TechMapConfig {
    fn default() -> Self {
        Self {
            fpath_excl: PathBuf::new(),
            fpath_map: PathBuf::new(),
            fpath_out: PathBuf::new(),
            dset: String::new(),
            distance_upper_bound: None,
            resolution: DEFAULT_RESOLUTION,
            workers: None,
            margin: DEFAULT_MARGIN,
            gids_per_batch: DEFAULT_GIDS_PER_BATCH,
            chunks: DEFAULT_CHUNKS,
        }
    }
}

impl TechMapConfig {
    /// Creates a new [`TechMapConfig`] with default tuning.
    pub fn new(
        fpath_excl: impl Into<PathBuf>,
        fpath_map: impl Into<PathBuf>,
        fpath_out: impl Into<PathBuf>,
        dset: impl Into<String>,
    ) -> Self {
        Self {
            fpath_excl: fpath_excl.into(),
            fpath_map: fpath_map.into(),
            fpath_out: fpath_out.into(),
            dset: dset.into(),
            ..Default::default()
        }
    }

    /// Sets an explicit nearest-neighbor distance bound in degrees.
    pub fn with_distance_upper_bound(mut self, distance_upper_bound: f64) -> Self {
        self.distance_upper_bound = Some(distance_upper_bound);
        self
    }

    /// Sets the supply-curve resolution used to batch the work.
    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution;
        self
    }

    /// Sets the number of worker threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Sets the bounding-box margin in degrees.
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Sets how many gids one worker task handles.
    pub fn with_gids_per_batch(mut self, gids_per_batch: usize) -> Self {
        self.gids_per_batch = gids_per_batch;
        self
    }

    /// Sets the chunk shape of persisted datasets.
    pub fn with_chunks(mut self, chunks: [usize; 2]) -> Self {
        self.chunks = chunks;
        self
    }

    /// Validates the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.dset.is_empty() {
            return Err(Error::InvalidConfig("dset must not be empty".into()));
        }
        if self.resolution == 0 {
            return Err(Error::InvalidConfig("resolution must be > 0".into()));
        }
        if self.gids_per_batch == 0 {
            return Err(Error::InvalidConfig("gids_per_batch must be > 0".into()));
        }
        if self.workers == Some(0) {
            return Err(Error::InvalidConfig("workers must be > 0".into()));
        }
        if let Some(bound) = self.distance_upper_bound {
            if !bound.is_finite() || bound <= 0.0 {
                return Err(Error::InvalidConfig(
                    "distance_upper_bound must be finite and > 0".into(),
                ));
            }
        }
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(Error::InvalidConfig(
                "margin must be finite and >= 0".into(),
            ));
        }
        if self.chunks[0] == 0 || self.chunks[1] == 0 {
            return Err(Error::InvalidConfig("chunks must be > 0".into()));
        }
        Ok(())
    }
}
