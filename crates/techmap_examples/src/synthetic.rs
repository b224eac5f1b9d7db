//! Synthetic exclusion, resource, generation and wind files for the example binaries.
use std::path::Path;

use glam::DVec2;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use techmap::prelude::{ContainerWriter, Result, LATITUDE, LONGITUDE};

/// Regular lat/lon raster: pixel `(r, c)` sits at `origin + (c * step, -r * step)`.
#[derive(Clone, Copy, Debug)]
pub struct ExclusionGrid {
    pub shape: (usize, usize),
    /// Top-left pixel as `x` = longitude, `y` = latitude.
    pub origin: DVec2,
    pub step: f64,
}

impl ExclusionGrid {
    pub fn new(shape: (usize, usize), origin: DVec2, step: f64) -> Self {
        Self {
            shape,
            origin,
            step,
        }
    }

    pub fn pixel(&self, row: usize, col: usize) -> DVec2 {
        self.origin + DVec2::new(col as f64 * self.step, -(row as f64) * self.step)
    }

    /// Lower-left and upper-right corners of the raster footprint.
    pub fn bounds(&self) -> (DVec2, DVec2) {
        let (rows, cols) = self.shape;
        let far = self.pixel(rows.saturating_sub(1), cols.saturating_sub(1));
        (
            DVec2::new(self.origin.x, far.y),
            DVec2::new(far.x, self.origin.y),
        )
    }
}

/// Resource sites on a lattice covering a grid's footprint plus `overhang` degrees.
#[derive(Clone, Debug)]
pub struct SiteCloud {
    pub sites: Vec<DVec2>,
}

impl SiteCloud {
    /// Sites every `spacing` degrees, each displaced by up to `jitter * spacing / 2`.
    pub fn lattice(
        grid: &ExclusionGrid,
        spacing: f64,
        overhang: f64,
        jitter: f64,
        seed: u64,
    ) -> Self {
        let (min, max) = grid.bounds();
        let min = min - DVec2::splat(overhang);
        let max = max + DVec2::splat(overhang);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut sites = Vec::new();
        let mut y = max.y;
        while y >= min.y {
            let mut x = min.x;
            while x <= max.x {
                let offset = DVec2::new(rng.random::<f64>() - 0.5, rng.random::<f64>() - 0.5);
                sites.push(DVec2::new(x, y) + offset * jitter * spacing);
                x += spacing;
            }
            y -= spacing;
        }
        Self { sites }
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

pub fn write_exclusions(path: &Path, grid: &ExclusionGrid) -> Result<()> {
    let (rows, cols) = grid.shape;
    let mut lat = Vec::with_capacity(rows * cols);
    let mut lon = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            let p = grid.pixel(r, c);
            lat.push(p.y as f32);
            lon.push(p.x as f32);
        }
    }
    let mut writer = ContainerWriter::create(path)?;
    writer.write_dataset(LATITUDE, [rows, cols], [128, 128], &lat, None)?;
    writer.write_dataset(LONGITUDE, [rows, cols], [128, 128], &lon, None)?;
    writer.finish()
}

pub fn write_resource(path: &Path, cloud: &SiteCloud) -> Result<()> {
    let lat: Vec<f64> = cloud.sites.iter().map(|p| p.y).collect();
    let lon: Vec<f64> = cloud.sites.iter().map(|p| p.x).collect();
    let mut writer = ContainerWriter::create(path)?;
    writer.write_column("meta/latitude", &lat)?;
    writer.write_column("meta/longitude", &lon)?;
    writer.finish()
}

/// Generation file simulated from every `stride`-th resource site.
pub fn write_generation(path: &Path, cloud: &SiteCloud, stride: usize) -> Result<()> {
    let picked: Vec<usize> = (0..cloud.len()).step_by(stride.max(1)).collect();
    let gids: Vec<i64> = picked.iter().map(|&i| i as i64).collect();
    let lat: Vec<f64> = picked.iter().map(|&i| cloud.sites[i].y).collect();
    let lon: Vec<f64> = picked.iter().map(|&i| cloud.sites[i].x).collect();
    let mut writer = ContainerWriter::create(path)?;
    writer.write_column("meta/gid", &gids)?;
    writer.write_column("meta/latitude", &lat)?;
    writer.write_column("meta/longitude", &lon)?;
    writer.finish()
}

/// Single-site wind file with speed and direction at the given heights.
pub fn write_wind(path: &Path, heights: &[u32], timesteps: usize, seed: u64) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let base: Vec<f64> = (0..timesteps)
        .map(|_| 4.0 + rng.random::<f64>() * 6.0)
        .collect();
    let veer: Vec<f64> = (0..timesteps)
        .map(|_| rng.random::<f64>() * 360.0)
        .collect();

    let mut writer = ContainerWriter::create(path)?;
    writer.write_column("meta/latitude", &[40.0f64])?;
    writer.write_column("meta/longitude", &[-105.0f64])?;
    for &h in heights {
        let speed: Vec<f64> = base.iter().map(|v| v * (h as f64 / 100.0).powf(0.14)).collect();
        let direction: Vec<f64> = veer
            .iter()
            .map(|d| (d + h as f64 * 0.05).rem_euclid(360.0))
            .collect();
        writer.write_dataset(
            &format!("windspeed_{h}m"),
            [timesteps, 1],
            [1024, 1],
            &speed,
            None,
        )?;
        writer.write_dataset(
            &format!("winddirection_{h}m"),
            [timesteps, 1],
            [1024, 1],
            &direction,
            None,
        )?;
    }
    writer.finish()
}
