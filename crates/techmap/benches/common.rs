use std::path::Path;
use std::time::Duration;

use criterion::{Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use techmap::prelude::{ContainerWriter, LATITUDE, LONGITUDE};

pub const SAMPLE_SIZE: usize = 20;
pub const WARM_UP: Duration = Duration::from_secs(1);
pub const MEASUREMENT_TIME: Duration = Duration::from_secs(2);

/// Pixel spacing of the synthetic exclusion raster in degrees.
pub const PIXEL_STEP: f64 = 0.001;

pub fn default_criterion() -> Criterion {
    Criterion::default()
        .configure_from_args()
        .sample_size(SAMPLE_SIZE)
        .warm_up_time(WARM_UP)
        .measurement_time(MEASUREMENT_TIME)
}

pub fn elements_throughput(elements: usize) -> Throughput {
    Throughput::Elements(elements.max(1) as u64)
}

/// Square exclusion raster anchored at 40N, 105W.
pub fn write_exclusions(path: &Path, size: usize) {
    let mut lat = Vec::with_capacity(size * size);
    let mut lon = Vec::with_capacity(size * size);
    for r in 0..size {
        for c in 0..size {
            lat.push((40.0 - r as f64 * PIXEL_STEP) as f32);
            lon.push((-105.0 + c as f64 * PIXEL_STEP) as f32);
        }
    }
    let mut writer = ContainerWriter::create(path).expect("create exclusions");
    writer
        .write_dataset(LATITUDE, [size, size], [128, 128], &lat, None)
        .expect("write latitude");
    writer
        .write_dataset(LONGITUDE, [size, size], [128, 128], &lon, None)
        .expect("write longitude");
    writer.finish().expect("finish exclusions");
}

/// `n_sites` resource sites scattered uniformly over the raster footprint.
#[allow(dead_code)]
pub fn write_resource(path: &Path, size: usize, n_sites: usize, seed: u64) {
    let span = size as f64 * PIXEL_STEP;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut lat = Vec::with_capacity(n_sites);
    let mut lon = Vec::with_capacity(n_sites);
    for _ in 0..n_sites {
        lat.push(40.0 - rng.random::<f64>() * span);
        lon.push(-105.0 + rng.random::<f64>() * span);
    }
    let mut writer = ContainerWriter::create(path).expect("create resource");
    writer
        .write_column("meta/latitude", &lat)
        .expect("write latitude");
    writer
        .write_column("meta/longitude", &lon)
        .expect("write longitude");
    writer.finish().expect("finish resource");
}
