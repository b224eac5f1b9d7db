//! Read-only accessors for resource and generation site files.
//!
//! Site files are containers with a `meta` group of single-column datasets (one row per site,
//! row position = site id) and optional time-series datasets of shape `[time, sites]`.
//! Resource files carry `meta/latitude` and `meta/longitude`; generation files additionally
//! carry `meta/gid`, the resource-site id each generation row was simulated from.
use std::path::Path;

use glam::DVec2;

use crate::container::{Container, GROUP_SEPARATOR};
use crate::error::{Error, Result};

pub mod wind;

pub use wind::WindResource;

/// Group holding per-site meta columns.
pub const META_GROUP: &str = "meta";

/// Full dataset name of a meta column.
pub fn meta_dataset(field: &str) -> String {
    format!("{META_GROUP}{GROUP_SEPARATOR}{field}")
}

/// Scoped, read-only view of a site file. The file closes when the value drops.
pub struct Resource {
    container: Container,
}

impl Resource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            container: Container::open(path)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.container.path()
    }

    /// Names of the non-meta datasets.
    pub fn dsets(&self) -> Vec<&str> {
        let prefix = format!("{META_GROUP}{GROUP_SEPARATOR}");
        self.container
            .dataset_names()
            .filter(|name| !name.starts_with(&prefix))
            .collect()
    }

    pub fn contains(&self, dset: &str) -> bool {
        self.container.contains(dset)
    }

    /// Number of sites, taken from the first meta column.
    pub fn meta_len(&self) -> Result<usize> {
        let first = self
            .container
            .group(META_GROUP)
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::FileInput(format!(
                    "'{}' has no {META_GROUP} datasets",
                    self.path().display()
                ))
            })?;
        Ok(self.container.dataset(first)?.shape[0])
    }

    /// One meta column for all sites, as `f64`.
    pub fn get_meta_arr(&mut self, field: &str) -> Result<Vec<f64>> {
        self.container.read_column_f64(&meta_dataset(field))
    }

    /// The `gid` meta column of a generation file: resource-site id per generation row.
    pub fn get_meta_gids(&mut self) -> Result<Vec<i64>> {
        self.container.read_column_i64(&meta_dataset("gid"))
    }

    /// Site coordinates as `DVec2 { x: longitude, y: latitude }`.
    pub fn coordinates(&mut self) -> Result<Vec<DVec2>> {
        let lat = self.get_meta_arr("latitude")?;
        let lon = self.get_meta_arr("longitude")?;
        if lat.len() != lon.len() {
            return Err(Error::FileInput(format!(
                "'{}' has {} latitudes but {} longitudes",
                self.path().display(),
                lat.len(),
                lon.len()
            )));
        }
        Ok(lon
            .into_iter()
            .zip(lat)
            .map(|(x, y)| DVec2::new(x, y))
            .collect())
    }

    /// Time series of one site from a `[time, sites]` dataset.
    pub fn site_series(&mut self, dset: &str, site: usize) -> Result<Vec<f64>> {
        let shape = self.container.dataset(dset)?.shape;
        if site >= shape[1] {
            return Err(Error::OutOfBounds(format!(
                "site {site} outside dataset '{dset}' with {} sites",
                shape[1]
            )));
        }
        self.container
            .read_window_f64(dset, 0..shape[0], site..site + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerWriter;
    use crate::test_support::{write_generation, write_resource};

    #[test]
    fn coordinates_pair_longitude_and_latitude() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("res.tmap");
        write_resource(&path, &[(40.0, -105.0), (41.5, -104.0)]);

        let mut res = Resource::open(&path).unwrap();
        assert_eq!(res.meta_len().unwrap(), 2);
        let coords = res.coordinates().unwrap();
        assert_eq!(coords[1], DVec2::new(-104.0, 41.5));
        assert_eq!(res.get_meta_arr("latitude").unwrap(), vec![40.0, 41.5]);
        assert!(res.dsets().is_empty());
    }

    #[test]
    fn generation_gids_are_read_as_integers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gen.tmap");
        write_generation(&path, &[4, 0, 2]);

        let mut generation = Resource::open(&path).unwrap();
        assert_eq!(generation.get_meta_gids().unwrap(), vec![4, 0, 2]);
        assert!(generation.get_meta_arr("latitude").is_err());
    }

    #[test]
    fn site_series_reads_one_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ts.tmap");
        let mut writer = ContainerWriter::create(&path).unwrap();
        writer.write_column("meta/latitude", &[1.0f64, 2.0]).unwrap();
        // 3 timesteps x 2 sites
        let data = [1.0f32, 10.0, 2.0, 20.0, 3.0, 30.0];
        writer
            .write_dataset("windspeed_100m", [3, 2], [2, 2], &data, None)
            .unwrap();
        writer.finish().unwrap();

        let mut res = Resource::open(&path).unwrap();
        assert_eq!(res.dsets(), vec!["windspeed_100m"]);
        assert_eq!(
            res.site_series("windspeed_100m", 1).unwrap(),
            vec![10.0, 20.0, 30.0]
        );
        assert!(matches!(
            res.site_series("windspeed_100m", 2),
            Err(Error::OutOfBounds(_))
        ));
    }
}
