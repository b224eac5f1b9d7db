//! Orchestration of the resource and generation mapping passes.
use std::num::NonZeroUsize;
use std::thread;

use tracing::info;

use crate::container::Provenance;
use crate::error::{Error, Result};
use crate::events::{EventSink, MapPass, TechMapEvent};
use crate::extent::{ExclusionExtent, Gid};
use crate::resource::Resource;

use super::config::TechMapConfig;
use super::mapper::{
    map_gen_gids, map_resource_gids, open_resource_map, GenMapParams, ResourceBatch,
    ResourceMapParams,
};
use super::scheduler::{run_batches, split_gids, Batch};
use super::store::{normalize_output_path, save_tech_map, validate_output, SaveRequest};
use super::{CoordMap, IndexMap};

/// Margin added to the half-diagonal of the closest site spacing.
const INFERRED_BOUND_MARGIN: f64 = 1.05;

/// Maps exclusion pixels onto resource or generation sites and persists the result.
#[derive(Debug)]
pub struct TechMapping {
    config: TechMapConfig,
    extent: ExclusionExtent,
    workers: usize,
    output_exists: bool,
    distance_upper_bound: Option<f64>,
}

impl TechMapping {
    /// Validates `config` and an existing output file, and opens the exclusion extent.
    ///
    /// A missing `.tmap` extension on the output path is appended.
    pub fn try_new(mut config: TechMapConfig, sink: &mut dyn EventSink) -> Result<Self> {
        config.validate()?;
        config.fpath_out = normalize_output_path(config.fpath_out);
        let output_exists =
            validate_output(&config.fpath_out, &config.fpath_excl, &config.dset, sink)?;
        let extent = ExclusionExtent::open(&config.fpath_excl, config.resolution)?;
        let workers = config.workers.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        });

        Ok(Self {
            distance_upper_bound: config.distance_upper_bound,
            config,
            extent,
            workers,
            output_exists,
        })
    }

    pub fn config(&self) -> &TechMapConfig {
        &self.config
    }

    pub fn extent(&self) -> &ExclusionExtent {
        &self.extent
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Configured bound, or one inferred from the latitudes of the mapped file's sites.
    pub fn distance_upper_bound(&mut self) -> Result<f64> {
        if let Some(bound) = self.distance_upper_bound {
            return Ok(bound);
        }
        let lats = Resource::open(&self.config.fpath_map)?.get_meta_arr("latitude")?;
        let bound = infer_distance_upper_bound(&lats)?;
        info!("Distance upper bound was inferred to be: {}.", bound);
        self.distance_upper_bound = Some(bound);
        Ok(bound)
    }

    fn batches(&self) -> Vec<Batch> {
        split_gids(self.extent.gids(), self.config.gids_per_batch)
    }

    fn run_started(&self, pass: MapPass, batches: usize, sink: &mut dyn EventSink) {
        info!(
            "Running {} tech mapping of {} gids in {} batches on {} workers into '{}'.",
            pass,
            self.extent.len(),
            batches,
            self.workers,
            self.config.dset
        );
        sink.send(TechMapEvent::RunStarted {
            pass,
            dataset: self.config.dset.clone(),
            gids: self.extent.len(),
            batches,
            workers: self.workers,
        });
    }

    /// Maps every exclusion pixel to its nearest resource site and saves the index map
    /// together with the pixel coordinates (when the output does not hold them yet).
    pub fn map_resource(&mut self, sink: &mut dyn EventSink) -> Result<IndexMap> {
        let bound = self.distance_upper_bound()?;
        let params = ResourceMapParams {
            fpath_excl: self.config.fpath_excl.clone(),
            fpath_res: self.config.fpath_map.clone(),
            coord_cache: self.output_exists.then(|| self.config.fpath_out.clone()),
            distance_upper_bound: bound,
            resolution: self.config.resolution,
            margin: self.config.margin,
        };

        let shape = self.extent.shape();
        let mut index = IndexMap::unmapped(shape);
        let mut coords = (!self.output_exists).then(|| CoordMap::zeros(shape));
        let batches = self.batches();
        self.run_started(MapPass::Resource, batches.len(), sink);

        let extent = &self.extent;
        run_batches(
            &batches,
            self.workers,
            |batch| map_resource_gids(&batch.gids, &params),
            |batch: &Batch, result: ResourceBatch| {
                let per_gid = result.index.iter().zip(&result.coords);
                check_batch_len(batch, result.index.len())?;
                for (&gid, (ids, pixels)) in batch.gids.iter().zip(per_gid) {
                    let flat = flat_indices(extent, gid, ids.len())?;
                    index.scatter(&flat, ids);
                    if let Some(coords) = coords.as_mut() {
                        coords.scatter(&flat, pixels);
                    }
                }
                Ok(())
            },
            sink,
        )?;

        self.finish(
            MapPass::Resource,
            &index,
            coords.as_ref(),
            Provenance::new(&self.config.fpath_map, Some(bound), &self.config.dset),
            sink,
        )?;
        Ok(index)
    }

    /// Re-keys the stored resource map `res_dset` to generation rows and saves the result.
    pub fn map_generation(&mut self, res_dset: &str, sink: &mut dyn EventSink) -> Result<IndexMap> {
        let recorded_bound = {
            let tech_map = open_resource_map(&self.config.fpath_out, res_dset)?;
            tech_map
                .provenance(res_dset)?
                .and_then(|p| p.distance_upper_bound)
        };
        let params = GenMapParams {
            fpath_excl: self.config.fpath_excl.clone(),
            fpath_gen: self.config.fpath_map.clone(),
            fpath_out: self.config.fpath_out.clone(),
            res_dset: res_dset.to_string(),
            resolution: self.config.resolution,
        };

        let mut index = IndexMap::unmapped(self.extent.shape());
        let batches = self.batches();
        self.run_started(MapPass::Generation, batches.len(), sink);

        let extent = &self.extent;
        run_batches(
            &batches,
            self.workers,
            |batch| map_gen_gids(&batch.gids, &params),
            |batch: &Batch, rows: Vec<Vec<i32>>| {
                check_batch_len(batch, rows.len())?;
                for (&gid, ids) in batch.gids.iter().zip(&rows) {
                    index.scatter(&flat_indices(extent, gid, ids.len())?, ids);
                }
                Ok(())
            },
            sink,
        )?;

        let bound = recorded_bound.or(self.config.distance_upper_bound);
        self.finish(
            MapPass::Generation,
            &index,
            None,
            Provenance::new(&self.config.fpath_map, bound, &self.config.dset),
            sink,
        )?;
        Ok(index)
    }

    fn finish(
        &mut self,
        pass: MapPass,
        index: &IndexMap,
        coords: Option<&CoordMap>,
        provenance: Provenance,
        sink: &mut dyn EventSink,
    ) -> Result<()> {
        let mapped = index.mapped_count();
        info!(
            "Finished {} tech mapping: {} of {} pixels mapped.",
            pass,
            mapped,
            index.len()
        );
        sink.send(TechMapEvent::RunFinished {
            pass,
            mapped,
            unmapped: index.len() - mapped,
        });

        save_tech_map(
            SaveRequest {
                fpath_out: &self.config.fpath_out,
                fpath_excl: &self.config.fpath_excl,
                dset: &self.config.dset,
                index,
                coords,
                provenance,
                chunks: self.config.chunks,
            },
            sink,
        )?;
        self.output_exists = true;
        Ok(())
    }

    /// Runs the resource pass: `config.fpath_map` is the resource file.
    pub fn run_resource_map(config: TechMapConfig, sink: &mut dyn EventSink) -> Result<IndexMap> {
        Self::try_new(config, sink)?.map_resource(sink)
    }

    /// Runs the generation pass: `config.fpath_map` is the generation file and `res_dset` the
    /// resource map already stored in `config.fpath_out`.
    pub fn run_gen_map(
        config: TechMapConfig,
        res_dset: &str,
        sink: &mut dyn EventSink,
    ) -> Result<IndexMap> {
        Self::try_new(config, sink)?.map_generation(res_dset, sink)
    }
}

/// Half the diagonal of the smallest nonzero latitude step between consecutive sites
/// (wrapping from the last to the first), plus 5%.
pub fn infer_distance_upper_bound(lats: &[f64]) -> Result<f64> {
    let n = lats.len();
    let min_gap = (0..n)
        .map(|i| (lats[i] - lats[(i + n - 1) % n]).abs())
        .filter(|gap| *gap != 0.0)
        .fold(f64::INFINITY, f64::min);
    if !min_gap.is_finite() {
        return Err(Error::InvalidConfig(
            "cannot infer distance_upper_bound: resource sites have no distinct latitudes".into(),
        ));
    }
    Ok(INFERRED_BOUND_MARGIN * std::f64::consts::SQRT_2 * (min_gap / 2.0))
}

fn check_batch_len(batch: &Batch, len: usize) -> Result<()> {
    if len != batch.gids.len() {
        return Err(Error::Worker(format!(
            "batch {} returned {} results for {} gids",
            batch.id,
            len,
            batch.gids.len()
        )));
    }
    Ok(())
}

fn flat_indices(extent: &ExclusionExtent, gid: Gid, len: usize) -> Result<Vec<usize>> {
    let flat = extent.flat_excl_ind(gid)?;
    if flat.len() != len {
        return Err(Error::Worker(format!(
            "gid {gid} returned {len} values for {} pixels",
            flat.len()
        )));
    }
    Ok(flat)
}
