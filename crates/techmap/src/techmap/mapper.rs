//! Batch workers for the resource and generation passes.
//!
//! Workers receive a gid batch plus plain parameters and file paths, open every file they need
//! themselves and close them on return. They never write.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glam::DVec2;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use tracing::debug;

use crate::container::Container;
use crate::error::{Error, Result};
use crate::extent::{ExclusionExtent, Gid};
use crate::resource::Resource;

use super::coords::extract_coords;
use super::{MappedSite, UNMAPPED};

/// A resource site in the R-tree, tagged with its global id.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SitePoint {
    pub id: u32,
    pub point: [f64; 2],
}

impl RTreeObject for SitePoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for SitePoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = point[0] - self.point[0];
        let dy = point[1] - self.point[1];
        dx * dx + dy * dy
    }
}

/// Parameters of one resource-pass batch.
#[derive(Clone, Debug)]
pub struct ResourceMapParams {
    pub fpath_excl: PathBuf,
    pub fpath_res: PathBuf,
    /// Existing tech-map file whose `latitude`/`longitude` replace the exclusion meta.
    pub coord_cache: Option<PathBuf>,
    pub distance_upper_bound: f64,
    pub resolution: usize,
    pub margin: f64,
}

/// Result of one resource-pass batch, one entry per gid in input order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceBatch {
    pub index: Vec<Vec<i32>>,
    pub coords: Vec<Vec<DVec2>>,
}

impl ResourceBatch {
    fn unmapped(coords: Vec<Vec<DVec2>>) -> Self {
        let index = coords.iter().map(|c| vec![UNMAPPED; c.len()]).collect();
        Self { index, coords }
    }
}

/// Maps every pixel of `gids` to its nearest resource site.
///
/// Sites are pruned to those within `max(margin, distance_upper_bound)` of the batch bounding
/// box, borders included, so the result does not depend on how gids are batched.
/// Pixels farther than `distance_upper_bound` from every site, and all pixels of a batch with no
/// candidate sites, map to [`UNMAPPED`].
pub fn map_resource_gids(gids: &[Gid], params: &ResourceMapParams) -> Result<ResourceBatch> {
    let extent = ExclusionExtent::open(&params.fpath_excl, params.resolution)?;
    let batch = {
        let exclusions = Container::open(&params.fpath_excl)?;
        let cache = params
            .coord_cache
            .as_deref()
            .map(Container::open)
            .transpose()?;
        extract_coords(gids, &extent, &exclusions, cache.as_ref())?
    };

    let Some(bbox) = batch.bbox else {
        return Ok(ResourceBatch::unmapped(batch.coords));
    };

    let sites = Resource::open(&params.fpath_res)?.coordinates()?;
    let margin = params.margin.max(params.distance_upper_bound);
    let candidates: Vec<SitePoint> = sites
        .iter()
        .enumerate()
        .filter(|(_, p)| bbox.within_margin(**p, margin))
        .map(|(id, p)| {
            Ok(SitePoint {
                id: site_id(id)?,
                point: [p.x, p.y],
            })
        })
        .collect::<Result<_>>()?;

    if candidates.is_empty() {
        debug!(
            "No resource sites within bounding box of gids {:?}; batch left unmapped.",
            gids
        );
        return Ok(ResourceBatch::unmapped(batch.coords));
    }

    debug!(
        "Mapping gids {:?} against {} of {} resource sites.",
        gids,
        candidates.len(),
        sites.len()
    );
    let tree = RTree::bulk_load(candidates);
    let index = batch
        .coords
        .iter()
        .map(|coords| {
            coords
                .iter()
                .map(|p| nearest_site(&tree, *p, params.distance_upper_bound).to_raw())
                .collect::<Result<Vec<i32>>>()
        })
        .collect::<Result<_>>()?;

    Ok(ResourceBatch {
        index,
        coords: batch.coords,
    })
}

fn site_id(id: usize) -> Result<u32> {
    u32::try_from(id)
        .ok()
        .filter(|id| *id <= MappedSite::MAX_ID)
        .ok_or_else(|| Error::OutOfBounds(format!("site id {id} exceeds the i32 index encoding")))
}

/// Nearest site within `bound`, lowest id on exact distance ties.
fn nearest_site(tree: &RTree<SitePoint>, p: DVec2, bound: f64) -> MappedSite {
    let mut hits = tree.nearest_neighbor_iter_with_distance_2(&[p.x, p.y]);
    let Some((first, best_d2)) = hits.next() else {
        return MappedSite::Unmapped;
    };
    if best_d2.sqrt() > bound {
        return MappedSite::Unmapped;
    }
    let id = hits
        .take_while(|(_, d2)| *d2 == best_d2)
        .fold(first.id, |id, (site, _)| id.min(site.id));
    MappedSite::Site(id)
}

/// Parameters of one generation-pass batch.
#[derive(Clone, Debug)]
pub struct GenMapParams {
    pub fpath_excl: PathBuf,
    pub fpath_gen: PathBuf,
    /// Tech-map file holding the completed resource map.
    pub fpath_out: PathBuf,
    pub res_dset: String,
    pub resolution: usize,
}

/// Re-keys the stored resource map of `gids` to generation-row ids.
///
/// Each resource-site id is looked up in the generation `meta/gid` column; the first row that
/// references it wins. Unmapped pixels and sites without a generation row map to [`UNMAPPED`].
pub fn map_gen_gids(gids: &[Gid], params: &GenMapParams) -> Result<Vec<Vec<i32>>> {
    let extent = ExclusionExtent::open(&params.fpath_excl, params.resolution)?;
    let tech_map = open_resource_map(&params.fpath_out, &params.res_dset)?;
    let lookup = generation_lookup(&params.fpath_gen)?;

    let mut out = Vec::with_capacity(gids.len());
    for &gid in gids {
        let (rows, cols) = extent.excl_slices(gid)?;
        let res_ids = tech_map.read_window_i64(&params.res_dset, rows, cols)?;
        out.push(
            res_ids
                .into_iter()
                .map(|res_id| lookup.get(&res_id).copied().unwrap_or(UNMAPPED))
                .collect(),
        );
    }
    debug!(
        "Mapped gids {:?} to generation rows of {}.",
        gids,
        params.fpath_gen.display()
    );
    Ok(out)
}

/// Opens a tech-map file that must already hold `res_dset`.
pub(crate) fn open_resource_map(fpath_out: &Path, res_dset: &str) -> Result<Container> {
    if !fpath_out.exists() {
        return Err(Error::FileInput(format!(
            "tech map '{}' does not exist; run the resource mapping first",
            fpath_out.display()
        )));
    }
    let container = Container::open(fpath_out)?;
    if !container.contains(res_dset) {
        return Err(Error::FileInput(format!(
            "resource map '{res_dset}' not found in '{}'",
            fpath_out.display()
        )));
    }
    Ok(container)
}

/// Resource-site id to first generation row referencing it.
fn generation_lookup(fpath_gen: &Path) -> Result<HashMap<i64, i32>> {
    let gen_gids = Resource::open(fpath_gen)?.get_meta_gids()?;
    let mut lookup = HashMap::with_capacity(gen_gids.len());
    for (row, res_gid) in gen_gids.into_iter().enumerate() {
        if res_gid < 0 {
            continue;
        }
        let row = i32::try_from(row)
            .map_err(|_| Error::OutOfBounds(format!("generation row {row} exceeds i32")))?;
        lookup.entry(res_gid).or_insert(row);
    }
    Ok(lookup)
}
