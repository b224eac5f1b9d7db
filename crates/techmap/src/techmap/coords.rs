//! Coordinate extraction for gid batches.
//!
//! Pixel coordinates come from the cached `latitude`/`longitude` of an existing tech-map file
//! when one is given, otherwise from the exclusion meta. The batch bounding box is consumed by
//! the resource mapper to prune candidate sites.
use glam::DVec2;

use crate::container::Container;
use crate::error::Result;
use crate::extent::{ExclusionExtent, Gid};

/// Axis-aligned box in degrees, `x` = longitude, `y` = latitude.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: DVec2,
    pub max: DVec2,
}

impl BoundingBox {
    /// Smallest box around `points`, or `None` when there are none.
    pub fn from_points(points: &[DVec2]) -> Option<Self> {
        let first = *points.first()?;
        Some(points.iter().fold(
            BoundingBox {
                min: first,
                max: first,
            },
            |bbox, p| bbox.including(*p),
        ))
    }

    pub fn including(self, p: DVec2) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Returns `true` when `p` is inside the box or at most `margin` outside it along each
    /// axis, borders included.
    ///
    /// Each axis gap is the same difference the point-to-pixel distance is built from, so a site
    /// within `margin` of any pixel in the box is never rejected.
    pub fn within_margin(&self, p: DVec2, margin: f64) -> bool {
        self.min.x - p.x <= margin
            && p.x - self.max.x <= margin
            && self.min.y - p.y <= margin
            && p.y - self.max.y <= margin
    }
}

/// Coordinates of a gid batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchCoords {
    /// One entry per gid, in input order; pixels row-major within the gid block.
    pub coords: Vec<Vec<DVec2>>,
    /// Box around every pixel of the batch; `None` for an empty batch.
    pub bbox: Option<BoundingBox>,
}

/// Extracts per-gid pixel coordinates and the batch bounding box.
///
/// `cached` is an opened tech-map file with `latitude`/`longitude` datasets; `exclusions` the
/// opened exclusion file. The cache wins when present.
pub fn extract_coords(
    gids: &[Gid],
    extent: &ExclusionExtent,
    exclusions: &Container,
    cached: Option<&Container>,
) -> Result<BatchCoords> {
    let source = cached.unwrap_or(exclusions);

    let mut out = BatchCoords {
        coords: Vec::with_capacity(gids.len()),
        bbox: None,
    };
    for &gid in gids {
        let coords = extent.read_coords(source, gid)?;
        if let Some(gid_box) = BoundingBox::from_points(&coords) {
            out.bbox = Some(match out.bbox {
                Some(bbox) => bbox.union(gid_box),
                None => gid_box,
            });
        }
        out.coords.push(coords);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerWriter;
    use crate::extent::{LATITUDE, LONGITUDE};
    use crate::test_support::write_exclusions;

    #[test]
    fn bbox_tracks_extremes_and_expands() {
        let points = [
            DVec2::new(-105.0, 40.0),
            DVec2::new(-104.5, 39.0),
            DVec2::new(-104.8, 41.0),
        ];
        let bbox = BoundingBox::from_points(&points).unwrap();
        assert_eq!(bbox.min, DVec2::new(-105.0, 39.0));
        assert_eq!(bbox.max, DVec2::new(-104.5, 41.0));
        assert!(BoundingBox::from_points(&[]).is_none());
    }

    #[test]
    fn margin_test_includes_the_border() {
        let bbox = BoundingBox::from_points(&[DVec2::new(-105.0, 40.0), DVec2::new(-104.5, 40.25)])
            .unwrap();
        assert!(bbox.within_margin(DVec2::new(-104.75, 40.1), 0.0));
        assert!(bbox.within_margin(DVec2::new(-104.75, 40.5), 0.25));
        assert!(bbox.within_margin(DVec2::new(-105.25, 39.75), 0.25));
        assert!(!bbox.within_margin(DVec2::new(-104.75, 40.5), 0.125));
        assert!(!bbox.within_margin(DVec2::new(-104.0, 40.0), 0.25));
    }

    #[test]
    fn extract_reads_exclusion_meta_and_unions_boxes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("excl.tmap");
        write_exclusions(&path, (4, 4), (40.0, -105.0), 0.25);
        let extent = ExclusionExtent::open(&path, 2).unwrap();
        let excl = Container::open(&path).unwrap();

        let batch = extract_coords(&[0, 3], &extent, &excl, None).unwrap();
        assert_eq!(batch.coords.len(), 2);
        assert_eq!(batch.coords[0].len(), 4);
        let bbox = batch.bbox.unwrap();
        assert_eq!(bbox.min, DVec2::new(-105.0, 39.25));
        assert_eq!(bbox.max, DVec2::new(-104.25, 40.0));
    }

    #[test]
    fn cached_coordinates_take_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let excl_path = dir.path().join("excl.tmap");
        let cache_path = dir.path().join("cache.tmap");
        write_exclusions(&excl_path, (2, 2), (40.0, -105.0), 0.25);

        let mut writer = ContainerWriter::create(&cache_path).unwrap();
        writer
            .write_dataset(LATITUDE, [2, 2], [2, 2], &[10.0f32; 4], None)
            .unwrap();
        writer
            .write_dataset(LONGITUDE, [2, 2], [2, 2], &[20.0f32; 4], None)
            .unwrap();
        writer.finish().unwrap();

        let extent = ExclusionExtent::open(&excl_path, 2).unwrap();
        let excl = Container::open(&excl_path).unwrap();
        let cache = Container::open(&cache_path).unwrap();
        let batch = extract_coords(&[0], &extent, &excl, Some(&cache)).unwrap();
        assert!(batch.coords[0].iter().all(|p| *p == DVec2::new(20.0, 10.0)));
    }

    #[test]
    fn empty_batch_has_no_bbox() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("excl.tmap");
        write_exclusions(&path, (2, 2), (40.0, -105.0), 0.25);
        let extent = ExclusionExtent::open(&path, 2).unwrap();
        let excl = Container::open(&path).unwrap();
        let batch = extract_coords(&[], &extent, &excl, None).unwrap();
        assert!(batch.coords.is_empty());
        assert!(batch.bbox.is_none());
    }
}
