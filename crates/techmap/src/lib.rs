#![forbid(unsafe_code)]
//! techmap: nearest-neighbor mapping of exclusion raster pixels to resource and generation sites.
//!
//! Modules:
//! - container: zarr-backed chunked datasets with provenance (`.tmap` hierarchies)
//! - extent: supply-curve gid addressing over the exclusion raster
//! - resource: read-only access to resource/generation site files and wind height interpolation
//! - techmap: batch mappers, parallel scheduler, output store and the `TechMapping` orchestrator
//! - events: run events and warning sinks
//!
//! Runnable examples live in the `techmap_examples` crate.
pub mod container;
pub mod error;
pub mod events;
pub mod extent;
pub mod resource;
pub mod techmap;

#[cfg(test)]
mod test_support;

/// Convenient re-exports for common types. Import with `use techmap::prelude::*;`.
pub mod prelude {
    pub use crate::container::{Container, ContainerWriter, DType, Provenance};
    pub use crate::error::{Error, Result};
    pub use crate::events::{
        EventSink, FnSink, MapPass, TechMapEvent, VecSink, WarningCategory,
    };
    pub use crate::extent::{ExclusionExtent, Gid, LATITUDE, LONGITUDE};
    pub use crate::resource::{Resource, WindResource};
    pub use crate::techmap::config::TechMapConfig;
    pub use crate::techmap::runner::{infer_distance_upper_bound, TechMapping};
    pub use crate::techmap::store::{normalize_output_path, read_index_map};
    pub use crate::techmap::{CoordMap, IndexMap, MappedSite, UNMAPPED};
}
