#![forbid(unsafe_code)]

mod logging;
mod synthetic;

pub use logging::init_tracing;
pub use synthetic::{
    write_exclusions, write_generation, write_resource, write_wind, ExclusionGrid, SiteCloud,
};
