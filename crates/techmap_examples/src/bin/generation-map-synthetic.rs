use glam::DVec2;
use techmap::prelude::*;
use techmap_examples::{
    init_tracing, write_exclusions, write_generation, write_resource, ExclusionGrid, SiteCloud,
};
use tracing::info;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let dir = std::env::temp_dir().join("techmap-generation-map-synthetic");
    std::fs::create_dir_all(&dir)?;

    let grid = ExclusionGrid::new((256, 256), DVec2::new(-105.0, 40.0), 0.002);
    let sites = SiteCloud::lattice(&grid, 0.05, 0.1, 0.5, 42);
    write_exclusions(&dir.join("excl.tmap"), &grid)?;
    write_resource(&dir.join("res.tmap"), &sites)?;
    // Only every third resource site was simulated.
    write_generation(&dir.join("gen.tmap"), &sites, 3)?;

    let out = dir.join("techmap.tmap");
    let _ = std::fs::remove_file(&out);

    let res_config = TechMapConfig::new(dir.join("excl.tmap"), dir.join("res.tmap"), &out, "res_map")
        .with_resolution(64)
        .with_distance_upper_bound(0.05);
    let res_map = TechMapping::run_resource_map(res_config, &mut ())?;

    let gen_config = TechMapConfig::new(dir.join("excl.tmap"), dir.join("gen.tmap"), &out, "gen_map")
        .with_resolution(64);
    let mut sink = VecSink::new();
    let gen_map = TechMapping::run_gen_map(gen_config, "res_map", &mut sink)?;

    info!(
        "Resource map covers {} pixels, generation map {} of {}.",
        res_map.mapped_count(),
        gen_map.mapped_count(),
        gen_map.len()
    );
    for warning in sink.warnings(WarningCategory::FileInput) {
        info!("Warning: {}", warning);
    }

    let stored = read_index_map(&out, "gen_map")?;
    anyhow::ensure!(stored == gen_map, "stored generation map differs");
    Ok(())
}
