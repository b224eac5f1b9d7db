use glam::DVec2;
use techmap::prelude::*;
use techmap_examples::{init_tracing, write_exclusions, write_resource, ExclusionGrid, SiteCloud};
use tracing::info;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let dir = std::env::temp_dir().join("techmap-resource-map-synthetic");
    std::fs::create_dir_all(&dir)?;

    // 1 km-ish pixels over roughly half a degree, sites every 0.04 degrees.
    let grid = ExclusionGrid::new((512, 512), DVec2::new(-105.0, 40.0), 0.001);
    let sites = SiteCloud::lattice(&grid, 0.04, 0.1, 0.0, 2025);
    write_exclusions(&dir.join("excl.tmap"), &grid)?;
    write_resource(&dir.join("res.tmap"), &sites)?;
    info!("Wrote {} resource sites to {}.", sites.len(), dir.display());

    // Leave the distance bound unset so it is inferred from the lattice spacing.
    let config = TechMapConfig::new(
        dir.join("excl.tmap"),
        dir.join("res.tmap"),
        dir.join("techmap"),
        "res_map",
    )
    .with_resolution(64);

    let mut sink = FnSink::new(|event| {
        if let TechMapEvent::RunFinished {
            mapped, unmapped, ..
        } = event
        {
            info!("{} pixels mapped, {} unmapped.", mapped, unmapped);
        }
    });
    let map = TechMapping::run_resource_map(config, &mut sink)?;

    let (rows, cols) = map.shape();
    for (row, col) in [(0, 0), (rows / 2, cols / 2), (rows - 1, cols - 1)] {
        info!("Pixel ({}, {}) -> {:?}.", row, col, map.get(row, col));
    }
    Ok(())
}
