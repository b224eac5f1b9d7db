use techmap::prelude::*;
use techmap_examples::{init_tracing, write_wind};
use tracing::info;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let dir = std::env::temp_dir().join("techmap-wind-height-interpolation");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("wind.tmap");
    write_wind(&path, &[40, 80, 120], 48, 7)?;

    let mut wind = WindResource::open(&path)?;
    info!("Stored windspeed heights: {:?}.", wind.heights("windspeed"));

    let mut sink = VecSink::new();
    for name in ["windspeed_100m", "windspeed_160m", "winddirection_100m"] {
        let series = wind.site_series_with_events(name, 0, &mut sink)?;
        info!("{}: first values {:?}.", name, &series[..4]);
    }
    for warning in sink.warnings(WarningCategory::Extrapolation) {
        info!("Extrapolation: {}", warning);
    }
    Ok(())
}
