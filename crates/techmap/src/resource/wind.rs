//! Wind resource files with height interpolation.
//!
//! Wind datasets are named `<variable>_<height>m` (for example `windspeed_100m`). Requests for a
//! height that is not stored are synthesized from the two nearest stored heights: power law for
//! extrapolated wind speed, circular interpolation for wind direction, linear otherwise.
//! Requests outside the stored range extrapolate with a
//! [`WarningCategory::Extrapolation`] warning instead of failing.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::Resource;
use crate::error::{Error, Result};
use crate::events::{EventSink, TechMapEvent, WarningCategory};

/// Variables that may be stored at several heights.
pub const HEIGHT_VARIABLES: [&str; 5] = [
    "pressure",
    "temperature",
    "windspeed",
    "winddirection",
    "precipitationrate",
];

/// Plausible range of the Hellmann shear exponent.
pub const ALPHA_RANGE: (f64, f64) = (0.06, 0.6);

/// Substitute for zero speeds when computing per-point shear exponents.
const ZERO_SPEED: f64 = 0.001;

/// Splits `windspeed_100m` into `("windspeed", Some(100.0))`.
///
/// Names without exactly one `_` or without a parsable height yield `(name, None)`.
pub fn parse_name(ds_name: &str) -> (&str, Option<f64>) {
    match ds_name.split_once('_') {
        Some((name, h)) if !h.contains('_') => match h.trim_matches('m').parse::<f64>() {
            Ok(h) => (name, Some(h)),
            Err(_) => (ds_name, None),
        },
        _ => (ds_name, None),
    }
}

/// The two stored heights bracketing (or nearest to) a requested height.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NearestHeights {
    pub lower: f64,
    pub upper: f64,
    /// `true` when the request lies below or above every stored height.
    pub extrapolate: bool,
}

/// Picks the two heights closest to `h`, sorted ascending.
pub fn nearest_heights(h: f64, heights: &[f64]) -> Result<NearestHeights> {
    if heights.len() < 2 {
        return Err(Error::FileInput(format!(
            "need at least two heights to interpolate to {h}m, found {}",
            heights.len()
        )));
    }
    let mut by_distance = heights.to_vec();
    by_distance.sort_by(|a, b| (a - h).abs().total_cmp(&(b - h).abs()));
    let (a, b) = (by_distance[0], by_distance[1]);
    let extrapolate = heights.iter().all(|&x| h < x) || heights.iter().all(|&x| h > x);
    Ok(NearestHeights {
        lower: a.min(b),
        upper: a.max(b),
        extrapolate,
    })
}

/// Mean shear exponent `ln(mean(ts2) / mean(ts1)) / ln(h2 / h1)`.
pub fn mean_shear_alpha(ts_1: &[f64], h_1: f64, ts_2: &[f64], h_2: f64) -> f64 {
    (mean(ts_2) / mean(ts_1)).ln() / (h_2 / h_1).ln()
}

/// Power-law interpolation or extrapolation of a series to height `h`.
///
/// With `mean`, one exponent is derived from the series means. Otherwise the exponent is
/// computed per point and clamped to [`ALPHA_RANGE`].
pub fn power_law_interp(
    ts_1: &[f64],
    h_1: f64,
    ts_2: &[f64],
    h_2: f64,
    h: f64,
    mean: bool,
) -> Vec<f64> {
    if h == h_1 {
        return ts_1.to_vec();
    }
    if h == h_2 {
        return ts_2.to_vec();
    }
    let (ts_1, h_1, ts_2, h_2) = ordered(ts_1, h_1, ts_2, h_2);
    if mean {
        let alpha = mean_shear_alpha(ts_1, h_1, ts_2, h_2);
        ts_1.iter().map(|v| v * (h / h_1).powf(alpha)).collect()
    } else {
        ts_1.iter()
            .zip(ts_2)
            .map(|(&v1, &v2)| {
                let v1 = if v1 == 0.0 { ZERO_SPEED } else { v1 };
                let v2 = if v2 == 0.0 { ZERO_SPEED } else { v2 };
                let alpha = ((v2 / v1).ln() / (h_2 / h_1).ln()).clamp(ALPHA_RANGE.0, ALPHA_RANGE.1);
                v1 * (h / h_1).powf(alpha)
            })
            .collect()
    }
}

/// Linear interpolation or extrapolation of a series to height `h`.
pub fn linear_interp(ts_1: &[f64], h_1: f64, ts_2: &[f64], h_2: f64, h: f64) -> Vec<f64> {
    if h == h_1 {
        return ts_1.to_vec();
    }
    if h == h_2 {
        return ts_2.to_vec();
    }
    let (ts_1, h_1, ts_2, h_2) = ordered(ts_1, h_1, ts_2, h_2);
    ts_1.iter()
        .zip(ts_2)
        .map(|(&v1, &v2)| {
            let slope = (v2 - v1) / (h_2 - h_1);
            let intercept = v2 - slope * h_2;
            slope * h + intercept
        })
        .collect()
}

/// Signed shortest rotation in degrees from `a0` to `a1`, in `[-180, 180)`.
pub fn shortest_angle(a0: f64, a1: f64) -> f64 {
    let da = (a1 - a0).rem_euclid(360.0);
    (2.0 * da).rem_euclid(360.0) - da
}

/// Interpolation of directions (degrees) along the shortest arc, wrapped to `[0, 360)`.
pub fn circular_interp(ts_1: &[f64], h_1: f64, ts_2: &[f64], h_2: f64, h: f64) -> Vec<f64> {
    if h == h_1 {
        return ts_1.to_vec();
    }
    if h == h_2 {
        return ts_2.to_vec();
    }
    let fraction = (h - h_1) / (h_2 - h_1);
    ts_1.iter()
        .zip(ts_2)
        .map(|(&a1, &a2)| {
            let da = shortest_angle(a1, a2) * fraction;
            let da = da.signum() * (da.abs() % 360.0);
            (a1 + da).rem_euclid(360.0)
        })
        .collect()
}

fn ordered<'a>(
    ts_1: &'a [f64],
    h_1: f64,
    ts_2: &'a [f64],
    h_2: f64,
) -> (&'a [f64], f64, &'a [f64], f64) {
    if h_1 > h_2 {
        (ts_2, h_2, ts_1, h_1)
    } else {
        (ts_1, h_1, ts_2, h_2)
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// A [`Resource`] whose height-dependent variables can be read at any height.
pub struct WindResource {
    resource: Resource,
    /// Stored `(height, dataset name)` pairs per variable, sorted by height.
    heights: BTreeMap<String, Vec<(f64, String)>>,
}

impl WindResource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let resource = Resource::open(path)?;
        let mut heights: BTreeMap<String, Vec<(f64, String)>> = BTreeMap::new();
        for ds in resource.dsets() {
            if let (name, Some(h)) = parse_name(ds) {
                if HEIGHT_VARIABLES.contains(&name) {
                    heights
                        .entry(name.to_string())
                        .or_default()
                        .push((h, ds.to_string()));
                }
            }
        }
        for entries in heights.values_mut() {
            entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        }
        Ok(Self { resource, heights })
    }

    pub fn path(&self) -> &Path {
        self.resource.path()
    }

    /// Stored heights of a variable, ascending.
    pub fn heights(&self, variable: &str) -> Vec<f64> {
        self.heights
            .get(variable)
            .map(|entries| entries.iter().map(|(h, _)| *h).collect())
            .unwrap_or_default()
    }

    /// Time series of `ds_name` at one site, interpolated when the height is not stored.
    pub fn site_series(&mut self, ds_name: &str, site: usize) -> Result<Vec<f64>> {
        self.site_series_with_events(ds_name, site, &mut ())
    }

    pub fn site_series_with_events(
        &mut self,
        ds_name: &str,
        site: usize,
        sink: &mut dyn EventSink,
    ) -> Result<Vec<f64>> {
        if self.resource.contains(ds_name) {
            return self.resource.site_series(ds_name, site);
        }

        let (variable, h) = parse_name(ds_name);
        let missing = || Error::MissingDataset {
            path: PathBuf::from(self.resource.path()),
            name: ds_name.to_string(),
        };
        let h = h.ok_or_else(missing)?;
        let stored = self.heights.get(variable).ok_or_else(missing)?;
        let heights: Vec<f64> = stored.iter().map(|(h, _)| *h).collect();
        let nearest = nearest_heights(h, &heights)?;
        let name_at = |target: f64| {
            stored
                .iter()
                .find(|(stored_h, _)| *stored_h == target)
                .map(|(_, name)| name.clone())
        };
        let (name_1, name_2) = match (name_at(nearest.lower), name_at(nearest.upper)) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(missing()),
        };

        if nearest.extrapolate {
            let message = format!(
                "{h} is outside the height range ({}, {}). Extrapolation to be used.",
                heights[0],
                heights[heights.len() - 1]
            );
            warn!("{}", message);
            sink.send(TechMapEvent::warning(WarningCategory::Extrapolation, message));
        }

        let ts_1 = self.resource.site_series(&name_1, site)?;
        let ts_2 = self.resource.site_series(&name_2, site)?;
        let (h_1, h_2) = (nearest.lower, nearest.upper);

        let out = match variable {
            "windspeed" if nearest.extrapolate => {
                let alpha = mean_shear_alpha(&ts_1, h_1, &ts_2, h_2);
                if alpha < ALPHA_RANGE.0 || alpha > ALPHA_RANGE.1 {
                    let message = format!(
                        "Shear exponent {alpha:.3} for '{ds_name}' is outside {ALPHA_RANGE:?}."
                    );
                    warn!("{}", message);
                    sink.send(TechMapEvent::warning(WarningCategory::Interpolation, message));
                }
                power_law_interp(&ts_1, h_1, &ts_2, h_2, h, true)
            }
            "winddirection" => circular_interp(&ts_1, h_1, &ts_2, h_2, h),
            _ => linear_interp(&ts_1, h_1, &ts_2, h_2, h),
        };
        Ok(out)
    }
}
