//! Per-event heatwave metrics and the per-cell heatwave pass over a grid.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::Serialize;

use crate::climatology::Climatology;
use crate::detect::{detect_events, EventSpan};
use crate::field::SstField;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Category {
    Moderate,
    Strong,
    Severe,
    Extreme,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Moderate,
        Category::Strong,
        Category::Severe,
        Category::Extreme,
    ];

    /// Tiers above 4 fold into `Extreme`; tiers below 1 have no category.
    pub fn from_tier(tier: i64) -> Option<Self> {
        match tier.min(4) {
            1 => Some(Category::Moderate),
            2 => Some(Category::Strong),
            3 => Some(Category::Severe),
            4 => Some(Category::Extreme),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Moderate => "Moderate",
            Category::Strong => "Strong",
            Category::Severe => "Severe",
            Category::Extreme => "Extreme",
        }
    }
}

/// Summary of one offset series over an event. `max` is the value at the
/// event peak (argmax of the seasonal anomaly), not the series' own max.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct IntensityStats {
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub cumulative: f64,
}

impl IntensityStats {
    fn over(series: &[f64], peak: usize) -> Self {
        let n = series.len() as f64;
        let cumulative: f64 = series.iter().sum();
        let mean = cumulative / n;
        let var = series.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            max: series[peak],
            mean,
            std: var.sqrt(),
            cumulative,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HeatwaveEvent {
    pub time_start: f64,
    pub time_end: f64,
    pub index_start: usize,
    pub index_end: usize,
    pub index_peak: usize,
    pub duration: usize,
    pub duration_moderate: usize,
    pub duration_strong: usize,
    pub duration_severe: usize,
    pub duration_extreme: usize,
    /// Relative to the seasonal mean [°C].
    pub intensity: IntensityStats,
    /// Relative to the threshold [°C].
    pub intensity_rel_thresh: IntensityStats,
    /// Absolute SST [°C].
    pub intensity_abs: IntensityStats,
    pub category: Option<Category>,
    /// [°C/day]
    pub rate_onset: Option<f64>,
    /// [°C/day]
    pub rate_decline: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CellHeatwaves {
    pub lat: f64,
    pub lon: f64,
    pub lat_index: usize,
    pub lon_index: usize,
    pub events: Vec<HeatwaveEvent>,
}

impl CellHeatwaves {
    pub fn n_events(&self) -> usize {
        self.events.len()
    }
}

/// `floor(1 + normalized)`; undefined for non-finite input.
pub fn tier(normalized: f64) -> Option<i64> {
    if normalized.is_finite() {
        Some((1.0 + normalized).floor() as i64)
    } else {
        None
    }
}

/// Index of the first maximum, skipping NaN.
fn argmax(xs: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in xs.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// `sst`, `threshold` and `mean` are full-length tiled series, so onset and
/// decline can look one day past either end of the event.
pub fn event_metrics(
    span: &EventSpan,
    sst: &[f64],
    threshold: &[f64],
    mean: &[f64],
) -> HeatwaveEvent {
    let (s, e) = (span.start_index, span.end_index);
    let temp = &sst[s..=e];
    let thresh = &threshold[s..=e];
    let seas = &mean[s..=e];

    let rel_seas: Vec<f64> = temp.iter().zip(seas).map(|(t, m)| t - m).collect();
    let rel_thresh: Vec<f64> = temp.iter().zip(thresh).map(|(t, th)| t - th).collect();
    let rel_thresh_norm: Vec<f64> = temp
        .iter()
        .zip(thresh)
        .zip(seas)
        .map(|((t, th), m)| (t - th) / (th - m))
        .collect();

    let peak = argmax(&rel_seas).unwrap_or(0);
    let duration = rel_seas.len();

    let tiers: Vec<Option<i64>> = rel_thresh_norm.iter().map(|&v| tier(v)).collect();
    let count = |pred: fn(i64) -> bool| tiers.iter().flatten().filter(|&&t| pred(t)).count();
    // +inf (zero threshold gap) may win the argmax; its tier is undefined
    let category = argmax(&rel_thresh_norm)
        .and_then(|i| tiers[i])
        .and_then(Category::from_tier);

    HeatwaveEvent {
        time_start: span.time_start,
        time_end: span.time_end,
        index_start: s,
        index_end: e,
        index_peak: s + peak,
        duration,
        duration_moderate: count(|t| t == 1),
        duration_strong: count(|t| t == 2),
        duration_severe: count(|t| t == 3),
        duration_extreme: count(|t| t >= 4),
        intensity: IntensityStats::over(&rel_seas, peak),
        intensity_rel_thresh: IntensityStats::over(&rel_thresh, peak),
        intensity_abs: IntensityStats::over(temp, peak),
        category,
        rate_onset: onset_rate(&rel_seas, peak, s, sst, mean),
        rate_decline: decline_rate(&rel_seas, peak, e, sst, mean),
    }
}

/// Rise from the half-day-before-start strength to the peak.
fn onset_rate(rel_seas: &[f64], peak: usize, start: usize, sst: &[f64], mean: &[f64]) -> Option<f64> {
    let at_peak = rel_seas[peak];
    let rate = if start > 0 {
        let before = 0.5 * (rel_seas[0] + sst[start - 1] - mean[start - 1]);
        (at_peak - before) / (peak as f64 + 0.5)
    } else {
        (at_peak - rel_seas[0]) / peak.max(1) as f64
    };
    finite(rate)
}

/// Fall from the peak to the half-day-after-end strength.
fn decline_rate(rel_seas: &[f64], peak: usize, end: usize, sst: &[f64], mean: &[f64]) -> Option<f64> {
    let at_peak = rel_seas[peak];
    let last = rel_seas.len() - 1;
    let days_after_peak = last - peak;
    let rate = if end + 1 < sst.len() {
        let after = 0.5 * (rel_seas[last] + sst[end + 1] - mean[end + 1]);
        (at_peak - after) / (days_after_peak as f64 + 0.5)
    } else {
        (at_peak - rel_seas[last]) / days_after_peak.max(1) as f64
    };
    finite(rate)
}

/// Result is ordered by `(lat_index, lon_index)`.
pub fn detect_heatwaves(
    field: &SstField,
    clim: &Climatology,
    min_duration: usize,
    progress: impl Fn(usize, usize) + Sync,
) -> Vec<CellHeatwaves> {
    let (ny, nx, nt) = (field.n_lat(), field.n_lon(), field.n_time());
    let total = ny * nx;
    let done = AtomicUsize::new(0);

    (0..total)
        .into_par_iter()
        .map(|cell| {
            let (y, x) = (cell / nx, cell % nx);
            let sst = field.cell_series(y, x).to_vec();
            let threshold = clim.tiled_threshold(y, x, nt);
            let mean = clim.tiled_mean(y, x, nt);
            let events = detect_events(&sst, &threshold, field.time(), min_duration)
                .iter()
                .map(|span| event_metrics(span, &sst, &threshold, &mean))
                .collect();

            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            if n % nx == 0 || n == total {
                progress(n, total);
            }

            CellHeatwaves {
                lat: field.lat()[y],
                lon: field.lon()[x],
                lat_index: y,
                lon_index: x,
                events,
            }
        })
        .collect()
}
