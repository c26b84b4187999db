//! Daily mean and percentile-threshold climatology over a baseline period.

use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{Array1, Array3, Axis};
use ndarray_stats::{interpolate::Linear, QuantileExt};
use noisy_float::types::n64;
use rayon::prelude::*;

use crate::constants::DAYS_IN_YEAR;
use crate::error::{MhwError, Result};
use crate::field::SstField;

/// Seasonal cycle per grid cell, both arrays shaped `[365, lat, lon]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Climatology {
    pub mean: Array3<f64>,
    pub threshold: Array3<f64>,
    pub pctile: f64,
    pub num_years: usize,
}

impl Climatology {
    /// Mean at an absolute time index, the 365-day cycle repeated over the
    /// whole analysis period.
    pub fn mean_at(&self, time_index: usize, lat_index: usize, lon_index: usize) -> f64 {
        self.mean[[time_index % DAYS_IN_YEAR, lat_index, lon_index]]
    }

    pub fn threshold_at(&self, time_index: usize, lat_index: usize, lon_index: usize) -> f64 {
        self.threshold[[time_index % DAYS_IN_YEAR, lat_index, lon_index]]
    }

    pub fn tiled_mean(&self, lat_index: usize, lon_index: usize, len: usize) -> Vec<f64> {
        (0..len).map(|i| self.mean_at(i, lat_index, lon_index)).collect()
    }

    pub fn tiled_threshold(&self, lat_index: usize, lon_index: usize, len: usize) -> Vec<f64> {
        (0..len).map(|i| self.threshold_at(i, lat_index, lon_index)).collect()
    }
}

/// Build the climatology from the first `num_years_clim` years of `field`.
///
/// For each day of year `d` the sample is `{d + 365*y : y < num_years_clim}`.
/// Mean and percentile both skip NaN; an all-NaN sample gives NaN.
/// `progress(done, total)` is called as grid cells complete, possibly from
/// worker threads.
pub fn build_climatology(
    field: &SstField,
    num_years_clim: usize,
    pctile: f64,
    progress: impl Fn(usize, usize) + Sync,
) -> Result<Climatology> {
    if num_years_clim == 0 {
        return Err(MhwError::InvalidParameter(
            "num_years_clim must be >= 1".into(),
        ));
    }
    if !(0.0..=100.0).contains(&pctile) {
        return Err(MhwError::InvalidParameter(format!(
            "percentile must be in [0, 100], got {}",
            pctile
        )));
    }
    let needed = num_years_clim * DAYS_IN_YEAR;
    if field.n_time() < needed {
        return Err(MhwError::InsufficientData {
            needed,
            available: field.n_time(),
        });
    }

    let (ny, nx) = (field.n_lat(), field.n_lon());
    let total = ny * nx;
    let done = AtomicUsize::new(0);
    let data = field.data();

    let per_cell: Vec<(Vec<f64>, Vec<f64>)> = (0..total)
        .into_par_iter()
        .map(|cell| {
            let (y, x) = (cell / nx, cell % nx);
            let mut sample = Vec::with_capacity(num_years_clim);
            let mut means = Vec::with_capacity(DAYS_IN_YEAR);
            let mut thresholds = Vec::with_capacity(DAYS_IN_YEAR);
            for d in 0..DAYS_IN_YEAR {
                sample.clear();
                sample.extend((0..num_years_clim).map(|yr| data[[d + DAYS_IN_YEAR * yr, y, x]]));
                means.push(nan_mean(&sample));
                thresholds.push(nan_percentile(&sample, pctile));
            }
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            if n % nx == 0 || n == total {
                progress(n, total);
            }
            (means, thresholds)
        })
        .collect();

    let mut mean = Array3::<f64>::zeros((DAYS_IN_YEAR, ny, nx));
    let mut threshold = Array3::<f64>::zeros((DAYS_IN_YEAR, ny, nx));
    for (cell, (means, thresholds)) in per_cell.into_iter().enumerate() {
        let (y, x) = (cell / nx, cell % nx);
        for d in 0..DAYS_IN_YEAR {
            mean[[d, y, x]] = means[d];
            threshold[[d, y, x]] = thresholds[d];
        }
    }

    Ok(Climatology {
        mean,
        threshold,
        pctile,
        num_years: num_years_clim,
    })
}

/// Arithmetic mean ignoring NaN; NaN when nothing is left.
pub fn nan_mean(xs: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for &v in xs {
        if !v.is_nan() {
            sum += v;
            n += 1;
        }
    }
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// `p`-th percentile ignoring NaN, linear interpolation between order
/// statistics at rank `p/100 * (n-1)`.
pub fn nan_percentile(xs: &[f64], p: f64) -> f64 {
    let mut lane = Array1::from(xs.to_vec());
    lane.quantile_axis_skipnan_mut(Axis(0), n64(p / 100.0), &Linear)
        .map(|q| q.into_scalar())
        .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_year_field(first: f64, second: f64) -> SstField {
        let mut data = Array3::<f64>::zeros((2 * DAYS_IN_YEAR, 2, 3));
        for d in 0..DAYS_IN_YEAR {
            for y in 0..2 {
                for x in 0..3 {
                    let offset = d as f64 * 0.01 + y as f64 + 10.0 * x as f64;
                    data[[d, y, x]] = first + offset;
                    data[[d + DAYS_IN_YEAR, y, x]] = second + offset;
                }
            }
        }
        SstField::with_index_time(data, vec![-1.0, 1.0], vec![0.0, 1.0, 2.0]).unwrap()
    }

    #[test]
    fn shapes_and_mean_of_two_year_baseline() {
        let field = two_year_field(10.0, 14.0);
        let clim = build_climatology(&field, 2, 90.0, |_, _| {}).unwrap();
        assert_eq!(clim.mean.dim(), (365, 2, 3));
        assert_eq!(clim.threshold.dim(), (365, 2, 3));
        for d in [0usize, 100, 364] {
            let offset = d as f64 * 0.01 + 1.0 + 20.0;
            assert_relative_eq!(clim.mean[[d, 1, 2]], 12.0 + offset, epsilon = 1e-12);
            // rank 0.9 between 10+o and 14+o
            assert_relative_eq!(clim.threshold[[d, 1, 2]], 13.6 + offset, epsilon = 1e-12);
        }
    }

    #[test]
    fn rebuild_is_bit_identical() {
        let field = two_year_field(3.0, 5.5);
        let a = build_climatology(&field, 2, 75.0, |_, _| {}).unwrap();
        let b = build_climatology(&field, 2, 75.0, |_, _| {}).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn insufficient_baseline_is_an_error() {
        let field = two_year_field(1.0, 2.0);
        let err = build_climatology(&field, 3, 90.0, |_, _| {}).unwrap_err();
        assert!(matches!(
            err,
            MhwError::InsufficientData {
                needed: 1095,
                available: 730
            }
        ));
    }

    #[test]
    fn nan_samples_are_skipped() {
        assert_relative_eq!(nan_mean(&[1.0, f64::NAN, 3.0]), 2.0);
        assert!(nan_mean(&[f64::NAN, f64::NAN]).is_nan());
        let xs = vec![4.0, f64::NAN, 1.0, 2.0, 3.0];
        assert_relative_eq!(nan_percentile(&xs, 50.0), 2.5);
        let xs = vec![f64::NAN];
        assert!(nan_percentile(&xs, 90.0).is_nan());
    }

    #[test]
    fn percentile_matches_linear_interpolation() {
        let xs = vec![15.0, 20.0, 35.0, 40.0, 50.0];
        assert_relative_eq!(nan_percentile(&xs, 40.0), 29.0, epsilon = 1e-12);
        let xs = vec![15.0, 20.0, 35.0, 40.0, 50.0];
        assert_relative_eq!(nan_percentile(&xs, 100.0), 50.0);
        let xs = vec![15.0, 20.0, 35.0, 40.0, 50.0];
        assert_relative_eq!(nan_percentile(&xs, 0.0), 15.0);
    }

    #[test]
    fn tiled_lookup_wraps_each_year() {
        let field = two_year_field(0.0, 2.0);
        let clim = build_climatology(&field, 2, 50.0, |_, _| {}).unwrap();
        assert_eq!(clim.mean_at(5, 0, 0), clim.mean_at(5 + 365, 0, 0));
        let tiled = clim.tiled_threshold(0, 1, 730);
        assert_eq!(tiled.len(), 730);
        assert_eq!(tiled[400], clim.threshold[[35, 0, 1]]);
    }
}
