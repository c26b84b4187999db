//! Gridded daily SST field and its coordinate axes.

use ndarray::{s, Array3, ArrayView1};

use crate::constants::DAYS_IN_YEAR;
use crate::error::{MhwError, Result};

/// SST cube indexed `[time, lat, lon]` in °C, with its coordinates.
///
/// Construction checks that the cube agrees with the axes, that the time
/// axis is strictly increasing and that it covers whole 365-day years.
#[derive(Clone, Debug)]
pub struct SstField {
    data: Array3<f64>,
    lat: Vec<f64>,
    lon: Vec<f64>,
    time: Vec<f64>,
}

impl SstField {
    pub fn new(data: Array3<f64>, lat: Vec<f64>, lon: Vec<f64>, time: Vec<f64>) -> Result<Self> {
        let (nt, ny, nx) = data.dim();
        if ny != lat.len() {
            return Err(MhwError::shape("field latitude dimension", lat.len(), ny));
        }
        if nx != lon.len() {
            return Err(MhwError::shape("field longitude dimension", lon.len(), nx));
        }
        if nt != time.len() {
            return Err(MhwError::shape("field time dimension", time.len(), nt));
        }
        if nt % DAYS_IN_YEAR != 0 {
            return Err(MhwError::shape(
                "field time length (whole years)",
                format!("multiple of {}", DAYS_IN_YEAR),
                nt,
            ));
        }
        if let Some(w) = time.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(MhwError::InvalidCoordinates(format!(
                "time axis not strictly increasing at index {} ({} -> {})",
                w + 1,
                time[w],
                time[w + 1]
            )));
        }
        Ok(Self { data, lat, lon, time })
    }

    /// Field with a default time axis `0, 1, 2, ...`.
    pub fn with_index_time(data: Array3<f64>, lat: Vec<f64>, lon: Vec<f64>) -> Result<Self> {
        let time = (0..data.dim().0).map(|i| i as f64).collect();
        Self::new(data, lat, lon, time)
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn lat(&self) -> &[f64] {
        &self.lat
    }

    pub fn lon(&self) -> &[f64] {
        &self.lon
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn n_time(&self) -> usize {
        self.time.len()
    }

    pub fn n_lat(&self) -> usize {
        self.lat.len()
    }

    pub fn n_lon(&self) -> usize {
        self.lon.len()
    }

    pub fn num_years(&self) -> usize {
        self.n_time() / DAYS_IN_YEAR
    }

    pub fn cell_series(&self, lat_index: usize, lon_index: usize) -> ArrayView1<'_, f64> {
        self.data.slice(s![.., lat_index, lon_index])
    }

    pub fn value(&self, time_index: usize, lat_index: usize, lon_index: usize) -> f64 {
        self.data[[time_index, lat_index, lon_index]]
    }

    /// Keep only the first `years` years of the analysis period.
    pub fn truncate_years(self, years: usize) -> Result<Self> {
        let keep = years * DAYS_IN_YEAR;
        if keep > self.n_time() {
            return Err(MhwError::InsufficientData {
                needed: keep,
                available: self.n_time(),
            });
        }
        if keep == self.n_time() {
            return Ok(self);
        }
        let data = self.data.slice(s![..keep, .., ..]).to_owned();
        let mut time = self.time;
        time.truncate(keep);
        Ok(Self {
            data,
            lat: self.lat,
            lon: self.lon,
            time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_latitude() {
        let data = Array3::<f64>::zeros((365, 2, 3));
        let err = SstField::with_index_time(data, vec![0.0], vec![0.0, 1.0, 2.0]).unwrap_err();
        assert!(matches!(err, MhwError::ShapeMismatch { .. }));
    }

    #[test]
    fn rejects_partial_year() {
        let data = Array3::<f64>::zeros((400, 1, 1));
        let err = SstField::with_index_time(data, vec![0.0], vec![0.0]).unwrap_err();
        assert!(matches!(err, MhwError::ShapeMismatch { .. }));
    }

    #[test]
    fn rejects_non_increasing_time() {
        let data = Array3::<f64>::zeros((365, 1, 1));
        let mut time: Vec<f64> = (0..365).map(|i| i as f64).collect();
        time[100] = 98.0;
        let err = SstField::new(data, vec![0.0], vec![0.0], time).unwrap_err();
        assert!(matches!(err, MhwError::InvalidCoordinates(_)));
    }

    #[test]
    fn truncate_keeps_leading_years() {
        let mut data = Array3::<f64>::zeros((3 * 365, 1, 1));
        data[[365, 0, 0]] = 7.0;
        let field = SstField::with_index_time(data, vec![0.0], vec![0.0]).unwrap();
        let field = field.truncate_years(2).unwrap();
        assert_eq!(field.n_time(), 730);
        assert_eq!(field.num_years(), 2);
        assert_eq!(field.value(365, 0, 0), 7.0);
        assert!(field.truncate_years(3).is_err());
    }
}
