//! Total heatwave-affected area per day and per year.

use ndarray::Array2;
use rayon::prelude::*;

use crate::constants::{DAYS_IN_YEAR, M2_PER_KM2};
use crate::error::{MhwError, Result};
use crate::metrics::CellHeatwaves;

#[derive(Clone, Debug, PartialEq)]
pub struct AreaSeries {
    /// One value per analysis day [km²].
    pub daily_km2: Vec<f64>,
    /// Sum of `daily_km2` over each 365-day block [km²].
    pub yearly_km2: Vec<f64>,
}

/// Covered timesteps of one cell as merged half-open index ranges.
struct Footprint {
    area_m2: f64,
    ranges: Vec<(usize, usize)>,
}

impl Footprint {
    fn covers(&self, i: usize) -> bool {
        let k = self.ranges.partition_point(|&(_, hi)| hi <= i);
        k < self.ranges.len() && self.ranges[k].0 <= i
    }
}

/// Map each event's `[time_start, time_end)` onto the time axis and merge
/// overlapping ranges, so a cell is counted once per timestep.
fn footprint(cell: &CellHeatwaves, time: &[f64], area_m2: f64) -> Footprint {
    let mut ranges: Vec<(usize, usize)> = cell
        .events
        .iter()
        .map(|ev| {
            let lo = time.partition_point(|&t| t < ev.time_start);
            let hi = time.partition_point(|&t| t < ev.time_end);
            (lo, hi)
        })
        .filter(|(lo, hi)| lo < hi)
        .collect();
    ranges.sort_unstable();

    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
    for (lo, hi) in ranges {
        match merged.last_mut() {
            Some(last) if lo <= last.1 => last.1 = last.1.max(hi),
            _ => merged.push((lo, hi)),
        }
    }
    Footprint {
        area_m2,
        ranges: merged,
    }
}

/// Sum the area of every cell under a heatwave at each timestep.
///
/// `area` is `[lat, lon]` in m² and must match `grid`, the field's
/// `(n_lat, n_lon)`; `cells` holds one entry per grid cell. `time` is the
/// analysis time axis (strictly increasing, `num_years * 365` long). Each
/// timestep sums its cells in grid order, so the result does not depend on
/// thread scheduling.
pub fn aggregate_area(
    cells: &[CellHeatwaves],
    area: &Array2<f64>,
    grid: (usize, usize),
    num_years: usize,
    time: &[f64],
) -> Result<AreaSeries> {
    let nt = num_years * DAYS_IN_YEAR;
    if time.len() != nt {
        return Err(MhwError::shape("time axis length (num_years * 365)", nt, time.len()));
    }
    let (ny, nx) = grid;
    if area.dim() != grid {
        return Err(MhwError::shape(
            "area grid",
            format!("[{}, {}]", ny, nx),
            format!("{:?}", area.dim()),
        ));
    }
    if cells.len() != ny * nx {
        return Err(MhwError::shape("heatwave cells", ny * nx, cells.len()));
    }
    let footprints: Vec<Footprint> = cells
        .iter()
        .map(|cell| {
            if cell.lat_index >= ny || cell.lon_index >= nx {
                return Err(MhwError::shape(
                    "area grid",
                    format!("cell ({}, {}) inside", cell.lat_index, cell.lon_index),
                    format!("[{}, {}]", ny, nx),
                ));
            }
            Ok(footprint(cell, time, area[[cell.lat_index, cell.lon_index]]))
        })
        .filter(|fp| fp.as_ref().map_or(true, |fp| !fp.ranges.is_empty()))
        .collect::<Result<_>>()?;

    let daily_km2: Vec<f64> = (0..nt)
        .into_par_iter()
        .map(|i| {
            footprints
                .iter()
                .filter(|fp| fp.covers(i))
                .map(|fp| fp.area_m2)
                .sum::<f64>()
                / M2_PER_KM2
        })
        .collect();

    let yearly_km2 = daily_km2
        .chunks(DAYS_IN_YEAR)
        .map(|year| year.iter().sum())
        .collect();

    Ok(AreaSeries {
        daily_km2,
        yearly_km2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{HeatwaveEvent, IntensityStats};
    use approx::assert_relative_eq;

    fn event(time_start: f64, time_end: f64) -> HeatwaveEvent {
        let stats = IntensityStats {
            max: 0.0,
            mean: 0.0,
            std: 0.0,
            cumulative: 0.0,
        };
        HeatwaveEvent {
            time_start,
            time_end,
            index_start: 0,
            index_end: 0,
            index_peak: 0,
            duration: 1,
            duration_moderate: 0,
            duration_strong: 0,
            duration_severe: 0,
            duration_extreme: 0,
            intensity: stats,
            intensity_rel_thresh: stats,
            intensity_abs: stats,
            category: None,
            rate_onset: None,
            rate_decline: None,
        }
    }

    fn grid(ny: usize, nx: usize, events: impl Fn(usize, usize) -> Vec<HeatwaveEvent>) -> Vec<CellHeatwaves> {
        let mut cells = Vec::new();
        for y in 0..ny {
            for x in 0..nx {
                cells.push(CellHeatwaves {
                    lat: y as f64,
                    lon: x as f64,
                    lat_index: y,
                    lon_index: x,
                    events: events(y, x),
                });
            }
        }
        cells
    }

    #[test]
    fn one_step_of_coverage_over_whole_grid() {
        let a = 2.5e8;
        let area = Array2::from_elem((3, 4), a);
        let time: Vec<f64> = (0..365).map(|i| i as f64).collect();
        // [10, 11) is half-open: only day 10 is covered
        let cells = grid(3, 4, |_, _| vec![event(10.0, 11.0)]);
        let series = aggregate_area(&cells, &area, (3, 4), 1, &time).unwrap();

        assert_eq!(series.daily_km2.len(), 365);
        for (i, &v) in series.daily_km2.iter().enumerate() {
            if i == 10 {
                assert_relative_eq!(v, a * 12.0 / 1e6);
            } else {
                assert_eq!(v, 0.0);
            }
        }
        assert_eq!(series.yearly_km2.len(), 1);
        assert_relative_eq!(series.yearly_km2[0], a * 12.0 / 1e6);
    }

    #[test]
    fn overlapping_events_count_a_cell_once() {
        let area = Array2::from_elem((1, 2), 1.0e6);
        let time: Vec<f64> = (0..730).map(|i| 1000.0 + i as f64).collect();
        let cells = grid(1, 2, |_, x| {
            if x == 0 {
                vec![event(1005.0, 1010.0), event(1008.0, 1012.0)]
            } else {
                vec![event(1400.0, 1405.0)]
            }
        });
        let series = aggregate_area(&cells, &area, (1, 2), 2, &time).unwrap();
        assert_eq!(series.daily_km2[4], 0.0);
        assert_eq!(series.daily_km2[5], 1.0);
        assert_eq!(series.daily_km2[9], 1.0);
        assert_eq!(series.daily_km2[11], 1.0);
        assert_eq!(series.daily_km2[12], 0.0);
        assert_eq!(series.daily_km2[400], 1.0);
        assert_eq!(series.daily_km2[405], 0.0);
        assert_relative_eq!(series.yearly_km2[0], 7.0);
        assert_relative_eq!(series.yearly_km2[1], 5.0);
    }

    #[test]
    fn area_grid_must_cover_cells() {
        let area = Array2::from_elem((1, 1), 1.0);
        let time: Vec<f64> = (0..365).map(|i| i as f64).collect();
        let cells = grid(2, 1, |_, _| Vec::new());
        assert!(matches!(
            aggregate_area(&cells, &area, (2, 1), 1, &time),
            Err(MhwError::ShapeMismatch { .. })
        ));
        let ok = grid(1, 1, |_, _| Vec::new());
        assert!(aggregate_area(&ok, &area, (1, 1), 1, &time).is_ok());
        assert!(matches!(
            aggregate_area(&ok, &area, (1, 1), 2, &time),
            Err(MhwError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn area_larger_than_the_grid_is_rejected() {
        let area = Array2::from_elem((5, 5), 1.0);
        let time: Vec<f64> = (0..365).map(|i| i as f64).collect();
        let cells = grid(1, 1, |_, _| vec![event(3.0, 8.0)]);
        assert!(matches!(
            aggregate_area(&cells, &area, (1, 1), 1, &time),
            Err(MhwError::ShapeMismatch { what: "area grid", .. })
        ));
        // cells from a different grid than the one named
        let area = Array2::from_elem((2, 2), 1.0);
        assert!(matches!(
            aggregate_area(&cells, &area, (2, 2), 1, &time),
            Err(MhwError::ShapeMismatch { what: "heatwave cells", .. })
        ));
    }
}
