//! Result files of one analysis run.

use std::fs::File;
use std::io::{BufWriter, Write};

use chrono::Local;

use crate::area::AreaSeries;
use crate::eddy::{EddyCensus, EnrichedEddy, PlotReady, Polarity};
use crate::error::Result;
use crate::load_params::{
    KEY_INPUT_DIR, KEY_KELVIN_OFFSET, KEY_MIN_DURATION, KEY_NUM_YEARS, KEY_NUM_YEARS_CLIM,
    KEY_PCTILE, KEY_RESOLUTION, KEY_RUN, KEY_SEED,
};
use crate::metrics::{CellHeatwaves, Category};
use crate::params::AnalysisParams;

/// Create `{output_root}/{run}_{YYYYmmdd_HHMMSS}` and return it with the
/// timestamp used.
pub fn create_run_dir(output_root: &str, run: &str) -> Result<(String, String)> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let dir = format!("{}/{}_{}", output_root, run, timestamp);
    std::fs::create_dir_all(&dir)?;
    Ok((dir, timestamp))
}

fn create(path: &str) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

fn opt(v: Option<f64>) -> String {
    v.map(|x| format!("{:.8}", x)).unwrap_or_default()
}

pub fn write_area_csvs(dir: &str, series: &AreaSeries, time: &[f64]) -> Result<()> {
    let mut file = create(&format!("{}/mhw_area_daily.csv", dir))?;
    writeln!(file, "index,time,area_km2")?;
    for (i, (a, t)) in series.daily_km2.iter().zip(time).enumerate() {
        writeln!(file, "{},{},{:.6}", i, t, a)?;
    }
    file.flush()?;

    let mut file = create(&format!("{}/mhw_area_yearly.csv", dir))?;
    writeln!(file, "year,area_km2")?;
    for (year, a) in series.yearly_km2.iter().enumerate() {
        writeln!(file, "{},{:.6}", year, a)?;
    }
    file.flush()?;
    Ok(())
}

pub fn write_heatwaves_json(dir: &str, cells: &[CellHeatwaves]) -> Result<()> {
    let mut file = create(&format!("{}/heatwaves.json", dir))?;
    serde_json::to_writer_pretty(&mut file, cells)?;
    file.flush()?;
    Ok(())
}

pub fn write_events_csv(dir: &str, cells: &[CellHeatwaves]) -> Result<()> {
    let mut file = create(&format!("{}/heatwave_events.csv", dir))?;
    writeln!(
        file,
        "lat,lon,lat_index,lon_index,time_start,time_end,index_start,index_end,index_peak,\
         duration,duration_moderate,duration_strong,duration_severe,duration_extreme,\
         intensity_max,intensity_mean,intensity_std,intensity_cumulative,\
         intensity_rel_thresh_max,intensity_rel_thresh_mean,intensity_rel_thresh_std,intensity_rel_thresh_cumulative,\
         intensity_abs_max,intensity_abs_mean,intensity_abs_std,intensity_abs_cumulative,\
         category,rate_onset,rate_decline"
    )?;
    for cell in cells {
        for ev in &cell.events {
            let (i, r, a) = (&ev.intensity, &ev.intensity_rel_thresh, &ev.intensity_abs);
            writeln!(
                file,
                "{},{},{},{},{},{},{},{},{},{},{},{},{},{},\
                 {:.8},{:.8},{:.8},{:.8},{:.8},{:.8},{:.8},{:.8},{:.8},{:.8},{:.8},{:.8},{},{},{}",
                cell.lat,
                cell.lon,
                cell.lat_index,
                cell.lon_index,
                ev.time_start,
                ev.time_end,
                ev.index_start,
                ev.index_end,
                ev.index_peak,
                ev.duration,
                ev.duration_moderate,
                ev.duration_strong,
                ev.duration_severe,
                ev.duration_extreme,
                i.max,
                i.mean,
                i.std,
                i.cumulative,
                r.max,
                r.mean,
                r.std,
                r.cumulative,
                a.max,
                a.mean,
                a.std,
                a.cumulative,
                ev.category.map(Category::label).unwrap_or(""),
                opt(ev.rate_onset),
                opt(ev.rate_decline),
            )?;
        }
    }
    file.flush()?;
    Ok(())
}

pub fn write_eddies_csv(dir: &str, polarity: Polarity, eddies: &[EnrichedEddy]) -> Result<()> {
    let mut file = create(&format!("{}/eddies_{}.csv", dir, polarity.label()))?;
    writeln!(
        file,
        "eddy_id,age,time,lat,lon,lat_index,lon_index,sst_absolute,sst_anomaly,\
         amplitude_cm,radius_km,rot_velocity,translation_speed,nonlinearity"
    )?;
    for eddy in eddies {
        for p in &eddy.points {
            writeln!(
                file,
                "{},{},{},{},{},{},{},{:.8},{:.8},{:.8},{:.8},{:.8},{},{}",
                eddy.id,
                eddy.age,
                p.time,
                p.lat,
                p.lon,
                p.lat_index,
                p.lon_index,
                p.sst_absolute,
                p.sst_anomaly,
                p.amplitude,
                p.radius,
                p.rot_velocity,
                opt(p.translation_speed),
                opt(p.nonlinearity),
            )?;
        }
    }
    file.flush()?;
    Ok(())
}

pub fn write_plot_ready_csv(dir: &str, polarity: Polarity, flat: &PlotReady) -> Result<()> {
    let mut file = create(&format!("{}/eddy_plotready_{}.csv", dir, polarity.label()))?;
    writeln!(file, "sst_absolute,sst_anomaly,amplitude_cm,radius_km,rot_velocity")?;
    for i in 0..flat.len() {
        writeln!(
            file,
            "{:.8},{:.8},{:.8},{:.8},{:.8}",
            flat.sst_absolute[i],
            flat.sst_anomaly[i],
            flat.amplitude[i],
            flat.radius[i],
            flat.rot_velocity[i]
        )?;
    }
    file.flush()?;
    Ok(())
}

/// Counts reported at the end of `summary.txt`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunTotals {
    pub cells: usize,
    pub cells_with_events: usize,
    pub events: usize,
    /// Moderate, Strong, Severe, Extreme.
    pub by_category: [usize; 4],
    pub uncategorised: usize,
    pub mean_daily_area_km2: Option<f64>,
    pub anticyclonic_eddies: usize,
    pub cyclonic_eddies: usize,
    pub eddy_points: usize,
}

impl RunTotals {
    pub fn collect(cells: &[CellHeatwaves], area: Option<&AreaSeries>, census: Option<&EddyCensus>) -> Self {
        let mut totals = RunTotals {
            cells: cells.len(),
            ..Default::default()
        };
        for cell in cells {
            if !cell.events.is_empty() {
                totals.cells_with_events += 1;
            }
            totals.events += cell.n_events();
            for ev in &cell.events {
                match ev.category {
                    Some(c) => totals.by_category[c as usize] += 1,
                    None => totals.uncategorised += 1,
                }
            }
        }
        totals.mean_daily_area_km2 = area
            .filter(|a| !a.daily_km2.is_empty())
            .map(|a| a.daily_km2.iter().sum::<f64>() / a.daily_km2.len() as f64);
        if let Some(census) = census {
            totals.anticyclonic_eddies = census.anticyclonic.len();
            totals.cyclonic_eddies = census.cyclonic.len();
            totals.eddy_points = census
                .anticyclonic
                .iter()
                .chain(&census.cyclonic)
                .map(|e| e.points.len())
                .sum();
        }
        totals
    }
}

/// Parameters first, as `key = value` lines `load_params` can read back.
pub fn write_summary(dir: &str, timestamp: &str, params: &AnalysisParams, totals: &RunTotals) -> Result<()> {
    let mut file = create(&format!("{}/summary.txt", dir))?;
    writeln!(file, "Marine heatwave run summary")?;
    writeln!(file, "Timestamp: {}", timestamp)?;
    writeln!(file, "Output directory: {}", dir)?;
    writeln!(file)?;
    writeln!(file, "Parameters")?;
    writeln!(file, "{} = {}", KEY_RUN, params.run)?;
    writeln!(file, "{} = {}", KEY_PCTILE, params.pctile)?;
    writeln!(file, "{} = {}", KEY_NUM_YEARS_CLIM, params.num_years_clim)?;
    writeln!(file, "{} = {}", KEY_NUM_YEARS, params.num_years)?;
    writeln!(file, "{} = {}", KEY_RESOLUTION, params.resolution)?;
    writeln!(file, "{} = {}", KEY_MIN_DURATION, params.min_duration)?;
    writeln!(file, "{} = {}", KEY_KELVIN_OFFSET, params.kelvin_offset)?;
    match &params.input_dir {
        Some(p) => writeln!(file, "{} = {}", KEY_INPUT_DIR, p.display())?,
        None => writeln!(file, "{} = synthetic", KEY_INPUT_DIR)?,
    }
    writeln!(file, "{} = {}", KEY_SEED, params.seed)?;
    writeln!(file)?;
    writeln!(file, "Totals")?;
    writeln!(file, "Grid cells: {}", totals.cells)?;
    writeln!(file, "Cells with heatwaves: {}", totals.cells_with_events)?;
    writeln!(file, "Heatwave events: {}", totals.events)?;
    for (c, n) in Category::ALL.iter().zip(totals.by_category) {
        writeln!(file, "  {}: {}", c.label(), n)?;
    }
    writeln!(file, "  Uncategorised: {}", totals.uncategorised)?;
    match totals.mean_daily_area_km2 {
        Some(a) => writeln!(file, "Mean daily heatwave area (km2): {:.3}", a)?,
        None => writeln!(file, "Mean daily heatwave area (km2): not computed")?,
    }
    writeln!(file, "Anticyclonic eddies: {}", totals.anticyclonic_eddies)?;
    writeln!(file, "Cyclonic eddies: {}", totals.cyclonic_eddies)?;
    writeln!(file, "Eddy points: {}", totals.eddy_points)?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eddy::{plot_ready, EddyPoint};
    use crate::load_params::load_params_from_summary_dir;
    use crate::metrics::{HeatwaveEvent, IntensityStats};
    use std::path::PathBuf;

    fn scratch_root(name: &str) -> String {
        let dir = std::env::temp_dir().join(format!("mhw_eddy_output_{}_{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir.to_string_lossy().into_owned()
    }

    fn stats(v: f64) -> IntensityStats {
        IntensityStats {
            max: v,
            mean: v,
            std: 0.0,
            cumulative: 5.0 * v,
        }
    }

    fn event(category: Option<Category>) -> HeatwaveEvent {
        HeatwaveEvent {
            time_start: 400.0,
            time_end: 404.0,
            index_start: 400,
            index_end: 404,
            index_peak: 2,
            duration: 5,
            duration_moderate: 5,
            duration_strong: 0,
            duration_severe: 0,
            duration_extreme: 0,
            intensity: stats(1.5),
            intensity_rel_thresh: stats(0.5),
            intensity_abs: stats(21.0),
            category,
            rate_onset: Some(0.25),
            rate_decline: None,
        }
    }

    fn cells() -> Vec<CellHeatwaves> {
        vec![
            CellHeatwaves {
                lat: 30.0,
                lon: -70.0,
                lat_index: 0,
                lon_index: 0,
                events: vec![event(Some(Category::Moderate)), event(None)],
            },
            CellHeatwaves {
                lat: 30.0,
                lon: -69.75,
                lat_index: 0,
                lon_index: 1,
                events: Vec::new(),
            },
        ]
    }

    #[test]
    fn totals_count_categories() {
        let area = AreaSeries {
            daily_km2: vec![0.0, 10.0],
            yearly_km2: vec![10.0],
        };
        let t = RunTotals::collect(&cells(), Some(&area), None);
        assert_eq!(t.cells, 2);
        assert_eq!(t.cells_with_events, 1);
        assert_eq!(t.events, 2);
        assert_eq!(t.by_category, [1, 0, 0, 0]);
        assert_eq!(t.uncategorised, 1);
        assert_eq!(t.mean_daily_area_km2, Some(5.0));
    }

    #[test]
    fn summary_reloads_parameters() {
        let root = scratch_root("summary");
        let params = AnalysisParams {
            run: "nwa".to_string(),
            pctile: 95.0,
            num_years_clim: 3,
            num_years: 8,
            input_dir: Some(PathBuf::from("/data/in")),
            seed: 42,
            ..AnalysisParams::default()
        };
        let (dir, ts) = create_run_dir(&root, &params.run).unwrap();
        assert!(dir.contains(&format!("nwa_{}", ts)));
        write_summary(&dir, &ts, &params, &RunTotals::default()).unwrap();

        let mut reloaded = load_params_from_summary_dir(&dir).unwrap();
        reloaded.output_root = params.output_root.clone();
        assert_eq!(reloaded, params);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn event_rows_leave_undefined_cells_empty() {
        let root = scratch_root("events");
        std::fs::create_dir_all(&root).unwrap();
        write_events_csv(&root, &cells()).unwrap();
        write_heatwaves_json(&root, &cells()).unwrap();

        let csv = std::fs::read_to_string(format!("{}/heatwave_events.csv", root)).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        let header_cols = lines[0].split(',').count();
        assert!(lines[1..].iter().all(|l| l.split(',').count() == header_cols));
        assert!(lines[1].contains(",Moderate,0.25000000,"));
        assert!(lines[2].ends_with(",,0.25000000,"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(format!("{}/heatwaves.json", root)).unwrap()).unwrap();
        assert_eq!(json[0]["events"].as_array().map(|a| a.len()), Some(2));
        assert!(json[0]["events"][1]["category"].is_null());
        let _ = std::fs::remove_dir_all(&root);
    }
    fn point(time: f64, translation_speed: Option<f64>, nonlinearity: Option<f64>) -> EddyPoint {
        EddyPoint {
            time,
            lat: 10.1,
            lon: 150.1,
            lat_index: 3,
            lon_index: 0,
            sst_absolute: 21.5,
            sst_anomaly: 0.25,
            amplitude: 8.0,
            radius: 45.0,
            rot_velocity: 30.0,
            translation_speed,
            nonlinearity,
        }
    }

    #[test]
    fn eddy_rows_leave_undefined_metrics_empty() {
        let root = scratch_root("eddies");
        std::fs::create_dir_all(&root).unwrap();
        let eddies = vec![EnrichedEddy {
            id: 7,
            polarity: Polarity::Cyclonic,
            age: 2.0,
            points: vec![point(5.0, None, None), point(6.0, Some(12.0), Some(2.5))],
        }];
        write_eddies_csv(&root, Polarity::Cyclonic, &eddies).unwrap();
        write_plot_ready_csv(&root, Polarity::Cyclonic, &plot_ready(&eddies)).unwrap();

        let csv = std::fs::read_to_string(format!("{}/eddies_cyclonic.csv", root)).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(first.len(), lines[0].split(',').count());
        assert_eq!(first[0], "7");
        assert_eq!(&first[first.len() - 2..], &["", ""]);
        assert!(lines[2].ends_with(",12.00000000,2.50000000"));

        let flat = std::fs::read_to_string(format!("{}/eddy_plotready_cyclonic.csv", root)).unwrap();
        let rows: Vec<&str> = flat.lines().collect();
        assert_eq!(rows[0], "sst_absolute,sst_anomaly,amplitude_cm,radius_km,rot_velocity");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], "21.50000000,0.25000000,8.00000000,45.00000000,30.00000000");
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn area_files_have_one_row_per_day_and_year() {
        let root = scratch_root("area");
        std::fs::create_dir_all(&root).unwrap();
        let series = AreaSeries {
            daily_km2: vec![0.0, 1.5, 2.0],
            yearly_km2: vec![3.5],
        };
        write_area_csvs(&root, &series, &[100.0, 101.0, 102.0]).unwrap();

        let daily = std::fs::read_to_string(format!("{}/mhw_area_daily.csv", root)).unwrap();
        let daily: Vec<&str> = daily.lines().collect();
        assert_eq!(daily, vec!["index,time,area_km2", "0,100,0.000000", "1,101,1.500000", "2,102,2.000000"]);
        let yearly = std::fs::read_to_string(format!("{}/mhw_area_yearly.csv", root)).unwrap();
        assert_eq!(yearly.lines().collect::<Vec<_>>(), vec!["year,area_km2", "0,3.500000"]);
        let _ = std::fs::remove_dir_all(&root);
    }
}
