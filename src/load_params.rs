use std::fs;
use std::io::Read;
use std::path::PathBuf;

use crate::error::{MhwError, Result};
use crate::params::AnalysisParams;

pub const KEY_RUN: &str = "Run";
pub const KEY_PCTILE: &str = "Percentile";
pub const KEY_NUM_YEARS_CLIM: &str = "Baseline years";
pub const KEY_NUM_YEARS: &str = "Analysis years";
pub const KEY_RESOLUTION: &str = "Resolution";
pub const KEY_MIN_DURATION: &str = "Min duration";
pub const KEY_KELVIN_OFFSET: &str = "Kelvin offset";
pub const KEY_INPUT_DIR: &str = "Input dir";
pub const KEY_SEED: &str = "Seed";

fn bad_value(path: &str, key: &str, val: &str) -> MhwError {
    MhwError::InvalidParameter(format!("Invalid {} value in {}: '{}'", key, path, val))
}

fn missing(path: &str, key: &str) -> MhwError {
    MhwError::InvalidParameter(format!("Missing {} in {}", key, path))
}

/// Read the parameters a previous run recorded in `{dir}/summary.txt`.
///
/// Output location and plotting are not taken from the file.
pub fn load_params_from_summary_dir(dir: &str) -> Result<AnalysisParams> {
    let path = format!("{}/summary.txt", dir);
    let mut file = fs::File::open(&path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    parse_summary(&contents, &path)
}

pub fn parse_summary(contents: &str, path: &str) -> Result<AnalysisParams> {
    let mut run: Option<String> = None;
    let mut pctile: Option<f64> = None;
    let mut num_years_clim: Option<usize> = None;
    let mut num_years: Option<usize> = None;
    let mut resolution: Option<f64> = None;
    let mut min_duration: Option<usize> = None;
    let mut kelvin_offset: Option<f64> = None;
    let mut input_dir: Option<PathBuf> = None;
    let mut seed: Option<u64> = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(eq_pos) = line.find('=') else {
            continue;
        };
        let key = line[..eq_pos].trim();
        let val_str = line[eq_pos + 1..].trim();
        match key {
            KEY_RUN => run = Some(val_str.to_string()),
            KEY_PCTILE => {
                pctile = Some(val_str.parse().map_err(|_| bad_value(path, key, val_str))?);
            }
            KEY_NUM_YEARS_CLIM => {
                num_years_clim = Some(val_str.parse().map_err(|_| bad_value(path, key, val_str))?);
            }
            KEY_NUM_YEARS => {
                num_years = Some(val_str.parse().map_err(|_| bad_value(path, key, val_str))?);
            }
            KEY_RESOLUTION => {
                resolution = Some(val_str.parse().map_err(|_| bad_value(path, key, val_str))?);
            }
            KEY_MIN_DURATION => {
                min_duration = Some(val_str.parse().map_err(|_| bad_value(path, key, val_str))?);
            }
            KEY_KELVIN_OFFSET => {
                kelvin_offset = Some(val_str.parse().map_err(|_| bad_value(path, key, val_str))?);
            }
            KEY_INPUT_DIR => {
                if val_str != "synthetic" {
                    input_dir = Some(PathBuf::from(val_str));
                }
            }
            KEY_SEED => {
                seed = Some(val_str.parse().map_err(|_| bad_value(path, key, val_str))?);
            }
            _ => {}
        }
    }

    let defaults = AnalysisParams::default();
    Ok(AnalysisParams {
        run: run.unwrap_or(defaults.run),
        pctile: pctile.ok_or_else(|| missing(path, KEY_PCTILE))?,
        num_years_clim: num_years_clim.ok_or_else(|| missing(path, KEY_NUM_YEARS_CLIM))?,
        num_years: num_years.ok_or_else(|| missing(path, KEY_NUM_YEARS))?,
        resolution: resolution.ok_or_else(|| missing(path, KEY_RESOLUTION))?,
        min_duration: min_duration.ok_or_else(|| missing(path, KEY_MIN_DURATION))?,
        kelvin_offset: kelvin_offset.unwrap_or(defaults.kelvin_offset),
        input_dir,
        output_root: defaults.output_root,
        make_plots: defaults.make_plots,
        seed: seed.unwrap_or(defaults.seed),
    })
}
