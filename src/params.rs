use std::path::PathBuf;

use crate::constants::{DEFAULT_MIN_DURATION, KELVIN_OFFSET};
use crate::error::{MhwError, Result};
use crate::load_params;

#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisParams {
    pub run: String,
    pub pctile: f64,
    pub num_years_clim: usize,
    pub num_years: usize,
    pub resolution: f64,
    pub min_duration: usize,
    pub kelvin_offset: f64,
    pub input_dir: Option<PathBuf>,
    pub output_root: String,
    pub make_plots: bool,
    pub seed: u64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            run: "run".to_string(),
            pctile: 90.0,
            num_years_clim: 5,
            num_years: 23,
            resolution: 0.25,
            min_duration: DEFAULT_MIN_DURATION,
            kelvin_offset: KELVIN_OFFSET,
            input_dir: None,
            output_root: "data".to_string(),
            make_plots: true,
            seed: 1993,
        }
    }
}

fn invalid(msg: impl Into<String>) -> MhwError {
    MhwError::InvalidParameter(msg.into())
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| invalid(format!("{} must be a valid number, got '{}'", key, raw)))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(invalid(format!("{} must be 0 or 1, got '{}'", key, other))),
    }
}

impl AnalysisParams {
    pub fn validate(&self) -> Result<()> {
        if self.run.trim().is_empty() {
            return Err(invalid("run name must not be empty"));
        }
        if !(0.0..=100.0).contains(&self.pctile) {
            return Err(invalid("percentile must be in [0, 100]"));
        }
        if self.num_years_clim == 0 {
            return Err(invalid("baseline years must be >= 1"));
        }
        if self.num_years < self.num_years_clim {
            return Err(invalid("analysis years must be >= baseline years"));
        }
        if !(self.resolution > 0.0 && self.resolution <= 1.0) {
            return Err(invalid("resolution must be in (0, 1]"));
        }
        if self.min_duration == 0 {
            return Err(invalid("min duration must be >= 1"));
        }
        if !self.kelvin_offset.is_finite() {
            return Err(invalid("kelvin offset must be finite"));
        }
        Ok(())
    }

    /// Override fields from `MHW_*` variables as returned by `lookup`.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("MHW_RUN") {
            self.run = v;
        }
        if let Some(v) = lookup("MHW_PCTILE") {
            self.pctile = parse_var("MHW_PCTILE", &v)?;
        }
        if let Some(v) = lookup("MHW_NUM_YEARS_CLIM") {
            self.num_years_clim = parse_var("MHW_NUM_YEARS_CLIM", &v)?;
        }
        if let Some(v) = lookup("MHW_NUM_YEARS") {
            self.num_years = parse_var("MHW_NUM_YEARS", &v)?;
        }
        if let Some(v) = lookup("MHW_RESOLUTION") {
            self.resolution = parse_var("MHW_RESOLUTION", &v)?;
        }
        if let Some(v) = lookup("MHW_MIN_DURATION") {
            self.min_duration = parse_var("MHW_MIN_DURATION", &v)?;
        }
        if let Some(v) = lookup("MHW_KELVIN_OFFSET") {
            self.kelvin_offset = parse_var("MHW_KELVIN_OFFSET", &v)?;
        }
        if let Some(v) = lookup("MHW_INPUT_DIR") {
            self.input_dir = (!v.trim().is_empty()).then(|| PathBuf::from(v.trim()));
        }
        if let Some(v) = lookup("MHW_OUTPUT_ROOT") {
            self.output_root = v;
        }
        if let Some(v) = lookup("MHW_PLOTS") {
            self.make_plots = parse_flag("MHW_PLOTS", &v)?;
        }
        if let Some(v) = lookup("MHW_SEED") {
            self.seed = parse_var("MHW_SEED", &v)?;
        }
        Ok(())
    }

    /// Defaults, then a previous run's `summary.txt` if `MHW_PARAMS_FROM`
    /// names one, then individual `MHW_*` overrides.
    pub fn from_env() -> Result<Self> {
        Self::resolve(|k| std::env::var(k).ok())
    }

    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut params = match lookup("MHW_PARAMS_FROM") {
            Some(dir) => load_params::load_params_from_summary_dir(&dir)?,
            None => AnalysisParams::default(),
        };
        params.apply_vars(&lookup)?;
        params.validate()?;
        Ok(params)
    }
}
