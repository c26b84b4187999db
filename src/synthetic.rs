//! Seeded synthetic dataset: grid-aligned SST cube, cell areas and eddy
//! tracks, used when no input directory is configured.

use ndarray::{Array2, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constants::{DAYS_IN_YEAR, DEG_TO_RAD, EARTH_RADIUS_CM, M_TO_CM};
use crate::eddy::{EddyTrack, Polarity};
use crate::error::{MhwError, Result};
use crate::field::SstField;
use crate::params::AnalysisParams;

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub n_lat: usize,
    pub n_lon: usize,
    pub num_years: usize,
    /// First year warm anomalies may be injected in.
    pub anomaly_from_year: usize,
    pub resolution: f64,
    /// South-west corner, snapped down to the grid.
    pub lat0: f64,
    pub lon0: f64,
    pub n_anomalies: usize,
    pub n_eddies: usize,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n_lat: 12,
            n_lon: 16,
            num_years: 6,
            anomaly_from_year: 5,
            resolution: 0.25,
            lat0: 30.0,
            lon0: -70.0,
            n_anomalies: 6,
            n_eddies: 8,
            seed: 1993,
        }
    }
}

impl SyntheticConfig {
    pub fn for_params(params: &AnalysisParams) -> Self {
        let anomaly_from_year = if params.num_years > params.num_years_clim {
            params.num_years_clim
        } else {
            0
        };
        Self {
            num_years: params.num_years,
            anomaly_from_year,
            resolution: params.resolution,
            seed: params.seed,
            ..Self::default()
        }
    }
}

pub struct SyntheticDataset {
    pub field: SstField,
    /// Cell areas [m²].
    pub area: Array2<f64>,
    pub tracks: Vec<EddyTrack>,
}

/// Standard normal sample (Box–Muller).
fn gaussian(rng: &mut impl Rng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Axis values `k / res_factor`, so that snapping a coordinate inside a cell
/// reproduces the axis value exactly.
fn grid_axis(start: f64, n: usize, res_factor: f64) -> Vec<f64> {
    let k0 = (start * res_factor).floor() as i64;
    (0..n as i64).map(|i| (k0 + i) as f64 / res_factor).collect()
}

/// `R² Δφ Δλ cos φ` for every cell [m²].
pub fn cell_areas(lat: &[f64], n_lon: usize, resolution: f64) -> Array2<f64> {
    let r_m = EARTH_RADIUS_CM / M_TO_CM;
    let d = resolution * DEG_TO_RAD;
    Array2::from_shape_fn((lat.len(), n_lon), |(y, _)| {
        r_m * r_m * d * d * (lat[y] * DEG_TO_RAD).cos()
    })
}

fn seasonal_sst(lat: f64, lat0: f64, day: usize) -> f64 {
    let phase = 2.0 * std::f64::consts::PI * (day as f64 - 220.0) / DAYS_IN_YEAR as f64;
    22.0 - 0.4 * (lat - lat0) + 3.5 * phase.cos()
}

fn inject_anomalies(data: &mut Array3<f64>, cfg: &SyntheticConfig, rng: &mut impl Rng) {
    let (nt, ny, nx) = data.dim();
    let first_day = cfg.anomaly_from_year * DAYS_IN_YEAR;
    if nt <= first_day + 40 {
        return;
    }
    for _ in 0..cfg.n_anomalies {
        let start = rng.gen_range(first_day..nt - 40);
        let len = rng.gen_range(8..30);
        let cy = rng.gen_range(0..ny);
        let cx = rng.gen_range(0..nx);
        let radius = rng.gen_range(1..4) as f64;
        let strength = rng.gen_range(2.5..4.0);
        for y in 0..ny {
            for x in 0..nx {
                let dist = ((y as f64 - cy as f64).powi(2) + (x as f64 - cx as f64).powi(2)).sqrt();
                if dist > radius {
                    continue;
                }
                for t in start..start + len {
                    data[[t, y, x]] += strength;
                }
            }
        }
    }
}

fn make_track(
    id: usize,
    lat: &[f64],
    lon: &[f64],
    cfg: &SyntheticConfig,
    n_time: usize,
    rng: &mut impl Rng,
) -> EddyTrack {
    let polarity = if id % 2 == 0 {
        Polarity::Anticyclonic
    } else {
        Polarity::Cyclonic
    };
    let res = cfg.resolution;
    let lat_lo = lat[0] + 0.05 * res;
    let lat_hi = lat[lat.len() - 1] + 0.95 * res;
    let lon_lo = lon[0] + 0.05 * res;
    let lon_hi = lon[lon.len() - 1] + 0.95 * res;

    let len = rng.gen_range(4..20).min(n_time - 1);
    let t0 = rng.gen_range(1..n_time - len + 1);
    let mut y = rng.gen_range(lat_lo..lat_hi);
    let mut x = rng.gen_range(lon_lo..lon_hi);
    let amp0 = rng.gen_range(0.03..0.15);
    let scale0 = rng.gen_range(30.0..90.0);

    let mut track = EddyTrack {
        id,
        polarity,
        age: len as f64,
        lat: Vec::with_capacity(len),
        lon: Vec::with_capacity(len),
        time: Vec::with_capacity(len),
        amplitude: Vec::with_capacity(len),
        scale: Vec::with_capacity(len),
    };
    for step in 0..len {
        track.lat.push(y);
        track.lon.push(x);
        track.time.push((t0 + step) as f64);
        track.amplitude.push(amp0 * (1.0 + 0.1 * gaussian(rng)).max(0.1));
        track.scale.push(scale0 * (1.0 + 0.05 * gaussian(rng)).max(0.5));
        // westward drift with some meander
        y = (y + 0.02 * gaussian(rng)).clamp(lat_lo, lat_hi);
        x = (x - 0.05 + 0.02 * gaussian(rng)).clamp(lon_lo, lon_hi);
    }
    track
}

pub fn generate(cfg: &SyntheticConfig) -> Result<SyntheticDataset> {
    if cfg.n_lat == 0 || cfg.n_lon == 0 || cfg.num_years == 0 {
        return Err(MhwError::InvalidParameter(
            "synthetic grid needs at least one cell and one year".to_string(),
        ));
    }
    let res_factor = (1.0 / cfg.resolution).trunc();
    if !(res_factor >= 1.0) {
        return Err(MhwError::InvalidParameter(format!(
            "resolution must be in (0, 1], got {}",
            cfg.resolution
        )));
    }

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let lat = grid_axis(cfg.lat0, cfg.n_lat, res_factor);
    let lon = grid_axis(cfg.lon0, cfg.n_lon, res_factor);
    let nt = cfg.num_years * DAYS_IN_YEAR;

    let mut data = Array3::<f64>::zeros((nt, cfg.n_lat, cfg.n_lon));
    for ((t, y, _), v) in data.indexed_iter_mut() {
        *v = seasonal_sst(lat[y], lat[0], t % DAYS_IN_YEAR) + 0.4 * gaussian(&mut rng);
    }
    inject_anomalies(&mut data, cfg, &mut rng);

    let tracks = if nt > 1 {
        (0..cfg.n_eddies)
            .map(|id| make_track(id, &lat, &lon, cfg, nt, &mut rng))
            .collect()
    } else {
        Vec::new()
    };
    let area = cell_areas(&lat, lon.len(), cfg.resolution);
    let field = SstField::with_index_time(data, lat, lon)?;

    tracing::debug!(
        seed = cfg.seed,
        n_time = nt,
        n_lat = cfg.n_lat,
        n_lon = cfg.n_lon,
        eddies = tracks.len(),
        "Generated synthetic dataset"
    );
    Ok(SyntheticDataset { field, area, tracks })
}
