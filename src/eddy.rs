//! Joins tracked eddies to the SST grid and derives per-point eddy metrics.

use serde::Serialize;

use crate::climatology::Climatology;
use crate::constants::{
    DEG_TO_RAD, EARTH_RADIUS_CM, EARTH_ROTATION, GRAVITY_CM, KM_TO_CM, M_TO_CM, SECONDS_PER_DAY,
};
use crate::error::{MhwError, Result};
use crate::field::SstField;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Polarity {
    Cyclonic,
    Anticyclonic,
}

impl Polarity {
    /// Accepts the tracker's numeric flags too: 1 anticyclonic, 0 cyclonic.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "anticyclonic" | "1" => Some(Polarity::Anticyclonic),
            "cyclonic" | "0" => Some(Polarity::Cyclonic),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Polarity::Anticyclonic => "anticyclonic",
            Polarity::Cyclonic => "cyclonic",
        }
    }
}

/// One eddy as produced by the tracker. `amplitude` is in m, `scale` in km,
/// `time` is the tracker's 1-based day index.
#[derive(Clone, Debug, PartialEq)]
pub struct EddyTrack {
    pub id: usize,
    pub polarity: Polarity,
    pub age: f64,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub time: Vec<f64>,
    pub amplitude: Vec<f64>,
    pub scale: Vec<f64>,
}

impl EddyTrack {
    pub fn len(&self) -> usize {
        self.lat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lat.is_empty()
    }

    fn check_lengths(&self) -> Result<()> {
        let n = self.lat.len();
        for (name, len) in [
            ("eddy track lon length", self.lon.len()),
            ("eddy track time length", self.time.len()),
            ("eddy track amplitude length", self.amplitude.len()),
            ("eddy track scale length", self.scale.len()),
        ] {
            if len != n {
                return Err(MhwError::shape(name, n, len));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EddyPoint {
    pub time: f64,
    pub lat: f64,
    pub lon: f64,
    pub lat_index: usize,
    pub lon_index: usize,
    /// [°C]
    pub sst_absolute: f64,
    /// [°C]
    pub sst_anomaly: f64,
    /// [cm]
    pub amplitude: f64,
    /// [km]
    pub radius: f64,
    /// [cm/s]
    pub rot_velocity: f64,
    /// [cm/s]
    pub translation_speed: Option<f64>,
    pub nonlinearity: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EnrichedEddy {
    pub id: usize,
    pub polarity: Polarity,
    pub age: f64,
    pub points: Vec<EddyPoint>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EddyCensus {
    pub anticyclonic: Vec<EnrichedEddy>,
    pub cyclonic: Vec<EnrichedEddy>,
}

/// Snaps track coordinates down to the model grid.
struct GridLocator<'a> {
    res_factor: f64,
    lat: &'a [f64],
    lon: &'a [f64],
}

impl<'a> GridLocator<'a> {
    fn new(resolution: f64, lat: &'a [f64], lon: &'a [f64]) -> Result<Self> {
        let res_factor = (1.0 / resolution).trunc();
        if !(resolution > 0.0) || res_factor < 1.0 {
            return Err(MhwError::InvalidParameter(format!(
                "resolution must be in (0, 1], got {}",
                resolution
            )));
        }
        Ok(Self { res_factor, lat, lon })
    }

    fn round(&self, v: f64) -> f64 {
        (v * self.res_factor).floor() / self.res_factor
    }

    fn find(&self, axis: &'static str, coords: &[f64], value: f64) -> Result<usize> {
        let rounded = self.round(value);
        coords
            .iter()
            .position(|&c| c == rounded)
            .ok_or(MhwError::GridAssignment {
                axis,
                value,
                rounded,
            })
    }

    fn lat_index(&self, lat: f64) -> Result<usize> {
        self.find("latitude", self.lat, lat)
    }

    fn lon_index(&self, lon: f64) -> Result<usize> {
        self.find("longitude", self.lon, lon)
    }
}

pub fn coriolis(lat_deg: f64) -> f64 {
    2.0 * EARTH_ROTATION * (lat_deg * DEG_TO_RAD).sin()
}

/// Geostrophic rotational velocity `U = g/f * amp/radius` [cm/s], from
/// amplitude in m and radius in km.
pub fn rotational_velocity(lat_deg: f64, amplitude_m: f64, scale_km: f64) -> f64 {
    let scalar = GRAVITY_CM / coriolis(lat_deg);
    let amp_scale = amplitude_m / (scale_km * KM_TO_CM);
    scalar * amp_scale * 100.0
}

/// Speed between two consecutive daily positions [cm/s]. Degrees go into the
/// trig calls unconverted.
pub fn translation_speed(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    if lat1 == lat2 && lon1 == lon2 {
        return 0.0;
    }
    let cos_angle = lat2.sin() * lat1.sin() + (lon2 - lon1).cos() * lat2.cos() * lat1.cos();
    let distance = EARTH_RADIUS_CM * cos_angle.clamp(-1.0, 1.0).acos() * DEG_TO_RAD;
    distance / SECONDS_PER_DAY
}

fn enrich(
    track: &EddyTrack,
    field: &SstField,
    clim: &Climatology,
    grid: &GridLocator<'_>,
) -> Result<EnrichedEddy> {
    track.check_lengths()?;
    let max_time = field.n_time() - 1;
    let mut points: Vec<EddyPoint> = Vec::with_capacity(track.len());

    for x in 0..track.len() {
        let (lat, lon, time) = (track.lat[x], track.lon[x], track.time[x]);
        let lat_index = grid.lat_index(lat)?;
        let lon_index = grid.lon_index(lon)?;

        if !(time >= 1.0) || time as usize > max_time {
            return Err(MhwError::TimeOutOfRange { time, max: max_time });
        }
        let t = time as usize;
        // SST at t - 1, anomaly baseline at t
        let sst = field.value(t - 1, lat_index, lon_index);
        let rot_velocity = rotational_velocity(lat, track.amplitude[x], track.scale[x]);

        let (translation, nonlinearity) = if x >= 1 && track.age >= 2.0 {
            let c = translation_speed(track.lat[x - 1], track.lon[x - 1], lat, lon);
            let nl = rot_velocity / c;
            (Some(c), nl.is_finite().then_some(nl))
        } else {
            (None, None)
        };

        points.push(EddyPoint {
            time,
            lat,
            lon,
            lat_index,
            lon_index,
            sst_absolute: sst,
            sst_anomaly: sst - clim.mean_at(t, lat_index, lon_index),
            amplitude: track.amplitude[x] * M_TO_CM,
            radius: track.scale[x],
            rot_velocity,
            translation_speed: translation,
            nonlinearity,
        });
    }

    Ok(EnrichedEddy {
        id: track.id,
        polarity: track.polarity,
        age: track.age,
        points,
    })
}

/// Any off-grid coordinate or out-of-range time aborts the whole census.
pub fn eddy_census(
    tracks: &[EddyTrack],
    field: &SstField,
    clim: &Climatology,
    resolution: f64,
) -> Result<EddyCensus> {
    let grid = GridLocator::new(resolution, field.lat(), field.lon())?;
    let mut census = EddyCensus::default();
    for track in tracks {
        let eddy = enrich(track, field, clim, &grid)?;
        match eddy.polarity {
            Polarity::Anticyclonic => census.anticyclonic.push(eddy),
            Polarity::Cyclonic => census.cyclonic.push(eddy),
        }
    }
    Ok(census)
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlotReady {
    pub sst_absolute: Vec<f64>,
    pub sst_anomaly: Vec<f64>,
    pub amplitude: Vec<f64>,
    pub radius: Vec<f64>,
    pub rot_velocity: Vec<f64>,
}

impl PlotReady {
    pub fn len(&self) -> usize {
        self.sst_absolute.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sst_absolute.is_empty()
    }
}

pub fn plot_ready(eddies: &[EnrichedEddy]) -> PlotReady {
    let mut out = PlotReady::default();
    for p in eddies.iter().flat_map(|e| e.points.iter()) {
        out.sst_absolute.push(p.sst_absolute);
        out.sst_anomaly.push(p.sst_anomaly);
        out.amplitude.push(p.amplitude);
        out.radius.push(p.radius);
        out.rot_velocity.push(p.rot_velocity);
    }
    out
}
