//! Physical and calendar constants shared by the heatwave and eddy passes.

/// Fixed model year, no leap days [days].
pub const DAYS_IN_YEAR: usize = 365;

/// Minimum heatwave length, after Hobday et al. (2016) [days].
pub const DEFAULT_MIN_DURATION: usize = 5;

/// Gravitational acceleration [cm/s^2].
pub const GRAVITY_CM: f64 = 981.0;

/// Earth radius [cm].
pub const EARTH_RADIUS_CM: f64 = 637_813_700.0;

/// Earth rotation rate [rad/s].
pub const EARTH_ROTATION: f64 = 7.2921e-5;

/// Seconds in one day [s].
pub const SECONDS_PER_DAY: f64 = 86_400.0;

pub const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// Kelvin to Celsius offset [K].
pub const KELVIN_OFFSET: f64 = 273.15;

/// Square metres in a square kilometre.
pub const M2_PER_KM2: f64 = 1.0e6;

/// Eddy radius unit (km) to cm.
pub const KM_TO_CM: f64 = 100_000.0;

/// Eddy amplitude unit (m) to cm.
pub const M_TO_CM: f64 = 100.0;
