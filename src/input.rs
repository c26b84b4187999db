//! Plain-text input directory: axes, SST rows, optional area grid and eddy
//! tracks.
//!
//! ```text
//! lat.txt lon.txt [time.txt]   one number per line, '#' comments allowed
//! sst.csv                      one row per day, lat*lon values, lat-major
//! [area.csv]                   one row per latitude, m²
//! [eddy_tracks.csv]            eddy_id,type,age,time,lat,lon,amp,scale
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{Array2, Array3};

use crate::eddy::{EddyTrack, Polarity};
use crate::error::{MhwError, Result};
use crate::field::SstField;

pub struct InputData {
    pub field: SstField,
    pub area: Option<Array2<f64>>,
    pub tracks: Vec<EddyTrack>,
}

fn parse_error(path: &Path, line: usize, msg: impl Into<String>) -> MhwError {
    MhwError::Parse {
        path: path.to_path_buf(),
        line,
        msg: msg.into(),
    }
}

/// Empty cells and any spelling of `nan` are missing values.
fn parse_value(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    s.parse::<f64>().ok()
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "Cannot read input file");
        MhwError::Io(e)
    })
}

fn data_lines(contents: &str) -> impl Iterator<Item = (usize, &str)> {
    contents
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
}

pub fn read_axis(path: &Path) -> Result<Vec<f64>> {
    let contents = read_text(path)?;
    data_lines(&contents)
        .map(|(n, l)| {
            l.parse::<f64>()
                .map_err(|_| parse_error(path, n, format!("not a number: '{}'", l)))
        })
        .collect()
}

pub fn read_rows(path: &Path, width: usize) -> Result<Vec<Vec<f64>>> {
    let contents = read_text(path)?;
    data_lines(&contents)
        .map(|(n, l)| {
            let row = l
                .split(',')
                .map(|c| parse_value(c).ok_or_else(|| parse_error(path, n, format!("not a number: '{}'", c.trim()))))
                .collect::<Result<Vec<f64>>>()?;
            if row.len() != width {
                return Err(MhwError::shape("row width", width, format!("{} at {}:{}", row.len(), path.display(), n)));
            }
            Ok(row)
        })
        .collect()
}

pub fn read_field(dir: &Path, kelvin_offset: f64) -> Result<SstField> {
    let lat = read_axis(&dir.join("lat.txt"))?;
    let lon = read_axis(&dir.join("lon.txt"))?;
    let rows = read_rows(&dir.join("sst.csv"), lat.len() * lon.len())?;

    let nt = rows.len();
    let flat: Vec<f64> = rows.into_iter().flatten().map(|v| v - kelvin_offset).collect();
    let data = Array3::from_shape_vec((nt, lat.len(), lon.len()), flat)
        .map_err(|e| MhwError::shape("sst.csv", "time x lat x lon", e.to_string()))?;

    let time_path = dir.join("time.txt");
    if time_path.exists() {
        SstField::new(data, lat, lon, read_axis(&time_path)?)
    } else {
        SstField::with_index_time(data, lat, lon)
    }
}

pub fn read_area(path: &Path, n_lat: usize, n_lon: usize) -> Result<Array2<f64>> {
    let rows = read_rows(path, n_lon)?;
    if rows.len() != n_lat {
        return Err(MhwError::shape("area.csv rows", n_lat, rows.len()));
    }
    Array2::from_shape_vec((n_lat, n_lon), rows.into_iter().flatten().collect())
        .map_err(|e| MhwError::shape("area.csv", "lat x lon", e.to_string()))
}

const TRACK_HEADER: [&str; 8] = ["eddy_id", "type", "age", "time", "lat", "lon", "amp", "scale"];

/// Rows are grouped by `eddy_id`; tracks keep the order in which their ids
/// first appear, points keep file order.
pub fn read_tracks(path: &Path) -> Result<Vec<EddyTrack>> {
    let contents = read_text(path)?;
    let mut lines = data_lines(&contents);
    match lines.next() {
        Some((_, header)) if header.split(',').map(str::trim).eq(TRACK_HEADER) => {}
        Some((n, header)) => {
            return Err(parse_error(path, n, format!("unexpected header '{}'", header)));
        }
        None => return Ok(Vec::new()),
    }

    let mut tracks: Vec<EddyTrack> = Vec::new();
    let mut by_id: HashMap<usize, usize> = HashMap::new();
    for (n, line) in lines {
        let cols: Vec<&str> = line.split(',').map(str::trim).collect();
        if cols.len() != TRACK_HEADER.len() {
            return Err(parse_error(path, n, format!("expected {} columns, got {}", TRACK_HEADER.len(), cols.len())));
        }
        let id: usize = cols[0]
            .parse()
            .map_err(|_| parse_error(path, n, format!("bad eddy_id '{}'", cols[0])))?;
        let polarity = Polarity::parse(cols[1])
            .ok_or_else(|| parse_error(path, n, format!("bad eddy type '{}'", cols[1])))?;
        let mut nums = [0.0f64; 6];
        for (slot, raw) in nums.iter_mut().zip(&cols[2..]) {
            *slot = raw
                .parse()
                .map_err(|_| parse_error(path, n, format!("not a number: '{}'", raw)))?;
        }
        let [age, time, lat, lon, amp, scale] = nums;

        let pos = *by_id.entry(id).or_insert_with(|| {
            tracks.push(EddyTrack {
                id,
                polarity,
                age,
                lat: Vec::new(),
                lon: Vec::new(),
                time: Vec::new(),
                amplitude: Vec::new(),
                scale: Vec::new(),
            });
            tracks.len() - 1
        });
        let track = &mut tracks[pos];
        track.lat.push(lat);
        track.lon.push(lon);
        track.time.push(time);
        track.amplitude.push(amp);
        track.scale.push(scale);
    }
    Ok(tracks)
}

pub fn load_input_dir(dir: &Path, kelvin_offset: f64) -> Result<InputData> {
    let field = read_field(dir, kelvin_offset)?;
    tracing::debug!(
        n_time = field.n_time(),
        n_lat = field.n_lat(),
        n_lon = field.n_lon(),
        "Loaded SST field"
    );

    let area_path = dir.join("area.csv");
    let area = if area_path.exists() {
        Some(read_area(&area_path, field.n_lat(), field.n_lon())?)
    } else {
        None
    };

    let tracks_path: PathBuf = dir.join("eddy_tracks.csv");
    let tracks = if tracks_path.exists() {
        read_tracks(&tracks_path)?
    } else {
        Vec::new()
    };
    tracing::debug!(tracks = tracks.len(), has_area = area.is_some(), "Loaded optional inputs");

    Ok(InputData { field, area, tracks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mhw_eddy_input_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(dir: &Path, name: &str, contents: &str) {
        let mut f = fs::File::create(dir.join(name)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn loads_a_complete_directory() {
        let dir = scratch_dir("complete");
        write(&dir, "lat.txt", "# degrees north\n10.0\n10.25\n");
        write(&dir, "lon.txt", "150.0\n");
        let mut sst = String::new();
        for d in 0..365 {
            if d == 3 {
                sst.push_str("nan,300.15\n");
            } else {
                sst.push_str(&format!("{},{}\n", 290.15, 291.15 + d as f64 * 0.01));
            }
        }
        write(&dir, "sst.csv", &sst);
        write(&dir, "area.csv", "7.5e8\n7.4e8\n");
        write(
            &dir,
            "eddy_tracks.csv",
            "eddy_id,type,age,time,lat,lon,amp,scale\n\
             4,anticyclonic,2,10,10.1,150.1,0.05,40\n\
             2,0,1,20,10.3,150.2,0.02,30\n\
             4,anticyclonic,2,11,10.2,150.1,0.06,41\n",
        );

        let input = load_input_dir(&dir, 273.15).unwrap();
        let field = &input.field;
        assert_eq!((field.n_time(), field.n_lat(), field.n_lon()), (365, 2, 1));
        assert!((field.value(0, 0, 0) - 17.0).abs() < 1e-9);
        assert!(field.value(3, 0, 0).is_nan());
        assert!((field.value(3, 1, 0) - 27.0).abs() < 1e-9);
        assert_eq!(field.time()[364], 364.0);

        let area = input.area.unwrap();
        assert_eq!(area[[1, 0]], 7.4e8);

        assert_eq!(input.tracks.len(), 2);
        assert_eq!(input.tracks[0].id, 4);
        assert_eq!(input.tracks[0].time, vec![10.0, 11.0]);
        assert_eq!(input.tracks[0].polarity, Polarity::Anticyclonic);
        assert_eq!(input.tracks[1].polarity, Polarity::Cyclonic);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn ragged_rows_and_bad_numbers_fail() {
        let dir = scratch_dir("ragged");
        write(&dir, "rows.csv", "1,2\n3\n");
        assert!(matches!(
            read_rows(&dir.join("rows.csv"), 2),
            Err(MhwError::ShapeMismatch { .. })
        ));
        write(&dir, "axis.txt", "1\nabc\n");
        match read_axis(&dir.join("axis.txt")) {
            Err(MhwError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other.map(|v| v.len())),
        }
        write(&dir, "tracks.csv", "id,type\n");
        assert!(read_tracks(&dir.join("tracks.csv")).is_err());
        let _ = fs::remove_dir_all(&dir);
    }
}
