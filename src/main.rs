mod area;
mod climatology;
mod constants;
mod detect;
mod eddy;
mod error;
mod field;
mod input;
mod load_params;
mod metrics;
mod output;
mod params;
mod plots;
mod synthetic;

use ndarray::Array2;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::eddy::{EddyTrack, Polarity};
use crate::field::SstField;
use crate::output::RunTotals;
use crate::params::AnalysisParams;
use crate::synthetic::SyntheticConfig;

struct Dataset {
    field: SstField,
    area: Option<Array2<f64>>,
    tracks: Vec<EddyTrack>,
}

fn load_dataset(params: &AnalysisParams) -> error::Result<Dataset> {
    let dataset = match &params.input_dir {
        Some(dir) => {
            tracing::info!(input_dir = %dir.display(), "Loading input directory");
            let input = input::load_input_dir(dir, params.kelvin_offset)?;
            Dataset {
                field: input.field,
                area: input.area,
                tracks: input.tracks,
            }
        }
        None => {
            tracing::info!(seed = params.seed, "No input directory configured, generating synthetic dataset");
            let ds = synthetic::generate(&SyntheticConfig::for_params(params))?;
            Dataset {
                field: ds.field,
                area: Some(ds.area),
                tracks: ds.tracks,
            }
        }
    };
    let Dataset { field, area, tracks } = dataset;
    Ok(Dataset {
        field: field.truncate_years(params.num_years)?,
        area,
        tracks,
    })
}

/// Progress callback that logs roughly every tenth of the work.
fn progress_logger(stage: &'static str) -> impl Fn(usize, usize) + Sync {
    move |done, total| {
        let step = (total / 10).max(1);
        if done == total || done % step == 0 {
            tracing::info!(stage, done, total, "progress");
        }
    }
}

fn run(params: &AnalysisParams) -> Result<String, Box<dyn std::error::Error>> {
    let data = load_dataset(params)?;
    let field = &data.field;
    tracing::info!(
        n_time = field.n_time(),
        n_lat = field.n_lat(),
        n_lon = field.n_lon(),
        years = field.num_years(),
        "Dataset ready"
    );

    let clim = climatology::build_climatology(
        field,
        params.num_years_clim,
        params.pctile,
        progress_logger("climatology"),
    )?;
    let cells = metrics::detect_heatwaves(field, &clim, params.min_duration, progress_logger("heatwaves"));
    let n_events: usize = cells.iter().map(|c| c.n_events()).sum();
    tracing::info!(cells = cells.len(), events = n_events, "Heatwave detection finished");

    let area_series = match &data.area {
        Some(area) => Some(area::aggregate_area(
            &cells,
            area,
            (field.n_lat(), field.n_lon()),
            params.num_years,
            field.time(),
        )?),
        None => {
            tracing::warn!("No cell areas available, skipping area aggregation");
            None
        }
    };

    let census = if data.tracks.is_empty() {
        tracing::info!("No eddy tracks, skipping eddy census");
        None
    } else {
        let census = eddy::eddy_census(&data.tracks, field, &clim, params.resolution)?;
        tracing::info!(
            anticyclonic = census.anticyclonic.len(),
            cyclonic = census.cyclonic.len(),
            "Eddy census finished"
        );
        Some(census)
    };

    let (dir, timestamp) = output::create_run_dir(&params.output_root, &params.run)?;
    output::write_heatwaves_json(&dir, &cells)?;
    output::write_events_csv(&dir, &cells)?;
    if let Some(series) = &area_series {
        output::write_area_csvs(&dir, series, field.time())?;
    }
    if let Some(census) = &census {
        let anticyclonic = eddy::plot_ready(&census.anticyclonic);
        let cyclonic = eddy::plot_ready(&census.cyclonic);
        output::write_eddies_csv(&dir, Polarity::Anticyclonic, &census.anticyclonic)?;
        output::write_eddies_csv(&dir, Polarity::Cyclonic, &census.cyclonic)?;
        output::write_plot_ready_csv(&dir, Polarity::Anticyclonic, &anticyclonic)?;
        output::write_plot_ready_csv(&dir, Polarity::Cyclonic, &cyclonic)?;
        if params.make_plots {
            plots::save_eddy_scatter(&anticyclonic, &cyclonic, &format!("{}/eddy_scatter.png", dir))?;
        }
    }
    if params.make_plots {
        let t0 = field.time().first().copied().unwrap_or(0.0);
        plots::save_histograms(&cells, t0, params.num_years, &format!("{}/mhw_histograms.png", dir))?;
        if let Some(series) = &area_series {
            plots::save_area_series(&series.daily_km2, &format!("{}/mhw_area.png", dir))?;
        }
    }

    let totals = RunTotals::collect(&cells, area_series.as_ref(), census.as_ref());
    output::write_summary(&dir, &timestamp, params, &totals)?;
    Ok(dir)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let params = match AnalysisParams::from_env() {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    tracing::info!(
        run = %params.run,
        pctile = params.pctile,
        num_years_clim = params.num_years_clim,
        num_years = params.num_years,
        "Starting marine heatwave run"
    );

    match run(&params) {
        Ok(dir) => {
            tracing::info!(output_dir = %dir, "Run finished");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            Err(e)
        }
    }
}
