//! PNG figures for a finished run.

use plotters::prelude::*;

use crate::constants::DAYS_IN_YEAR;
use crate::eddy::PlotReady;
use crate::metrics::{Category, CellHeatwaves};

/// Equal-width bins with each bin's share of the sample in percent.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    /// `bins + 1` edges; the last bin is closed on the right.
    pub edges: Vec<f64>,
    pub percent: Vec<f64>,
}

impl Histogram {
    pub fn is_empty(&self) -> bool {
        self.percent.is_empty()
    }
}

/// Bin the finite values of `values`. A constant sample gets one unit-wide
/// bin centred on the value; an empty sample gets no bins.
pub fn histogram_percent(values: &[f64], bins: usize) -> Histogram {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Histogram {
            edges: Vec::new(),
            percent: Vec::new(),
        };
    }
    let lo = finite.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = finite.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if hi == lo {
        return Histogram {
            edges: vec![lo - 0.5, lo + 0.5],
            percent: vec![100.0],
        };
    }

    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in &finite {
        let k = (((v - lo) / width) as usize).min(bins - 1);
        counts[k] += 1;
    }
    let n = finite.len() as f64;
    Histogram {
        edges: (0..=bins).map(|k| lo + k as f64 * width).collect(),
        percent: counts.iter().map(|&c| 100.0 * c as f64 / n).collect(),
    }
}

/// Share of events per category, in `Category::ALL` order; events without a
/// category are part of the denominator.
pub fn category_percent(cells: &[CellHeatwaves]) -> [f64; 4] {
    let mut counts = [0usize; 4];
    let mut total = 0usize;
    for ev in cells.iter().flat_map(|c| &c.events) {
        total += 1;
        if let Some(c) = ev.category {
            counts[c as usize] += 1;
        }
    }
    if total == 0 {
        return [0.0; 4];
    }
    counts.map(|c| 100.0 * c as f64 / total as f64)
}

/// Events per analysis year, by `floor((time_start - t0) / 365)`.
pub fn yearly_incidence(cells: &[CellHeatwaves], t0: f64, num_years: usize) -> Vec<usize> {
    let mut counts = vec![0usize; num_years];
    if num_years == 0 {
        return counts;
    }
    for ev in cells.iter().flat_map(|c| &c.events) {
        let year = ((ev.time_start - t0) / DAYS_IN_YEAR as f64).floor().max(0.0) as usize;
        counts[year.min(num_years - 1)] += 1;
    }
    counts
}

type PlotResult = Result<(), Box<dyn std::error::Error>>;

fn draw_bars(
    area: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
    title: &str,
    x_label: &str,
    y_label: &str,
    bars: &[(f64, f64, f64)],
    color: RGBColor,
) -> PlotResult {
    let (x_min, x_max) = match (bars.first(), bars.last()) {
        (Some(f), Some(l)) => (f.0, l.1),
        _ => (0.0, 1.0),
    };
    let y_max = bars.iter().map(|b| b.2).fold(0.0, f64::max).max(1.0) * 1.1;

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 18).into_font())
        .margin(15)
        .x_label_area_size(35)
        .y_label_area_size(50)
        .build_cartesian_2d(x_min..x_max, 0.0..y_max)?;

    chart.configure_mesh().x_desc(x_label).y_desc(y_label).draw()?;
    chart.draw_series(
        bars.iter()
            .map(|&(x0, x1, y)| Rectangle::new([(x0, 0.0), (x1, y)], color.filled())),
    )?;
    Ok(())
}

fn histogram_bars(h: &Histogram) -> Vec<(f64, f64, f64)> {
    h.edges
        .windows(2)
        .zip(&h.percent)
        .map(|(e, &p)| (e[0], e[1], p))
        .collect()
}

/// Raw event counts per year, one bar per analysis year.
fn incidence_bars(cells: &[CellHeatwaves], t0: f64, num_years: usize) -> Vec<(f64, f64, f64)> {
    yearly_incidence(cells, t0, num_years)
        .iter()
        .enumerate()
        .map(|(y, &n)| (y as f64, y as f64 + 0.9, n as f64))
        .collect()
}

/// 1×4 panel: duration, peak threshold-relative intensity, category and
/// yearly incidence.
pub fn save_histograms(cells: &[CellHeatwaves], t0: f64, num_years: usize, filename: &str) -> PlotResult {
    let root = BitMapBackend::new(filename, (1800, 450)).into_drawing_area();
    root.fill(&WHITE)?;
    let areas = root.split_evenly((1, 4));

    let durations: Vec<f64> = cells.iter().flat_map(|c| &c.events).map(|e| e.duration as f64).collect();
    let peaks: Vec<f64> = cells
        .iter()
        .flat_map(|c| &c.events)
        .map(|e| e.intensity_rel_thresh.max)
        .collect();

    draw_bars(
        &areas[0],
        "Duration",
        "days",
        "% of events",
        &histogram_bars(&histogram_percent(&durations, 20)),
        BLUE,
    )?;
    draw_bars(
        &areas[1],
        "Max intensity above threshold",
        "°C",
        "% of events",
        &histogram_bars(&histogram_percent(&peaks, 20)),
        RED,
    )?;

    let cat_bars: Vec<(f64, f64, f64)> = category_percent(cells)
        .iter()
        .enumerate()
        .map(|(k, &p)| (k as f64 + 1.0, k as f64 + 1.9, p))
        .collect();
    draw_bars(
        &areas[2],
        "Category (1-4)",
        Category::ALL.map(Category::label).join(" / ").as_str(),
        "% of events",
        &cat_bars,
        MAGENTA,
    )?;

    let year_bars = incidence_bars(cells, t0, num_years);
    draw_bars(&areas[3], "Yearly incidence", "year", "events", &year_bars, GREEN)?;

    root.present()?;
    Ok(())
}

pub fn save_area_series(daily_km2: &[f64], filename: &str) -> PlotResult {
    let root = BitMapBackend::new(filename, (1200, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let y_max = daily_km2.iter().cloned().fold(0.0, f64::max);
    let y_pad = y_max * 0.1 + 1e-10;
    let x_max = daily_km2.len().max(1) as f64;

    let mut chart = ChartBuilder::on(&root)
        .caption("Daily marine heatwave area", ("sans-serif", 18).into_font())
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(0.0..x_max, 0.0..(y_max + y_pad))?;

    chart.configure_mesh().x_desc("day").y_desc("area [km²]").draw()?;
    chart.draw_series(LineSeries::new(
        daily_km2.iter().enumerate().map(|(i, &a)| (i as f64, a)),
        &BLUE,
    ))?;

    root.present()?;
    Ok(())
}

/// SST anomaly against amplitude, anticyclonic red, cyclonic blue.
pub fn save_eddy_scatter(anticyclonic: &PlotReady, cyclonic: &PlotReady, filename: &str) -> PlotResult {
    let pairs = |p: &PlotReady| -> Vec<(f64, f64)> {
        p.amplitude
            .iter()
            .zip(&p.sst_anomaly)
            .map(|(&x, &y)| (x, y))
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect()
    };
    let ac = pairs(anticyclonic);
    let cy = pairs(cyclonic);
    let all: Vec<&(f64, f64)> = ac.iter().chain(&cy).collect();

    let root = BitMapBackend::new(filename, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let x_min = all.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let x_max = all.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let y_min = all.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let y_max = all.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    let (x_min, x_max, y_min, y_max) = if all.is_empty() {
        (0.0, 1.0, -1.0, 1.0)
    } else {
        (x_min, x_max, y_min, y_max)
    };
    let x_pad = (x_max - x_min).abs() * 0.1 + 1e-10;
    let y_pad = (y_max - y_min).abs() * 0.1 + 1e-10;

    let mut chart = ChartBuilder::on(&root)
        .caption("Eddy SST anomaly vs amplitude", ("sans-serif", 18).into_font())
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d((x_min - x_pad)..(x_max + x_pad), (y_min - y_pad)..(y_max + y_pad))?;

    chart.configure_mesh().x_desc("amplitude [cm]").y_desc("SST anomaly [°C]").draw()?;

    chart
        .draw_series(ac.iter().map(|&(x, y)| Circle::new((x, y), 3, RED.filled())))?
        .label("anticyclonic")
        .legend(|(x, y)| Circle::new((x, y), 3, RED.filled()));
    chart
        .draw_series(cy.iter().map(|&(x, y)| Circle::new((x, y), 3, BLUE.filled())))?
        .label("cyclonic")
        .legend(|(x, y)| Circle::new((x, y), 3, BLUE.filled()));
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
