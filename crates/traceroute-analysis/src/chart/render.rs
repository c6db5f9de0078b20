use super::{
    ChartModel,
    hourly::{HourlyAverage, HourlyPanel},
    palette::PaletteColor,
    scale::TickPair,
};
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime};
use plotters::{coord::Shift, prelude::*};
use std::{fmt::Display, path::Path};
use tracing::info;

const OVERALL_COLOR: RGBColor = RGBColor(0x1f, 0x77, 0xb4);
// Half an hour of padding when all samples share one timestamp
const WINDOW_PADDING_SECS: f64 = 1800.0;

fn render_error(e: impl Display) -> Error {
    Error::Render(e.to_string())
}

fn rgb(color: PaletteColor) -> RGBColor {
    RGBColor(color.r, color.g, color.b)
}

/// Draws the four panel chart of a measurement as SVG
pub fn render_svg(model: &ChartModel, path: &Path, size: (u32, u32)) -> Result<()> {
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(render_error)?;
    let root = root
        .titled(&model.title, ("sans-serif", 28))
        .map_err(render_error)?;

    let panels = root.split_evenly((2, 2));

    draw_hourly(
        &panels[0],
        "Average Latency for All Probes by Hour of Day (ms)",
        "Average latency",
        &model.hourly,
        |p| p.latency,
        model.scales.hourly_latency,
        |y| format!("{y:.0}ms"),
    )?;
    draw_hourly(
        &panels[1],
        "Average Hop Count for All Probes by Hour of Day",
        "Average hops",
        &model.hourly,
        |p| p.hops,
        model.scales.hourly_hops,
        |y| format!("{y:.2}"),
    )?;

    let window = time_window(model);
    draw_over_time(
        &panels[2],
        "Probes Average Latency over Time (ms)",
        "Average latency",
        window,
        model
            .probes
            .series
            .iter()
            .map(|s| (s.label.as_str(), s.color, points(&s.latency, |v| v as f64)))
            .collect(),
        model.scales.probe_latency,
        |y| format!("{y:.0}ms"),
        true,
    )?;
    draw_over_time(
        &panels[3],
        "Probes Average Hop Count over Time",
        "Average hops",
        window,
        model
            .probes
            .series
            .iter()
            .map(|s| (s.label.as_str(), s.color, points(&s.hops, f64::from)))
            .collect(),
        model.scales.probe_hops,
        |y| format!("{y:.0}"),
        false,
    )?;

    root.present().map_err(render_error)?;
    info!("Rendered chart for measurement {} to {}", model.measurement_id, path.display());
    Ok(())
}

fn points<V: Copy>(samples: &[(NaiveDateTime, V)], to_f64: impl Fn(V) -> f64) -> Vec<(f64, f64)> {
    samples
        .iter()
        .map(|(at, v)| (epoch_secs(at), to_f64(*v)))
        .collect()
}

fn epoch_secs(at: &NaiveDateTime) -> f64 {
    at.and_utc().timestamp() as f64
}

fn time_window(model: &ChartModel) -> (f64, f64) {
    match model.time_window {
        Some((start, end)) if start < end => (epoch_secs(&start), epoch_secs(&end)),
        Some((start, _)) => {
            let at = epoch_secs(&start);
            (at - WINDOW_PADDING_SECS, at + WINDOW_PADDING_SECS)
        }
        None => (0.0, 2.0 * WINDOW_PADDING_SECS),
    }
}

/// Axis range aligned to whole major ticks around the values
fn axis_bounds(values: impl Iterator<Item = f64>, ticks: TickPair) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold(None, |range: Option<(f64, f64)>, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .unwrap_or((0.0, ticks.major));

    let lo = (lo / ticks.major).floor() * ticks.major;
    let mut hi = (hi / ticks.major).ceil() * ticks.major;
    if hi <= lo {
        hi = lo + ticks.major;
    }
    (lo, hi)
}

fn label_count(bounds: (f64, f64), ticks: TickPair) -> usize {
    ((bounds.1 - bounds.0) / ticks.major).round() as usize + 1
}

fn draw_hourly<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    caption: &str,
    y_desc: &str,
    panel: &HourlyPanel,
    value: impl Fn(&HourlyAverage) -> f64,
    ticks: TickPair,
    y_format: impl Fn(&f64) -> String,
) -> Result<()> {
    let bounds = axis_bounds(panel.points.iter().map(&value), ticks);

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 16))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(55)
        .build_cartesian_2d(0f64..23f64, bounds.0..bounds.1)
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .x_desc("Time of day")
        .y_desc(y_desc)
        .x_labels(24)
        .x_label_formatter(&|x| format!("{:02}h", x.round() as i64))
        .y_labels(label_count(bounds, ticks))
        .max_light_lines(ticks.minor_per_major())
        .y_label_formatter(&y_format)
        .draw()
        .map_err(render_error)?;

    // Empty hours split the line instead of being interpolated over
    for segment in panel.segments() {
        chart
            .draw_series(LineSeries::new(
                segment.iter().map(|p| (f64::from(p.hour), value(p))),
                OVERALL_COLOR.stroke_width(2),
            ))
            .map_err(render_error)?;
    }

    chart
        .draw_series(
            panel
                .points
                .iter()
                .map(|p| Circle::new((f64::from(p.hour), value(p)), 2, OVERALL_COLOR.filled())),
        )
        .map_err(render_error)?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn draw_over_time<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    caption: &str,
    y_desc: &str,
    window: (f64, f64),
    series: Vec<(&str, PaletteColor, Vec<(f64, f64)>)>,
    ticks: TickPair,
    y_format: impl Fn(&f64) -> String,
    with_legend: bool,
) -> Result<()> {
    let bounds = axis_bounds(
        series.iter().flat_map(|(_, _, pts)| pts.iter().map(|p| p.1)),
        ticks,
    );

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 16))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(55)
        .build_cartesian_2d(window.0..window.1, bounds.0..bounds.1)
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .x_desc("Created at")
        .y_desc(y_desc)
        .x_labels(12)
        .x_label_formatter(&|x| {
            DateTime::from_timestamp(*x as i64, 0)
                .map(|dt| dt.format("%d %Hh").to_string())
                .unwrap_or_default()
        })
        .y_labels(label_count(bounds, ticks))
        .max_light_lines(ticks.minor_per_major())
        .y_label_formatter(&y_format)
        .draw()
        .map_err(render_error)?;

    for (label, color, pts) in series {
        let color = rgb(color);
        chart
            .draw_series(LineSeries::new(pts, color.stroke_width(2)))
            .map_err(render_error)?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
    }

    if with_legend {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(render_error)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_bounds_align_to_major_ticks() {
        let ticks = TickPair::new(5.0, 1.0);
        assert_eq!(axis_bounds([41.0, 58.0].into_iter(), ticks), (40.0, 60.0));
        assert_eq!(axis_bounds([40.0].into_iter(), ticks), (40.0, 45.0));
        assert_eq!(axis_bounds(std::iter::empty(), ticks), (0.0, 5.0));
    }

    #[test]
    fn test_label_count() {
        assert_eq!(label_count((40.0, 60.0), TickPair::new(5.0, 1.0)), 5);
    }
}
