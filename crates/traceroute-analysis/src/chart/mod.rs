pub mod hourly;
pub mod palette;
pub mod render;
pub mod scale;
pub mod series;

use crate::{decoder::MeasurementId, error::Result, projector::TableRow};
use chrono::NaiveDateTime;
use hourly::{HourBuckets, HourlyPanel};
use palette::{ColorPool, PaletteColor, PalettePolicy};
use scale::{ScaleTable, TickPair, amplitude};
use series::{ProbePanels, SeriesBuilder, group_by_probe};
use std::collections::BTreeMap;

pub use render::render_svg;

/// Tick spacing chosen for each of the four panels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelScales {
    pub hourly_latency: TickPair,
    pub hourly_hops: TickPair,
    pub probe_latency: TickPair,
    pub probe_hops: TickPair,
}

/// Everything needed to draw one measurement's chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartModel {
    pub measurement_id: MeasurementId,
    pub title: String,
    pub hourly: HourlyPanel,
    pub probes: ProbePanels,
    pub scales: PanelScales,
    /// First and last sample time, `None` without rows
    pub time_window: Option<(NaiveDateTime, NaiveDateTime)>,
}

/// Turns the table rows of one measurement into chart series and scales
#[derive(Debug, Clone, Copy)]
pub struct ChartBuilder<'a> {
    palette: &'a [PaletteColor],
    policy: PalettePolicy,
    scales: &'a ScaleTable,
}

impl<'a> ChartBuilder<'a> {
    pub fn new(palette: &'a [PaletteColor], policy: PalettePolicy, scales: &'a ScaleTable) -> Self {
        Self {
            palette,
            policy,
            scales,
        }
    }

    pub fn build(
        &self,
        measurement_id: MeasurementId,
        title: impl Into<String>,
        rows: &[TableRow],
    ) -> Result<ChartModel> {
        let timed = rows
            .iter()
            .map(|row| Ok((row, row.created_at_time()?)))
            .collect::<Result<Vec<_>>>()?;

        let mut buckets = HourBuckets::new();
        let mut series = SeriesBuilder::new(ColorPool::new(self.palette, self.policy));

        for (_, group) in group_by_probe(timed.iter(), |(row, _)| row.probe_id) {
            for (row, created_at) in group {
                buckets.add(created_at, row.average_latency, row.total_hops);
                series.push(row, *created_at)?;
            }
        }

        let hourly = buckets.panel();
        let probes = series.finish()?;

        let scales = PanelScales {
            hourly_latency: self.scales.hourly_latency.select(hourly.latency_amplitude()),
            hourly_hops: self.scales.hourly_hops.select(hourly.hops_amplitude()),
            probe_latency: self
                .scales
                .probe_latency
                .select(amplitude(probes.latency_maxes.iter().map(|v| *v as f64))),
            probe_hops: self
                .scales
                .probe_hops
                .select(amplitude(probes.hop_maxes.iter().map(|v| f64::from(*v)))),
        };

        let time_window = timed
            .iter()
            .map(|(_, at)| *at)
            .min()
            .zip(timed.iter().map(|(_, at)| *at).max());

        Ok(ChartModel {
            measurement_id,
            title: title.into(),
            hourly,
            probes,
            scales,
            time_window,
        })
    }
}

/// "Measurements for {label}" for known measurements
pub fn chart_title(measurement_id: MeasurementId, labels: &BTreeMap<String, String>) -> String {
    match labels.get(&measurement_id.to_string()) {
        Some(label) => format!("Measurements for {label}"),
        None => format!("Measurements table_{measurement_id}"),
    }
}
