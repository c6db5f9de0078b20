use super::palette::{ColorPool, PaletteColor};
use crate::{decoder::ProbeId, error::Result, projector::TableRow};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use tracing::debug;

/// Chronological samples of one probe with its display color
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub probe_id: ProbeId,
    pub label: String,
    pub color: PaletteColor,
    pub latency: Vec<(NaiveDateTime, i64)>,
    pub hops: Vec<(NaiveDateTime, u32)>,
}

impl ChartSeries {
    pub fn max_latency(&self) -> Option<i64> {
        self.latency.iter().map(|(_, v)| *v).max()
    }

    pub fn max_hops(&self) -> Option<u32> {
        self.hops.iter().map(|(_, v)| *v).max()
    }
}

/// Rows of each probe, probes in first-seen order.
///
/// Rows of one probe need not be contiguous in the input.
pub fn group_by_probe<T, F>(rows: impl IntoIterator<Item = T>, key: F) -> IndexMap<ProbeId, Vec<T>>
where
    F: Fn(&T) -> ProbeId,
{
    let mut groups: IndexMap<ProbeId, Vec<T>> = IndexMap::new();
    for row in rows {
        groups.entry(key(&row)).or_default().push(row);
    }
    groups
}

/// Finished per-probe series plus the per-probe maxima used for scaling
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbePanels {
    pub series: Vec<ChartSeries>,
    pub latency_maxes: Vec<i64>,
    pub hop_maxes: Vec<u32>,
}

#[derive(Debug, Default)]
struct Accumulator {
    probe: Option<(ProbeId, String)>,
    latency: Vec<(NaiveDateTime, i64)>,
    hops: Vec<(NaiveDateTime, u32)>,
}

/// Scans rows probe by probe, closing a series whenever the probe changes.
/// [`SeriesBuilder::finish`] closes the last one.
#[derive(Debug)]
pub struct SeriesBuilder<'p> {
    pool: ColorPool<'p>,
    current: Accumulator,
    panels: ProbePanels,
}

impl<'p> SeriesBuilder<'p> {
    pub fn new(pool: ColorPool<'p>) -> Self {
        Self {
            pool,
            current: Accumulator::default(),
            panels: ProbePanels::default(),
        }
    }

    pub fn push(&mut self, row: &TableRow, created_at: NaiveDateTime) -> Result<()> {
        let switched = self
            .current
            .probe
            .as_ref()
            .is_some_and(|(probe_id, _)| *probe_id != row.probe_id);
        if switched {
            self.finalize()?;
        }

        if self.current.probe.is_none() {
            self.current.probe = Some((row.probe_id, row.origin.clone()));
        }
        self.current.latency.push((created_at, row.average_latency));
        self.current.hops.push((created_at, row.total_hops));
        Ok(())
    }

    pub fn finish(mut self) -> Result<ProbePanels> {
        self.finalize()?;
        debug!(
            "Finalized {} series using {} of {} colors",
            self.panels.series.len(),
            self.pool.allocated(),
            self.pool.capacity()
        );
        Ok(self.panels)
    }

    fn finalize(&mut self) -> Result<()> {
        let Accumulator {
            probe,
            latency,
            hops,
        } = std::mem::take(&mut self.current);

        let Some((probe_id, label)) = probe else {
            return Ok(());
        };

        let series = ChartSeries {
            probe_id,
            label,
            color: self.pool.allocate()?,
            latency,
            hops,
        };

        // Both are pushed together, so a series without samples never gets here
        if let (Some(max_latency), Some(max_hops)) = (series.max_latency(), series.max_hops()) {
            self.panels.latency_maxes.push(max_latency);
            self.panels.hop_maxes.push(max_hops);
        }
        self.panels.series.push(series);
        Ok(())
    }
}
