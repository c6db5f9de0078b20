use crate::{
    decoder::{AttemptRecord, Hop, MeasurementId, ProbeId},
    error::{Error, Result},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::{debug, warn};

/// Summary of a single traceroute attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSample {
    /// Epoch seconds
    pub created: i64,
    /// Mean RTT over responding hops, milliseconds
    pub average_latency: i64,
    /// All hops, responding or not
    pub total_hops: u32,
}

/// Samples of one probe, in arrival order
pub type ProbeSeries = Vec<ProbeSample>;

/// Per-probe time series of one measurement. Probes keep first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementAggregate {
    pub measurement_id: MeasurementId,
    pub probes: IndexMap<ProbeId, ProbeSeries>,
}

impl MeasurementAggregate {
    pub fn sample_count(&self) -> usize {
        self.probes.values().map(Vec::len).sum()
    }
}

/// Folds decoded attempts into per-probe series.
///
/// The measurement id is taken from the first record. Records carrying a
/// different id are kept and only reported.
pub fn aggregate(records: &[AttemptRecord]) -> Result<MeasurementAggregate> {
    let first = records.first().ok_or(Error::EmptyMeasurement)?;
    let measurement_id = first.measurement_id;

    let mut probes: IndexMap<ProbeId, ProbeSeries> = IndexMap::new();
    let mut foreign_records = 0usize;

    for record in records {
        if record.measurement_id != measurement_id {
            foreign_records += 1;
        }

        let average_latency =
            average_latency(&record.hops).ok_or(Error::EmptySample {
                probe_id: record.probe_id,
                created: record.created,
            })?;

        probes.entry(record.probe_id).or_default().push(ProbeSample {
            created: record.created,
            average_latency,
            total_hops: record.total_hops(),
        });
    }

    if foreign_records > 0 {
        warn!(
            "{} records carry a measurement id other than {}; they were aggregated under {}",
            foreign_records, measurement_id, measurement_id
        );
    }

    debug!(
        "Aggregated {} records into {} probes for measurement {}",
        records.len(),
        probes.len(),
        measurement_id
    );

    Ok(MeasurementAggregate {
        measurement_id,
        probes,
    })
}

/// Mean RTT of the responding hops, rounded half-to-even.
/// `None` when no hop responded.
pub fn average_latency(hops: &[Hop]) -> Option<i64> {
    let rtts: Vec<f64> = hops
        .iter()
        .filter(|hop| hop.responded)
        .filter_map(|hop| hop.rtt)
        .collect();

    if rtts.is_empty() {
        return None;
    }

    let mean = rtts.iter().sum::<f64>() / rtts.len() as f64;
    Some(mean.round_ties_even() as i64)
}

/// First source address seen for each probe, in first-seen probe order
pub fn probe_sources(records: &[AttemptRecord]) -> IndexMap<ProbeId, Option<IpAddr>> {
    let mut sources: IndexMap<ProbeId, Option<IpAddr>> = IndexMap::new();
    for record in records {
        let entry = sources.entry(record.probe_id).or_insert(None);
        if entry.is_none() {
            *entry = record.source_address;
        }
    }
    sources
}
