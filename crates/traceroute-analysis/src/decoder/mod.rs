pub mod types;

use crate::error::Result;
use std::{cmp::Ordering, net::IpAddr};
use tracing::debug;
use types::{RawHop, RawTraceroute};

pub type ProbeId = u64;
pub type MeasurementId = u64;

/// One hop of a decoded attempt
#[derive(Debug, Clone, PartialEq)]
pub struct Hop {
    pub responded: bool,
    /// Median RTT of the replies for this hop, in milliseconds
    pub rtt: Option<f64>,
    pub ttl: Option<u32>,
}

impl Hop {
    pub fn responding(rtt: f64) -> Self {
        Self {
            responded: true,
            rtt: Some(rtt),
            ttl: None,
        }
    }

    pub fn silent() -> Self {
        Self {
            responded: false,
            rtt: None,
            ttl: None,
        }
    }
}

/// One traceroute attempt of one probe
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub probe_id: ProbeId,
    pub measurement_id: MeasurementId,
    /// Epoch seconds
    pub created: i64,
    pub source_address: Option<IpAddr>,
    pub hops: Vec<Hop>,
}

impl AttemptRecord {
    pub fn total_hops(&self) -> u32 {
        self.hops.len() as u32
    }
}

/// Decodes a RIPE Atlas traceroute export (JSON array of results)
pub fn decode(bytes: &[u8]) -> Result<Vec<AttemptRecord>> {
    let raw: Vec<RawTraceroute> = serde_json::from_slice(bytes)?;
    debug!("Decoded {} traceroute results", raw.len());
    Ok(raw.into_iter().map(AttemptRecord::from).collect())
}

impl From<RawTraceroute> for AttemptRecord {
    fn from(raw: RawTraceroute) -> Self {
        let source_address = raw
            .src_addr
            .as_deref()
            .or(raw.from.as_deref())
            .and_then(|addr| addr.parse().ok());

        Self {
            probe_id: raw.prb_id,
            measurement_id: raw.msm_id,
            created: raw.timestamp,
            source_address,
            hops: raw.result.iter().map(decode_hop).collect(),
        }
    }
}

fn decode_hop(raw: &RawHop) -> Hop {
    let rtts: Vec<f64> = raw
        .result
        .iter()
        .filter(|reply| reply.x.is_none())
        .filter_map(|reply| reply.rtt)
        .filter(|rtt| rtt.is_finite())
        .collect();
    let ttl = raw.result.iter().find_map(|reply| reply.ttl);

    // A zero median counts as no response, same as a missing one
    match median(&rtts) {
        Some(rtt) if rtt > 0.0 => Hop {
            responded: true,
            rtt: Some(rtt),
            ttl,
        },
        _ => Hop {
            responded: false,
            rtt: None,
            ttl,
        },
    }
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let len = sorted.len();
    if len % 2 == 0 {
        Some((sorted[len / 2 - 1] + sorted[len / 2]) / 2.0)
    } else {
        Some(sorted[len / 2])
    }
}
