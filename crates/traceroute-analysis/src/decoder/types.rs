use serde::Deserialize;

/// Partial RIPE Atlas traceroute result, only the keys the analysis reads.
///
/// NOTE: Atlas omits keys freely (timeouts carry only `x`, failed hops only
/// `error`), hence the defaults everywhere below the top level.
#[derive(Debug, Deserialize)]
pub struct RawTraceroute {
    pub prb_id: u64,
    pub msm_id: u64,
    pub timestamp: i64,
    #[serde(default)]
    pub src_addr: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub result: Vec<RawHop>,
}

#[derive(Debug, Deserialize)]
pub struct RawHop {
    #[serde(default)]
    pub hop: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Vec<RawReply>,
}

#[derive(Debug, Deserialize)]
pub struct RawReply {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub ttl: Option<u32>,
    #[serde(default)]
    pub rtt: Option<f64>,
    /// Present (as "*") when the probe timed out waiting for this packet
    #[serde(default)]
    pub x: Option<String>,
}
