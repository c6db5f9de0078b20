use thiserror::Error;

pub type Result<T = ()> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no responding hop in attempt of probe {probe_id} created at {created}")]
    EmptySample { probe_id: u64, created: i64 },
    #[error("measurement file contains no attempt records")]
    EmptyMeasurement,
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid created_at value '{value}': {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("timestamp {0} cannot be represented in the target timezone")]
    TimestampOutOfRange(i64),
    #[error("palette exhausted: {capacity} colors already assigned in this chart")]
    PaletteExhausted { capacity: usize },
    #[error("geolocation lookup failed: {0}")]
    Geolocation(#[from] reqwest::Error),
    #[error("geolocation service refused lookup: {0}")]
    GeolocationUnavailable(String),
    #[error("chart rendering error: {0}")]
    Render(String),
}
