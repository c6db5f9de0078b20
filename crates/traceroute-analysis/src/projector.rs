use crate::{
    aggregator::MeasurementAggregate,
    decoder::ProbeId,
    error::{Error, Result},
    geolocation::{OriginLookup, UNKNOWN_ORIGIN},
};
use chrono::{NaiveDateTime, TimeZone};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, path::Path};
use tracing::info;

/// Local time format of the `Created_At` column
pub const CREATED_AT_FORMAT: &str = "%H:%M %d/%m/%y";
pub const TABLE_DELIMITER: u8 = b';';

/// One denormalized table row per probe sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(rename = "Probe_ID")]
    pub probe_id: ProbeId,
    #[serde(rename = "Origin")]
    pub origin: String,
    #[serde(rename = "Average_Latency")]
    pub average_latency: i64,
    #[serde(rename = "Total_Hops")]
    pub total_hops: u32,
    #[serde(rename = "Created_At")]
    pub created_at: String,
}

impl TableRow {
    pub fn created_at_time(&self) -> Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.created_at, CREATED_AT_FORMAT).map_err(|source| {
            Error::Timestamp {
                value: self.created_at.clone(),
                source,
            }
        })
    }
}

/// Flattens an aggregate into rows: probes in map order, samples in series order
pub fn project<O, Tz>(aggregate: &MeasurementAggregate, origins: &O, tz: &Tz) -> Result<Vec<TableRow>>
where
    O: OriginLookup + ?Sized,
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut rows = Vec::with_capacity(aggregate.sample_count());

    for (probe_id, series) in &aggregate.probes {
        let origin = origins.origin(*probe_id).unwrap_or(UNKNOWN_ORIGIN);
        for sample in series {
            rows.push(TableRow {
                probe_id: *probe_id,
                origin: origin.to_string(),
                average_latency: sample.average_latency,
                total_hops: sample.total_hops,
                created_at: format_created(sample.created, tz)?,
            });
        }
    }

    Ok(rows)
}

fn format_created<Tz>(created: i64, tz: &Tz) -> Result<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let local = tz
        .timestamp_opt(created, 0)
        .earliest()
        .ok_or(Error::TimestampOutOfRange(created))?;
    Ok(local.format(CREATED_AT_FORMAT).to_string())
}

pub fn write_table(path: &Path, rows: &[TableRow]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(TABLE_DELIMITER)
        .from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

pub fn read_table(path: &Path) -> Result<Vec<TableRow>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(TABLE_DELIMITER)
        .from_path(path)?;
    let rows = reader.deserialize().collect::<std::result::Result<Vec<TableRow>, _>>()?;
    Ok(rows)
}
