use crate::{
    aggregator::MeasurementAggregate,
    decoder::ProbeId,
    geolocation::{OriginLookup, UNKNOWN_ORIGIN},
};
use statrs::statistics::Statistics;
use tabled::{Table, Tabled, settings::Style};

#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct ProbeSummary {
    #[tabled(rename = "probe")]
    pub probe_id: ProbeId,
    pub origin: String,
    pub samples: usize,
    #[tabled(display = "display_ms", rename = "latency_min(ms)")]
    pub latency_min: f64,
    #[tabled(display = "display_ms", rename = "latency_mean(ms)")]
    pub latency_mean: f64,
    #[tabled(display = "display_ms", rename = "latency_max(ms)")]
    pub latency_max: f64,
    #[tabled(display = "display_hops", rename = "hops_mean")]
    pub hops_mean: f64,
}

fn display_ms(ms: &f64) -> String {
    format!("{ms:.1}")
}

fn display_hops(hops: &f64) -> String {
    format!("{hops:.2}")
}

/// Per-probe statistics, probes in aggregate order. Probes without samples are skipped.
pub fn summarize<O>(aggregate: &MeasurementAggregate, origins: &O) -> Vec<ProbeSummary>
where
    O: OriginLookup + ?Sized,
{
    aggregate
        .probes
        .iter()
        .filter(|(_, series)| !series.is_empty())
        .map(|(probe_id, series)| {
            let latencies: Vec<f64> = series.iter().map(|s| s.average_latency as f64).collect();
            let hops: Vec<f64> = series.iter().map(|s| f64::from(s.total_hops)).collect();

            ProbeSummary {
                probe_id: *probe_id,
                origin: origins
                    .origin(*probe_id)
                    .unwrap_or(UNKNOWN_ORIGIN)
                    .to_string(),
                samples: series.len(),
                latency_min: Statistics::min(&latencies),
                latency_mean: Statistics::mean(&latencies),
                latency_max: Statistics::max(&latencies),
                hops_mean: Statistics::mean(&hops),
            }
        })
        .collect()
}

pub fn render_summaries(summaries: &[ProbeSummary]) -> String {
    Table::new(summaries)
        .with(Style::psql().remove_horizontals())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ProbeSample;
    use indexmap::IndexMap;
    use std::collections::BTreeMap;

    #[test]
    fn test_summaries() {
        let sample = |latency, hops| ProbeSample {
            created: 0,
            average_latency: latency,
            total_hops: hops,
        };
        let mut probes = IndexMap::new();
        probes.insert(5, vec![sample(10, 4), sample(30, 6), sample(20, 5)]);
        probes.insert(6, vec![]);
        let aggregate = MeasurementAggregate {
            measurement_id: 1,
            probes,
        };
        let origins = BTreeMap::from([(5u64, "Pelotas, RS".to_string())]);

        let summaries = summarize(&aggregate, &origins);
        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.origin, "Pelotas, RS");
        assert_eq!(s.samples, 3);
        assert_eq!(s.latency_min, 10.0);
        assert_eq!(s.latency_mean, 20.0);
        assert_eq!(s.latency_max, 30.0);
        assert_eq!(s.hops_mean, 5.0);

        let table = render_summaries(&summaries);
        assert!(table.contains("Pelotas, RS"));
        assert!(table.contains("latency_mean(ms)"));
    }
}
