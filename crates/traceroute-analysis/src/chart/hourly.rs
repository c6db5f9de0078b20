use super::scale::amplitude;
use chrono::{NaiveDateTime, Timelike};

pub const HOURS_PER_DAY: usize = 24;

/// Latency and hop totals of the rows created during one hour of the day
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HourBucket {
    latency_sum: f64,
    hops_sum: f64,
    count: usize,
}

impl HourBucket {
    pub fn add(&mut self, latency: i64, hops: u32) {
        // Values come from an editable table, f64 sums cannot overflow
        self.latency_sum += latency as f64;
        self.hops_sum += f64::from(hops);
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean_latency(&self) -> Option<f64> {
        (self.count > 0).then(|| self.latency_sum / self.count as f64)
    }

    pub fn mean_hops(&self) -> Option<f64> {
        (self.count > 0).then(|| self.hops_sum / self.count as f64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourBuckets {
    buckets: [HourBucket; HOURS_PER_DAY],
}

impl Default for HourBuckets {
    fn default() -> Self {
        Self::new()
    }
}

impl HourBuckets {
    pub fn new() -> Self {
        Self {
            buckets: [HourBucket::default(); HOURS_PER_DAY],
        }
    }

    pub fn add(&mut self, created_at: &NaiveDateTime, latency: i64, hops: u32) {
        self.buckets[created_at.hour() as usize].add(latency, hops);
    }

    pub fn bucket(&self, hour: usize) -> Option<&HourBucket> {
        self.buckets.get(hour)
    }

    pub fn total_count(&self) -> usize {
        self.buckets.iter().map(HourBucket::count).sum()
    }

    /// Per-hour means. Hours without rows are left out and drawn as gaps.
    pub fn panel(&self) -> HourlyPanel {
        let points = self
            .buckets
            .iter()
            .enumerate()
            .filter_map(|(hour, bucket)| {
                Some(HourlyAverage {
                    hour: hour as u32,
                    latency: bucket.mean_latency()?,
                    hops: bucket.mean_hops()?,
                })
            })
            .collect();
        HourlyPanel { points }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlyAverage {
    pub hour: u32,
    pub latency: f64,
    pub hops: f64,
}

/// Hour-of-day averages across all probes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HourlyPanel {
    pub points: Vec<HourlyAverage>,
}

impl HourlyPanel {
    pub fn latency_amplitude(&self) -> Option<f64> {
        amplitude(self.points.iter().map(|p| p.latency))
    }

    pub fn hops_amplitude(&self) -> Option<f64> {
        amplitude(self.points.iter().map(|p| p.hops))
    }

    /// Runs of consecutive hours, so that empty hours break the line
    pub fn segments(&self) -> Vec<&[HourlyAverage]> {
        let mut segments = Vec::new();
        let mut start = 0;
        for i in 1..=self.points.len() {
            let broken = i == self.points.len() || self.points[i].hour != self.points[i - 1].hour + 1;
            if broken {
                segments.push(&self.points[start..i]);
                start = i;
            }
        }
        segments
    }
}
