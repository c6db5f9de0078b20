//! Amplitude driven tick selection.
//!
//! Each axis has one breakpoint: an amplitude (max - min) at or above it
//! selects the wide tick pair, anything below the narrow one. Missing data
//! selects the narrow pair.

/// Major/minor tick spacing of one axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickPair {
    pub major: f64,
    pub minor: f64,
}

impl TickPair {
    pub const fn new(major: f64, minor: f64) -> Self {
        Self { major, minor }
    }

    /// Number of minor lines between two major ones
    pub fn minor_per_major(&self) -> usize {
        if self.minor <= 0.0 {
            return 0;
        }
        ((self.major / self.minor).round() as usize).saturating_sub(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleRule {
    pub breakpoint: f64,
    pub wide: TickPair,
    pub narrow: TickPair,
}

impl ScaleRule {
    pub const fn new(breakpoint: f64, wide: TickPair, narrow: TickPair) -> Self {
        Self {
            breakpoint,
            wide,
            narrow,
        }
    }

    pub fn classify(&self, amplitude: f64) -> TickPair {
        if amplitude >= self.breakpoint {
            self.wide
        } else {
            self.narrow
        }
    }

    pub fn select(&self, amplitude: Option<f64>) -> TickPair {
        amplitude.map_or(self.narrow, |amplitude| self.classify(amplitude))
    }
}

/// Breakpoints for the four chart panels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleTable {
    pub version: u32,
    pub hourly_latency: ScaleRule,
    pub hourly_hops: ScaleRule,
    pub probe_latency: ScaleRule,
    pub probe_hops: ScaleRule,
}

pub const SCALE_TABLE_V1: ScaleTable = ScaleTable {
    version: 1,
    hourly_latency: ScaleRule::new(5.0, TickPair::new(5.0, 1.0), TickPair::new(1.0, 0.5)),
    hourly_hops: ScaleRule::new(1.0, TickPair::new(0.5, 0.25), TickPair::new(0.1, 0.05)),
    probe_latency: ScaleRule::new(150.0, TickPair::new(50.0, 25.0), TickPair::new(25.0, 12.5)),
    probe_hops: ScaleRule::new(20.0, TickPair::new(5.0, 2.5), TickPair::new(3.0, 1.0)),
};

impl Default for ScaleTable {
    fn default() -> Self {
        SCALE_TABLE_V1
    }
}

/// max - min of the finite values, `None` when there are none
pub fn amplitude<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |range: Option<(f64, f64)>, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .map(|(lo, hi)| hi - lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_selects_wide_ticks() {
        let table = SCALE_TABLE_V1;
        assert_eq!(table.hourly_latency.classify(5.0), TickPair::new(5.0, 1.0));
        assert_eq!(table.hourly_latency.classify(4.99), TickPair::new(1.0, 0.5));
        assert_eq!(table.hourly_hops.classify(1.0), TickPair::new(0.5, 0.25));
        assert_eq!(table.hourly_hops.classify(0.5), TickPair::new(0.1, 0.05));
        assert_eq!(table.probe_latency.classify(150.0), TickPair::new(50.0, 25.0));
        assert_eq!(table.probe_latency.classify(149.0), TickPair::new(25.0, 12.5));
        assert_eq!(table.probe_hops.classify(20.0), TickPair::new(5.0, 2.5));
        assert_eq!(table.probe_hops.classify(19.0), TickPair::new(3.0, 1.0));
    }

    #[test]
    fn test_missing_data_selects_narrow_ticks() {
        assert_eq!(
            SCALE_TABLE_V1.probe_latency.select(None),
            TickPair::new(25.0, 12.5)
        );
        assert_eq!(
            SCALE_TABLE_V1.probe_latency.select(Some(300.0)),
            TickPair::new(50.0, 25.0)
        );
    }

    #[test]
    fn test_amplitude() {
        assert_eq!(amplitude([40.0, 60.0, 45.0]), Some(20.0));
        assert_eq!(amplitude([7.0]), Some(0.0));
        assert_eq!(amplitude(Vec::<f64>::new()), None);
        assert_eq!(amplitude([f64::NAN, 3.0, 1.0]), Some(2.0));
    }

    #[test]
    fn test_minor_per_major() {
        assert_eq!(TickPair::new(5.0, 1.0).minor_per_major(), 4);
        assert_eq!(TickPair::new(25.0, 12.5).minor_per_major(), 1);
        assert_eq!(TickPair::new(1.0, 0.0).minor_per_major(), 0);
    }
}
