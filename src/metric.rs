use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Statistic kinds that can be requested from the upstream provider.
///
/// Serde names match the upstream statistic names used in the
/// configuration document (`"Average"`, `"SampleCount"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub enum StatKind {
    Average,
    Maximum,
    Minimum,
    Sum,
    SampleCount,
}

impl StatKind {
    /// Abbreviated label appended to output metric names.
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Average => "avg",
            Self::Maximum => "max",
            Self::Minimum => "min",
            Self::Sum => "sum",
            Self::SampleCount => "count",
        }
    }
}

/// A name/value tag pair attached to a descriptor by the upstream provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Identity of one time series, independent of time.
#[derive(Debug, Clone)]
pub struct MetricDescriptor {
    pub namespace: String,
    pub metric_name: String,
    /// Dimension order is provider-defined and significant for
    /// index-based source directives.
    pub dimensions: Vec<Dimension>,
}

/// One aggregation interval returned by the statistics provider for a
/// descriptor, carrying a value per requested statistic.
#[derive(Debug, Clone)]
pub struct Datapoint {
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<StatKind, f64>,
}

/// The flat telemetry record handed to the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub name: String,
    pub value: f64,
    pub timestamp_millis: i64,
    pub source: String,
    pub point_tags: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_short_names() {
        assert_eq!(StatKind::Average.short_name(), "avg");
        assert_eq!(StatKind::Maximum.short_name(), "max");
        assert_eq!(StatKind::Minimum.short_name(), "min");
        assert_eq!(StatKind::Sum.short_name(), "sum");
        assert_eq!(StatKind::SampleCount.short_name(), "count");
    }

    #[test]
    fn test_stat_kind_config_names() {
        let kinds: Vec<StatKind> =
            serde_json::from_str(r#"["Average", "SampleCount", "Sum"]"#).expect("valid stats");
        assert_eq!(
            kinds,
            vec![StatKind::Average, StatKind::SampleCount, StatKind::Sum]
        );
    }
}
