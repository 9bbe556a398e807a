//! Metric-collection and transformation pipeline: polls CloudWatch
//! statistics over an incremental time window and relays them as flat
//! line-protocol records to a proxy.

pub mod collector;
pub mod config;
pub mod metric;
pub mod provider;
pub mod rule;
pub mod sink;
pub mod source;
pub mod transform;
pub mod window;
