use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::rule::{MatchRule, RuleSet};

/// Default proxy port when the address omits one.
pub const DEFAULT_PROXY_PORT: u16 = 2878;

/// Parsed configuration store document.
///
/// Unknown fields are ignored here but preserved verbatim by the
/// watermark commit, which rewrites the raw document.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Rules keyed by regex pattern over the composite metric key.
    pub metrics: HashMap<String, MatchRule>,

    /// Watermark from the previous successful run, seconds since epoch.
    /// Absent on first run.
    #[serde(default)]
    pub last_run_timestamp: Option<i64>,
}

impl Config {
    /// Load and validate the configuration document.
    ///
    /// A missing file or a document without a usable `metrics` section
    /// is fatal, raised before any window computation.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading configuration file {}", path.display()))?;

        let cfg: Config = serde_json::from_str(&data)
            .with_context(|| format!("parsing configuration file {}", path.display()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.metrics.is_empty() {
            bail!("configuration metrics section is empty");
        }

        Ok(())
    }

    /// Compile the rule set from the `metrics` section.
    pub fn rule_set(&self) -> Result<RuleSet> {
        RuleSet::compile(
            self.metrics
                .iter()
                .map(|(pattern, rule)| (pattern.clone(), rule.clone())),
        )
    }

    /// The persisted watermark, if any.
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.last_run_timestamp
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// Parse a proxy address of the form `host` or `host:port`.
pub fn parse_proxy_addr(addr: &str) -> Result<(String, u16)> {
    match addr.split_once(':') {
        Some((host, port)) => {
            if host.is_empty() {
                bail!("proxy address {addr:?} has no host");
            }
            let port: u16 = port
                .parse()
                .with_context(|| format!("invalid proxy port in {addr:?}"))?;
            Ok((host.to_string(), port))
        }
        None => {
            if addr.is_empty() {
                bail!("proxy address is empty");
            }
            Ok((addr.to_string(), DEFAULT_PROXY_PORT))
        }
    }
}
