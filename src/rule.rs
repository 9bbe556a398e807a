use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::metric::StatKind;

/// One way of deriving a source identity for an output record.
///
/// Configuration encoding: a JSON number is a dimension index, a string
/// starting with `=` is a literal (the `=` stripped), any other string
/// is a point-tag name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDirective {
    /// Look up a point tag by name.
    TagName(String),
    /// Pick the value of the Nth dimension (0-based).
    DimensionIndex(usize),
    /// A fixed value.
    Literal(String),
}

impl SourceDirective {
    /// Fallback directive chain used when a rule declares no
    /// `source_names` of its own.
    pub fn default_chain() -> Vec<SourceDirective> {
        vec![
            Self::TagName("Service".to_string()),
            Self::TagName("AvailabilityZone".to_string()),
            Self::DimensionIndex(0),
            Self::Literal("AWS".to_string()),
        ]
    }
}

impl<'de> Deserialize<'de> for SourceDirective {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Index(usize),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Index(index) => Self::DimensionIndex(index),
            Raw::Text(text) => match text.strip_prefix('=') {
                Some(literal) => Self::Literal(literal.to_string()),
                None => Self::TagName(text),
            },
        })
    }
}

/// Per-pattern matching rule from the `metrics` configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchRule {
    /// Statistics to request, in emission order.
    pub stats: Vec<StatKind>,

    /// Source directive chain; the default chain applies when absent.
    #[serde(default)]
    pub source_names: Option<Vec<SourceDirective>>,

    /// Tie-break weight between overlapping patterns.
    #[serde(default)]
    pub priority: Option<i64>,
}

/// Composite rule key for a namespace/metric pair: the lowercased
/// namespace with `/` replaced by `.`, a dot, then the lowercased
/// metric name.
pub fn rule_key(namespace: &str, metric_name: &str) -> String {
    format!(
        "{}.{}",
        namespace.replace('/', ".").to_lowercase(),
        metric_name.to_lowercase()
    )
}

struct CompiledRule {
    regex: Regex,
    rule: MatchRule,
}

/// The full rule set, compiled once per run and read-only thereafter.
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile pattern/rule pairs. Patterns match case-insensitively
    /// and are anchored at the start of the composite key, without
    /// having to consume it entirely.
    pub fn compile(rules: impl IntoIterator<Item = (String, MatchRule)>) -> Result<Self> {
        let mut compiled = Vec::new();

        for (pattern, rule) in rules {
            let regex = RegexBuilder::new(&format!("^(?:{pattern})"))
                .case_insensitive(true)
                .build()
                .with_context(|| format!("invalid metric pattern {pattern:?}"))?;

            compiled.push(CompiledRule { regex, rule });
        }

        Ok(Self { rules: compiled })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Find the best matching rule for a namespace/metric pair.
    ///
    /// The first matching rule becomes the current best; a later match
    /// replaces it only when the current best carries a `priority` and
    /// the later rule's priority is numerically greater. A first match
    /// without a priority therefore can never be displaced. A winner
    /// with an empty statistics list yields `None`.
    pub fn match_metric(&self, namespace: &str, metric_name: &str) -> Option<&MatchRule> {
        let key = rule_key(namespace, metric_name);

        let mut best: Option<&CompiledRule> = None;
        for candidate in &self.rules {
            if !candidate.regex.is_match(&key) {
                continue;
            }

            match best {
                None => best = Some(candidate),
                Some(current) => {
                    if let (Some(held), Some(offered)) =
                        (current.rule.priority, candidate.rule.priority)
                    {
                        if held < offered {
                            best = Some(candidate);
                        }
                    }
                }
            }
        }

        best.map(|c| &c.rule).filter(|rule| !rule.stats.is_empty())
    }
}
