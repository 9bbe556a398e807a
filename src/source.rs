use std::collections::BTreeMap;

use crate::metric::Dimension;
use crate::rule::SourceDirective;

/// Resolve a source identity from an ordered directive chain.
///
/// The first directive producing a non-empty value wins:
/// - `TagName` looks up a point tag, skipping absent or empty values.
/// - `DimensionIndex` uses the value at that position when the
///   configured count-versus-index comparison passes; a failing
///   comparison or an absent position skips the directive, never
///   errors.
/// - `Literal` returns its value unconditionally.
///
/// `None` means the caller must drop the descriptor and log a warning
/// naming it.
pub fn resolve(
    directives: &[SourceDirective],
    point_tags: &BTreeMap<String, String>,
    dimensions: &[Dimension],
) -> Option<String> {
    for directive in directives {
        match directive {
            SourceDirective::TagName(name) => {
                if let Some(value) = point_tags.get(name) {
                    if !value.is_empty() {
                        return Some(value.clone());
                    }
                }
            }
            SourceDirective::DimensionIndex(index) => {
                // Configured comparison is count against index, kept as-is.
                if dimensions.len() < *index {
                    if let Some(dimension) = dimensions.get(*index) {
                        return Some(dimension.value.clone());
                    }
                }
            }
            SourceDirective::Literal(value) => return Some(value.clone()),
        }
    }

    None
}
