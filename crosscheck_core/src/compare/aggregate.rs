//! Summary derivation for a finished comparison. All counts come from the
//! arrays themselves so they can never drift out of sync.

use crate::models::comparison::{ComparisonSummary, EntityMatch, MissingEntity};

/// round(100 * perfect / total_source), pinned to 0 for an empty source.
pub fn match_percentage(perfect_matches: usize, total_source: usize) -> u32 {
    if total_source == 0 {
        return 0;
    }
    let pct = (perfect_matches as f64 / total_source as f64) * 100.0;
    (pct.round() as u32).min(100)
}

pub fn summarize(
    matches: &[EntityMatch],
    discrepancies: &[EntityMatch],
    missing_in_scraped: &[MissingEntity],
    missing_in_source: &[MissingEntity],
) -> ComparisonSummary {
    let actionable = missing_in_scraped
        .iter()
        .chain(missing_in_source.iter())
        .filter(|m| !m.is_ignored)
        .count();
    ComparisonSummary {
        perfect_matches: matches.len(),
        with_discrepancies: discrepancies.len(),
        unique_to_scraped: missing_in_source.len(),
        unique_to_source: missing_in_scraped.len(),
        actionable_missing: actionable,
    }
}
