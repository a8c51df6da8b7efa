use crate::run::Run;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Searchable strings describing a benchmark
///
/// Persisted by the metadata store next to the benchmark record so that
/// substring queries can match run names and hardware.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMetadata {
    /// Distinct run labels in first-seen order, joined by ", "
    pub labels: String,
    /// Distinct non-empty spec values sorted ascending, joined by ", "
    pub specs: String,
}

/// Build the search strings for `runs`
pub fn extract_search_metadata(runs: &[Run]) -> SearchMetadata {
    let mut seen = HashSet::new();
    let labels: Vec<&str> = runs
        .iter()
        .map(|run| run.label.as_str())
        .filter(|label| seen.insert(*label))
        .collect();

    let specs: BTreeSet<&str> = runs
        .iter()
        .flat_map(|run| run.specs())
        .filter(|value| !value.is_empty())
        .collect();

    SearchMetadata {
        labels: labels.join(", "),
        specs: specs.into_iter().collect::<Vec<_>>().join(", "),
    }
}
