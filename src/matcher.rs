use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::registry::IdentifierRegistry;

// Greedy, so every match is a maximal digit run: "15870061" never yields "587".
static DIGIT_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Partition of the registry keys by presence in a document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchResult {
    pub found: Vec<String>,
    pub missing: Vec<String>,
}

/// Find which registry identifiers occur in `text` as whole digit runs.
/// Both lists come back sorted and together cover every registry key once.
pub fn match_ids(text: &str, registry: &IdentifierRegistry) -> MatchResult {
    let present: BTreeSet<&str> = DIGIT_RUN_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|run| registry.contains(run))
        .collect();

    let found: Vec<String> = present.iter().map(|s| s.to_string()).collect();
    let missing: Vec<String> = registry
        .ids()
        .filter(|id| !present.contains(id))
        .map(str::to_string)
        .collect();

    MatchResult { found, missing }
}
