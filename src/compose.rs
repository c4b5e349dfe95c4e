use crate::matcher::MatchResult;
use crate::registry::IdentifierRegistry;

/// Build the notification text for a newly observed marker.
///
/// Layout is fixed: header with marker and page URL, then either the found
/// identifiers or a "none found" line, then the missing identifiers if any.
pub fn compose(
    marker: &str,
    source_url: &str,
    result: &MatchResult,
    registry: &IdentifierRegistry,
) -> String {
    let mut parts: Vec<String> = vec![format!("✅ New date detected: {}\n\n{}\n", marker, source_url)];

    if result.found.is_empty() {
        parts.push("No target IDs found.".to_string());
    } else {
        parts.push("Found the following IDs:".to_string());
        parts.extend(result.found.iter().map(|id| entry(id, registry)));
    }

    if !result.missing.is_empty() {
        parts.push("\nMissing IDs:".to_string());
        parts.extend(result.missing.iter().map(|id| entry(id, registry)));
    }

    parts.join("\n")
}

fn entry(id: &str, registry: &IdentifierRegistry) -> String {
    format!("• {} — {}", id, registry.label(id).unwrap_or("?"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.org/pickup";

    fn registry() -> IdentifierRegistry {
        IdentifierRegistry::new([("587006", "Adel"), ("587884", "Amir")]).unwrap()
    }

    fn result(found: &[&str], missing: &[&str]) -> MatchResult {
        MatchResult {
            found: found.iter().map(|s| s.to_string()).collect(),
            missing: missing.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn found_and_missing() {
        let msg = compose("05.03.2024", URL, &result(&["587006"], &["587884"]), &registry());
        assert_eq!(
            msg,
            "✅ New date detected: 05.03.2024\n\nhttps://example.org/pickup\n\n\
             Found the following IDs:\n\
             • 587006 — Adel\n\
             \nMissing IDs:\n\
             • 587884 — Amir"
        );
    }

    #[test]
    fn nothing_found() {
        let msg = compose("05.03.2024", URL, &result(&[], &["587006", "587884"]), &registry());
        assert!(msg.contains("\nNo target IDs found.\n"));
        assert!(!msg.contains("Found the following IDs"));
        assert!(msg.ends_with("• 587006 — Adel\n• 587884 — Amir"));
    }

    #[test]
    fn missing_section_omitted_when_all_found() {
        let msg = compose("05.03.2024", URL, &result(&["587006", "587884"], &[]), &registry());
        assert!(!msg.contains("Missing"));
        assert!(msg.ends_with("• 587006 — Adel\n• 587884 — Amir"));
    }

    #[test]
    fn deterministic() {
        let r = result(&["587884"], &["587006"]);
        let a = compose("x", URL, &r, &registry());
        let b = compose("x", URL, &r, &registry());
        assert_eq!(a.as_bytes(), b.as_bytes());
    }
}
