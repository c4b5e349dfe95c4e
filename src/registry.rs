use std::collections::BTreeMap;

use crate::error::ConfigError;

/// Tracked identifiers and their display labels. Built once at startup and
/// never mutated afterwards; keys iterate in sorted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierRegistry {
    entries: BTreeMap<String, String>,
}

impl IdentifierRegistry {
    pub fn new<I, K, V>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (id, label) in entries {
            let id = id.into();
            let id_trimmed = id.trim();
            if id_trimmed.is_empty() || !id_trimmed.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ConfigError::BadIdentifier(id));
            }
            if map.insert(id_trimmed.to_string(), label.into()).is_some() {
                return Err(ConfigError::DuplicateIdentifier(id_trimmed.to_string()));
            }
        }
        if map.is_empty() {
            return Err(ConfigError::EmptyRegistry);
        }
        Ok(Self { entries: map })
    }

    pub fn label(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Identifiers in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
