use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("channel mapping is empty")]
    Empty,
    #[error("malformed channel mapping entry '{0}', expected '#primary=#secondary'")]
    Malformed(String),
}

/// Pairs of primary and secondary channels whose traffic is mirrored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMapping {
    forward: HashMap<String, String>,
    inverse: HashMap<String, String>,
}

impl ChannelMapping {
    /// Parse `#primary=#secondary [password],...`.
    ///
    /// Secondary names are lower-cased and anything after the first space
    /// (a channel password) is dropped.
    pub fn parse(raw: &str) -> Result<Self, MappingError> {
        let mut mapping = Self::default();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (primary, secondary) = entry
                .split_once('=')
                .ok_or_else(|| MappingError::Malformed(entry.to_string()))?;
            let primary = primary.trim();
            let secondary = secondary
                .split_whitespace()
                .next()
                .unwrap_or("")
                .to_lowercase();
            if primary.is_empty() || secondary.is_empty() {
                return Err(MappingError::Malformed(entry.to_string()));
            }
            mapping.insert(primary.to_string(), secondary);
        }

        if mapping.forward.is_empty() {
            return Err(MappingError::Empty);
        }
        Ok(mapping)
    }

    pub fn insert(&mut self, primary: String, secondary: String) {
        self.inverse.insert(secondary.clone(), primary.clone());
        self.forward.insert(primary, secondary);
    }

    pub fn secondary_for(&self, primary: &str) -> Option<&str> {
        self.forward.get(primary).map(String::as_str)
    }

    /// Case-insensitive, as secondary channel names are.
    pub fn primary_for(&self, secondary: &str) -> Option<&str> {
        self.inverse
            .get(&secondary.to_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
