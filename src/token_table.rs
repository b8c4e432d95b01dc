//! Token table loading and the token value model.
//!
//! The table maps match keys to destination tokens and lives in a YAML
//! file owned by the operator. It is re-read on every batch so edits take
//! effect without restarting the host; the cost of the extra read is a
//! deliberate trade against configuration staleness. Entry order follows
//! the document order because resolution is first-match.

use std::{fs, io, path::Path};

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading the token table.
#[derive(Debug, Error)]
pub enum TableError {
    /// The file is missing or unreadable.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The file is not valid YAML.
    #[error(transparent)]
    Parse(#[from] serde_yaml::Error),
    /// The document root is not a mapping of keys to token values.
    #[error("token table root must be a mapping")]
    NotAMapping,
    /// A mapping key is not a plain string.
    #[error("token table keys must be strings")]
    InvalidKey,
}

/// A destination token, either flat or split by log category.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TokenValue {
    /// One token used for every record matching the key.
    Plain(String),
    /// Per-category tokens selected by comparing the record's tag against
    /// the configured access/error tag names.
    Categorized {
        access: String,
        error: String,
        app: String,
    },
}

/// Ordered match-key to token mapping.
///
/// Lookups never mutate the table; a fresh table is loaded per batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenTable {
    entries: Vec<(String, TokenValue)>,
}

impl TokenTable {
    /// Build a table directly from entries, preserving their order.
    pub fn from_entries(entries: Vec<(String, TokenValue)>) -> Self {
        Self { entries }
    }

    /// Load the table from a YAML file at `path`.
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let text = fs::read_to_string(path)?;
        let doc: serde_yaml::Value = serde_yaml::from_str(&text)?;
        let serde_yaml::Value::Mapping(mapping) = doc else {
            return Err(TableError::NotAMapping);
        };
        let mut entries = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let serde_yaml::Value::String(key) = key else {
                return Err(TableError::InvalidKey);
            };
            let value: TokenValue = serde_yaml::from_value(value)?;
            entries.push((key, value));
        }
        Ok(Self { entries })
    }

    /// Iterate entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TokenValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
