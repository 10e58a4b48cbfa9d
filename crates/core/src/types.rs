use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default attribute keys carried by every catalog deployment.
pub const DEFAULT_FIELD_KEYS: [&str; 3] = ["minimum_bid", "buy_it_now", "lease_to_own"];

/// The configured set of attribute keys a deployment recognises.
///
/// All per-row and per-column logic iterates this set, so adding an attribute
/// is a configuration change rather than a code change. The set is built once
/// at startup and passed to each component explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSet {
    keys: Vec<String>,
}

impl FieldSet {
    /// Builds a field set from the provided keys, dropping empties and
    /// duplicates while preserving first-seen order.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for key in keys {
            let key = key.into();
            let trimmed = key.trim();
            if trimmed.is_empty() || out.iter().any(|existing| existing == trimmed) {
                continue;
            }
            out.push(trimmed.to_string());
        }
        Self { keys: out }
    }

    /// Parses a comma-separated list, as supplied via configuration.
    pub fn parse_list(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|existing| existing == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Human label for an attribute key: underscores become spaces and each
    /// word is capitalised, so `minimum_bid` renders as `Minimum Bid`.
    pub fn label(key: &str) -> String {
        key.split('_')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for FieldSet {
    fn default() -> Self {
        Self::new(DEFAULT_FIELD_KEYS)
    }
}

/// Visibility status persisted for a catalog record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainStatus {
    Published,
    Draft,
    Trashed,
}

impl DomainStatus {
    /// Returns the canonical database representation for the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Draft => "draft",
            Self::Trashed => "trashed",
        }
    }

    /// Maps the stored representation back, defaulting to `Published` for
    /// unrecognised values.
    pub fn from_stored(value: &str) -> Self {
        match value {
            "draft" => Self::Draft,
            "trashed" => Self::Trashed,
            _ => Self::Published,
        }
    }
}

impl Default for DomainStatus {
    fn default() -> Self {
        Self::Published
    }
}

/// A catalog record with its attribute map loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub id: String,
    pub name: String,
    pub status: DomainStatus,
    pub attributes: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DomainRecord {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// A taxonomy term a record can be associated with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_field_set_carries_the_three_financial_keys() {
        let fields = FieldSet::default();
        let keys: Vec<&str> = fields.iter().collect();
        assert_eq!(keys, vec!["minimum_bid", "buy_it_now", "lease_to_own"]);
    }

    #[test]
    fn parse_list_trims_and_deduplicates() {
        let fields = FieldSet::parse_list(" minimum_bid, buy_it_now ,minimum_bid,, ");
        let keys: Vec<&str> = fields.iter().collect();
        assert_eq!(keys, vec!["minimum_bid", "buy_it_now"]);
    }

    #[test]
    fn labels_capitalise_each_word() {
        assert_eq!(FieldSet::label("minimum_bid"), "Minimum Bid");
        assert_eq!(FieldSet::label("lease_to_own"), "Lease To Own");
        assert_eq!(FieldSet::label("price"), "Price");
    }

    #[test]
    fn status_round_trips_with_published_fallback() {
        assert_eq!(DomainStatus::from_stored("draft"), DomainStatus::Draft);
        assert_eq!(DomainStatus::from_stored("trashed"), DomainStatus::Trashed);
        assert_eq!(
            DomainStatus::from_stored("something-else"),
            DomainStatus::Published
        );
        assert_eq!(DomainStatus::Trashed.as_str(), "trashed");
    }
}
