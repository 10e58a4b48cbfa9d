use serde::{Deserialize, Serialize};

use crate::types::FieldSet;

/// Direction for a list ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// SQL keyword for the direction.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl Default for SortDirection {
    fn default() -> Self {
        Self::Asc
    }
}

/// Ordering directive carried by a list query after the sort adapter ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ordering {
    /// Order by record display name.
    Name,
    /// Order by the numeric value of one attribute. Records lacking the
    /// attribute stay in the result set when `include_missing` is true; their
    /// position relative to present values is store-determined.
    AttributeNumeric { key: String, include_missing: bool },
}

/// Mutable descriptor for one list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainListQuery {
    /// Sort key as requested by the caller, before adaptation.
    pub sort_key: Option<String>,
    pub direction: SortDirection,
    pub ordering: Ordering,
}

impl DomainListQuery {
    pub fn new(sort_key: Option<String>, direction: SortDirection) -> Self {
        Self {
            sort_key,
            direction,
            ordering: Ordering::Name,
        }
    }
}

impl Default for DomainListQuery {
    fn default() -> Self {
        Self::new(None, SortDirection::Asc)
    }
}

/// Column sort adapter: rewrites the query's ordering when the requested sort
/// key names a configured attribute; any other key passes through unchanged
/// as name ordering.
pub fn apply_column_sort(query: &mut DomainListQuery, fields: &FieldSet) {
    let Some(key) = query.sort_key.as_deref() else {
        return;
    };
    if fields.contains(key) {
        query.ordering = Ordering::AttributeNumeric {
            key: key.to_string(),
            include_missing: true,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_key_rewrites_to_numeric_attribute_ordering() {
        let fields = FieldSet::default();
        let mut query = DomainListQuery::new(Some("minimum_bid".to_string()), SortDirection::Desc);
        apply_column_sort(&mut query, &fields);

        assert_eq!(
            query.ordering,
            Ordering::AttributeNumeric {
                key: "minimum_bid".to_string(),
                include_missing: true,
            }
        );
        assert_eq!(query.direction, SortDirection::Desc);
    }

    #[test]
    fn unconfigured_key_passes_through_as_name_ordering() {
        let fields = FieldSet::default();
        let mut query = DomainListQuery::new(Some("title".to_string()), SortDirection::Asc);
        apply_column_sort(&mut query, &fields);
        assert_eq!(query.ordering, Ordering::Name);
    }

    #[test]
    fn absent_sort_key_leaves_the_query_untouched() {
        let fields = FieldSet::default();
        let mut query = DomainListQuery::default();
        let before = query.clone();
        apply_column_sort(&mut query, &fields);
        assert_eq!(query, before);
    }
}
