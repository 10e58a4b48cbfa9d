use csv::ReaderBuilder;
use thiserror::Error;

/// Header name the upsert key is read from. The match is case-sensitive.
pub const DOMAIN_COLUMN: &str = "domain";

/// Errors raised while turning uploaded bytes into an import batch.
///
/// Both variants are detected before any record mutation: a batch either
/// parses and validates in full or is rejected wholesale.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("no column in the header row is named \"{DOMAIN_COLUMN}\"")]
    MissingDomainColumn,
    #[error("failed to read csv data: {0}")]
    Csv(#[from] csv::Error),
}

/// What a row asks the store to do with one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeAction<'a> {
    /// Set or overwrite the attribute with the raw cell value.
    Set(&'a str),
    /// Remove the attribute; an empty cell means the attribute must be absent
    /// afterwards, never stored as the empty string.
    Clear,
}

/// One data row of an import batch: the upsert key plus the remaining cells
/// keyed by their header, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub domain: String,
    pub attributes: Vec<(String, String)>,
}

impl ImportRow {
    /// Iterates the row's attributes as store actions.
    pub fn actions(&self) -> impl Iterator<Item = (&str, AttributeAction<'_>)> {
        self.attributes.iter().map(|(key, value)| {
            let action = if value.is_empty() {
                AttributeAction::Clear
            } else {
                AttributeAction::Set(value.as_str())
            };
            (key.as_str(), action)
        })
    }

    /// The subset of cells a freshly created record should carry. Empty cells
    /// are skipped so new records never hold empty-string attributes.
    pub fn initial_attributes(&self) -> Vec<(String, String)> {
        self.attributes
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .cloned()
            .collect()
    }
}

/// The parsed, validated representation of one uploaded CSV file.
///
/// Exists only for the duration of one request; it is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBatch {
    rows: Vec<ImportRow>,
}

impl ImportBatch {
    /// Parses CSV bytes (first line is the header row) and validates that a
    /// `domain` column is present. Rows whose domain cell is blank carry no
    /// usable upsert key and are dropped.
    pub fn parse(bytes: &[u8]) -> Result<Self, ImportError> {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(bytes);
        let headers = reader.headers()?.clone();

        if !headers.iter().any(|header| header == DOMAIN_COLUMN) {
            return Err(ImportError::MissingDomainColumn);
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let mut domain = String::new();
            let mut attributes = Vec::new();
            for (idx, header) in headers.iter().enumerate() {
                let value = record.get(idx).unwrap_or("");
                if header == DOMAIN_COLUMN {
                    domain = value.to_string();
                } else {
                    attributes.push((header.to_string(), value.to_string()));
                }
            }
            if domain.is_empty() {
                continue;
            }
            rows.push(ImportRow { domain, attributes });
        }

        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[ImportRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
