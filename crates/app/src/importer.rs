use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use domain_catalog_core::import::{AttributeAction, ImportBatch};
use domain_catalog_core::types::DomainStatus;
use domain_catalog_storage::{Database, DomainError, NewDomain};

/// Applies a parsed import batch to the record store.
///
/// The whole batch runs inside one transaction: a store error on any row
/// rolls back everything written for the batch so far.
#[derive(Clone)]
pub struct ImportExecutor {
    database: Database,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl ImportExecutor {
    pub fn new(database: Database, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        Self { database, clock }
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Upserts every row of the batch, keyed by the domain name, and returns
    /// the number of rows processed.
    ///
    /// Existing records keep their name; each non-empty cell overwrites the
    /// matching attribute and each empty cell removes it. Unmatched rows
    /// become new published records carrying only their non-empty cells.
    pub async fn run(&self, batch: &ImportBatch) -> Result<u64, ImportExecutorError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let repo = self.database.domains();
        let mut tx = repo.begin().await.map_err(DomainError::from)?;
        let mut processed = 0u64;

        for row in batch.rows() {
            let now = self.now();
            match repo.find_id_by_name(&mut tx, &row.domain).await? {
                Some(id) => {
                    for (key, action) in row.actions() {
                        match action {
                            AttributeAction::Clear => {
                                repo.delete_attribute(&mut tx, &id, key).await?;
                            }
                            AttributeAction::Set(value) => {
                                repo.set_attribute(&mut tx, &id, key, value, now).await?;
                            }
                        }
                    }
                }
                None => {
                    let attributes = row.initial_attributes();
                    repo.create(
                        &mut tx,
                        NewDomain {
                            name: &row.domain,
                            status: DomainStatus::Published,
                            attributes: &attributes,
                            created_at: now,
                        },
                    )
                    .await?;
                }
            }
            processed += 1;
        }

        tx.commit().await.map_err(DomainError::from)?;
        Ok(processed)
    }
}

/// Errors raised while applying an import batch.
#[derive(Debug, Error)]
pub enum ImportExecutorError {
    #[error(transparent)]
    Domain(#[from] DomainError),
}
