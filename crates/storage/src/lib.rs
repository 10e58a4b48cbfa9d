use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    migrate::MigrateError, sqlite::SqlitePoolOptions, Row, Sqlite, SqlitePool, Transaction,
};
use thiserror::Error;
use uuid::Uuid;

use domain_catalog_core::query::{DomainListQuery, Ordering};
use domain_catalog_core::types::{Category, DomainRecord, DomainStatus};

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle to operate on catalog records.
    pub fn domains(&self) -> DomainRepository {
        DomainRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for interacting with category terms.
    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for catalog records and their attributes.
///
/// Mutations on the import and save paths take an explicit transaction so one
/// batch commits or rolls back as a unit; read paths go through the pool.
#[derive(Clone)]
pub struct DomainRepository {
    pool: SqlitePool,
}

impl DomainRepository {
    /// Begins a SQLite transaction.
    pub async fn begin(&self) -> Result<Transaction<'_, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Creates a new record together with its initial attributes.
    pub async fn create(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        record: NewDomain<'_>,
    ) -> Result<String, DomainError> {
        let id = Uuid::new_v4().to_string();
        let stamp = to_rfc3339(record.created_at);
        let result = sqlx::query(
            "INSERT INTO domains (id, name, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(record.name)
        .bind(record.status.as_str())
        .bind(&stamp)
        .bind(&stamp)
        .execute(&mut **tx)
        .await;

        if let Err(err) = result {
            return Err(map_unique_violation(err, DomainError::DuplicateName));
        }

        for (key, value) in record.attributes {
            sqlx::query(
                "INSERT INTO domain_attributes (domain_id, key, value, updated_at) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(key)
            .bind(value)
            .bind(&stamp)
            .execute(&mut **tx)
            .await?;
        }

        Ok(id)
    }

    /// Exact-match lookup of a record id by display name, inside the caller's
    /// transaction so rows created earlier in the same batch are visible.
    pub async fn find_id_by_name(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        name: &str,
    ) -> Result<Option<String>, DomainError> {
        let row = sqlx::query("SELECT id FROM domains WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.map(|row| row.get("id")))
    }

    /// Sets or overwrites one attribute; the raw string is stored verbatim.
    pub async fn set_attribute(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        domain_id: &str,
        key: &str,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let stamp = to_rfc3339(now);
        sqlx::query(
            "INSERT INTO domain_attributes (domain_id, key, value, updated_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(domain_id, key) DO UPDATE \
             SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(domain_id)
        .bind(key)
        .bind(value)
        .bind(&stamp)
        .execute(&mut **tx)
        .await?;

        self.touch(tx, domain_id, &stamp).await
    }

    /// Removes one attribute; absent attributes are a no-op.
    pub async fn delete_attribute(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        domain_id: &str,
        key: &str,
    ) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM domain_attributes WHERE domain_id = ? AND key = ?")
            .bind(domain_id)
            .bind(key)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn touch(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        domain_id: &str,
        stamp: &str,
    ) -> Result<(), DomainError> {
        sqlx::query("UPDATE domains SET updated_at = ? WHERE id = ?")
            .bind(stamp)
            .bind(domain_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Reads one attribute's raw value.
    pub async fn get_attribute(
        &self,
        domain_id: &str,
        key: &str,
    ) -> Result<Option<String>, DomainError> {
        let row =
            sqlx::query("SELECT value FROM domain_attributes WHERE domain_id = ? AND key = ?")
                .bind(domain_id)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|row| row.get("value")))
    }

    /// Loads one record with its full attribute map.
    pub async fn fetch(&self, domain_id: &str) -> Result<Option<DomainRecord>, DomainError> {
        let row = sqlx::query_as::<_, DomainRow>(
            "SELECT id, name, status, created_at, updated_at FROM domains WHERE id = ?",
        )
        .bind(domain_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let attributes = sqlx::query(
            "SELECT key, value FROM domain_attributes WHERE domain_id = ? ORDER BY key",
        )
        .bind(domain_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|attr| (attr.get("key"), attr.get("value")))
        .collect::<BTreeMap<String, String>>();

        Ok(Some(row.into_domain(attributes)))
    }

    /// Lists the catalog according to the provided query descriptor.
    ///
    /// Attribute ordering left-joins the attribute table and casts the raw
    /// value to a number; records lacking the attribute sort on NULL and stay
    /// in the result set unless the descriptor excludes them.
    pub async fn list(&self, query: &DomainListQuery) -> Result<Vec<DomainRecord>, DomainError> {
        let direction = query.direction.as_sql();
        let rows = match &query.ordering {
            Ordering::Name => {
                let sql = format!(
                    "SELECT id, name, status, created_at, updated_at FROM domains \
                     ORDER BY name COLLATE NOCASE {direction}"
                );
                sqlx::query_as::<_, DomainRow>(&sql).fetch_all(&self.pool).await?
            }
            Ordering::AttributeNumeric {
                key,
                include_missing,
            } => {
                let filter = if *include_missing {
                    ""
                } else {
                    " WHERE a.value IS NOT NULL"
                };
                let sql = format!(
                    "SELECT d.id, d.name, d.status, d.created_at, d.updated_at \
                     FROM domains AS d \
                     LEFT JOIN domain_attributes AS a \
                       ON a.domain_id = d.id AND a.key = ?\
                     {filter} \
                     ORDER BY CAST(a.value AS REAL) {direction}, d.name COLLATE NOCASE ASC"
                );
                sqlx::query_as::<_, DomainRow>(&sql)
                    .bind(key)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut attributes: HashMap<String, BTreeMap<String, String>> = HashMap::new();
        let attr_rows = sqlx::query("SELECT domain_id, key, value FROM domain_attributes")
            .fetch_all(&self.pool)
            .await?;
        for attr in attr_rows {
            attributes
                .entry(attr.get("domain_id"))
                .or_default()
                .insert(attr.get("key"), attr.get("value"));
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let attrs = attributes.remove(&row.id).unwrap_or_default();
                row.into_domain(attrs)
            })
            .collect())
    }

    /// Counts every record regardless of status.
    pub async fn count(&self) -> Result<u64, DomainError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM domains")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 as u64)
    }

    /// Permanently deletes every record regardless of status, cascading to
    /// attributes and category links. Returns the pre-delete count.
    pub async fn delete_all(&self) -> Result<u64, DomainError> {
        let mut tx = self.pool.begin().await?;
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM domains")
            .fetch_one(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM domains").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(row.0 as u64)
    }
}

/// Parameters required to create a catalog record.
pub struct NewDomain<'a> {
    pub name: &'a str,
    pub status: DomainStatus,
    pub attributes: &'a [(String, String)],
    pub created_at: DateTime<Utc>,
}

/// Row shape shared by the fetch and list queries.
#[derive(Debug, sqlx::FromRow)]
struct DomainRow {
    id: String,
    name: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DomainRow {
    fn into_domain(self, attributes: BTreeMap<String, String>) -> DomainRecord {
        DomainRecord {
            id: self.id,
            name: self.name,
            status: DomainStatus::from_stored(&self.status),
            attributes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Errors that can occur while mutating catalog records.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("a domain with the same name already exists")]
    DuplicateName,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}

fn map_unique_violation(err: sqlx::Error, mapped: DomainError) -> DomainError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("2067") {
                mapped
            } else {
                DomainError::Database(sqlx::Error::Database(db_err))
            }
        }
        other => DomainError::Database(other),
    }
}

/// Repository handling category terms and their assignments.
#[derive(Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    /// Creates the term when absent and returns it either way.
    pub async fn ensure(&self, name: &str, now: DateTime<Utc>) -> Result<Category, CategoryError> {
        let id = Uuid::new_v4().to_string();
        let row = sqlx::query(
            "INSERT INTO categories (id, name, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET name = excluded.name \
             RETURNING id, name",
        )
        .bind(&id)
        .bind(name)
        .bind(to_rfc3339(now))
        .fetch_one(&self.pool)
        .await?;

        Ok(Category {
            id: row.get("id"),
            name: row.get("name"),
        })
    }

    /// Associates a record with a term; repeated assignment is a no-op.
    pub async fn assign(&self, domain_id: &str, category_id: &str) -> Result<(), CategoryError> {
        sqlx::query("INSERT OR IGNORE INTO domain_categories (domain_id, category_id) VALUES (?, ?)")
            .bind(domain_id)
            .bind(category_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Lists the terms assigned to one record.
    pub async fn list_for_domain(&self, domain_id: &str) -> Result<Vec<Category>, CategoryError> {
        let rows = sqlx::query(
            "SELECT c.id, c.name FROM categories AS c \
             JOIN domain_categories AS dc ON dc.category_id = c.id \
             WHERE dc.domain_id = ? \
             ORDER BY c.name",
        )
        .bind(domain_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Category {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect())
    }
}

/// Errors that can occur while mutating category terms.
#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
