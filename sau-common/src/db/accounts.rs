//! Account Session Store
//!
//! Append-only registry of logged-in platform accounts. Rows are only ever
//! inserted (at the end of a successful login run) and listed.

use crate::PlatformType;
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;

/// Account created but not yet verified
pub const STATUS_PENDING: i64 = 0;
/// Account with a verified credential file
pub const STATUS_ACTIVE: i64 = 1;

/// One row of `user_info`
///
/// Serialized with the column names the front end already consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct AccountRecord {
    pub id: i64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub platform_type: i64,
    #[serde(rename = "filePath")]
    #[sqlx(rename = "filePath")]
    pub credential_file_path: String,
    #[serde(rename = "userName")]
    #[sqlx(rename = "userName")]
    pub account_name: String,
    pub status: i64,
}

impl AccountRecord {
    /// Platform of this account; `None` for codes written by unknown clients
    pub fn platform(&self) -> Option<PlatformType> {
        PlatformType::from_code(self.platform_type)
    }

    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }
}

/// Failure of [`AccountStore::create`]
#[derive(Debug, Error)]
pub enum CreateAccountError {
    /// An account with this name is already registered; nothing was written
    #[error("Account already exists: {0}")]
    AlreadyExists(String),

    /// The insert itself failed
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

const SELECT_COLUMNS: &str =
    "id, type, filePath, userName, COALESCE(status, 0) AS status";

/// SQLite-backed account store
#[derive(Clone)]
pub struct AccountStore {
    pool: SqlitePool,
}

impl AccountStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new active account, or reject if the name is taken
    ///
    /// Uses a single `INSERT ... ON CONFLICT DO NOTHING RETURNING` so two
    /// concurrent creates for the same name cannot both succeed.
    pub async fn create(
        &self,
        account_name: &str,
        platform: PlatformType,
    ) -> Result<AccountRecord, CreateAccountError> {
        let file_path = platform.credential_file_path(account_name);

        let inserted = sqlx::query_as::<_, AccountRecord>(
            r#"
            INSERT INTO user_info (type, filePath, userName, status)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(userName) DO NOTHING
            RETURNING id, type, filePath, userName, COALESCE(status, 0) AS status
            "#,
        )
        .bind(platform.code())
        .bind(&file_path)
        .bind(account_name)
        .bind(STATUS_ACTIVE)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(record) => {
                tracing::info!(
                    account = %record.account_name,
                    id = record.id,
                    platform = %platform,
                    "Account created"
                );
                Ok(record)
            }
            None => Err(CreateAccountError::AlreadyExists(account_name.to_string())),
        }
    }

    /// All accounts, newest first
    pub async fn list(&self) -> Result<Vec<AccountRecord>, sqlx::Error> {
        sqlx::query_as::<_, AccountRecord>(&format!(
            "SELECT {} FROM user_info ORDER BY id DESC",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find_by_name(
        &self,
        account_name: &str,
    ) -> Result<Option<AccountRecord>, sqlx::Error> {
        sqlx::query_as::<_, AccountRecord>(&format!(
            "SELECT {} FROM user_info WHERE userName = ?",
            SELECT_COLUMNS
        ))
        .bind(account_name)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM user_info")
            .fetch_one(&self.pool)
            .await
    }
}
