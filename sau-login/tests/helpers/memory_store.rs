//! In-memory Session Store

use async_trait::async_trait;
use sau_common::db::{AccountRecord, CreateAccountError, STATUS_ACTIVE};
use sau_common::PlatformType;
use sau_login::login::SessionStore;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<AccountRecord>>,
    /// Every create fails with a storage error
    pub fail: bool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_account(name: &str, platform: PlatformType) -> Self {
        let store = Self::default();
        store.insert(name, platform);
        store
    }

    fn insert(&self, name: &str, platform: PlatformType) -> AccountRecord {
        let mut records = self.records.lock().unwrap();
        let record = AccountRecord {
            id: records.len() as i64 + 1,
            platform_type: platform.code(),
            credential_file_path: platform.credential_file_path(name),
            account_name: name.to_string(),
            status: STATUS_ACTIVE,
        };
        records.push(record.clone());
        record
    }

    pub fn records(&self) -> Vec<AccountRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create(
        &self,
        account_name: &str,
        platform: PlatformType,
    ) -> Result<AccountRecord, CreateAccountError> {
        if self.fail {
            return Err(CreateAccountError::Storage(sqlx::Error::PoolTimedOut));
        }
        if self
            .records
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.account_name == account_name)
        {
            return Err(CreateAccountError::AlreadyExists(account_name.to_string()));
        }
        Ok(self.insert(account_name, platform))
    }
}
