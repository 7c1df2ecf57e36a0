//! Session Store seam used by the login run

use async_trait::async_trait;
use sau_common::db::{AccountRecord, AccountStore, CreateAccountError};
use sau_common::PlatformType;

/// Where successful logins are recorded
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(
        &self,
        account_name: &str,
        platform: PlatformType,
    ) -> Result<AccountRecord, CreateAccountError>;
}

#[async_trait]
impl SessionStore for AccountStore {
    async fn create(
        &self,
        account_name: &str,
        platform: PlatformType,
    ) -> Result<AccountRecord, CreateAccountError> {
        AccountStore::create(self, account_name, platform).await
    }
}
