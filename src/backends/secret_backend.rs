use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::BackendError;
use crate::token::VaultToken;

/// Username/password pair issued by a dynamic secrets engine
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Body of a dynamic secret read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicSecretResponse {
    pub lease_id: String,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
    pub data: DatabaseCredentials,
}

/// Body of a successful `sys/leases/lookup`; only its presence matters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaseResponse {
    #[serde(default)]
    pub data: Option<LeaseDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaseDetails {
    pub id: Option<String>,
    pub issue_time: Option<DateTime<Utc>>,
    pub expire_time: Option<DateTime<Utc>>,
    pub ttl: Option<i64>,
    #[serde(default)]
    pub renewable: bool,
}

impl LeaseResponse {
    pub fn expire_time(&self) -> Option<DateTime<Utc>> {
        self.data.as_ref().and_then(|d| d.expire_time)
    }
}

/// The two Vault operations credential injection needs
#[async_trait::async_trait]
pub trait SecretBackend: Send + Sync {
    /// Read a dynamic secret; a non-success status is an error
    async fn fetch_secret(
        &self,
        address: &str,
        secret_path: &str,
        token: &VaultToken,
    ) -> Result<DynamicSecretResponse, BackendError>;

    /// Look up a lease; `None` means the lease is gone
    async fn lookup_lease(
        &self,
        address: &str,
        lease_id: &str,
        token: &VaultToken,
    ) -> Result<Option<LeaseResponse>, BackendError>;

    /// Get the backend type name for display purposes
    fn backend_type(&self) -> &'static str;
}
