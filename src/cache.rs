//! Process-wide cache of dynamic secrets keyed by Vault address and secret path
//!
//! Entries never expire on their own; they are replaced only when Vault no
//! longer recognises their lease.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::backends::DynamicSecretResponse;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub address: String,
    pub secret_path: String,
}

impl CacheKey {
    pub fn new(address: impl Into<String>, secret_path: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            secret_path: secret_path.into(),
        }
    }
}

/// Shared handle; clones see the same entries
#[derive(Debug, Clone, Default)]
pub struct LeaseCache {
    entries: Arc<RwLock<HashMap<CacheKey, DynamicSecretResponse>>>,
}

impl LeaseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &CacheKey) -> Option<DynamicSecretResponse> {
        self.entries.read().await.get(key).cloned()
    }

    /// Store a freshly fetched secret, replacing any previous entry whole
    pub async fn put(&self, key: CacheKey, secret: DynamicSecretResponse) {
        self.entries.write().await.insert(key, secret);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
