//! Credential injection entry point
//!
//! Resolves the address, secret path and token, then serves the dynamic secret
//! from the lease cache when Vault still recognises its lease.

use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, info, warn};

use crate::address::{resolve_address, resolve_secret};
use crate::backends::{Backend, DatabaseCredentials, DynamicSecretResponse};
use crate::cache::{CacheKey, LeaseCache};
use crate::config::{Credentials, Environment};
use crate::error::{BackendError, Result};
use crate::token::{TokenResolver, VaultToken};

/// Connection property receiving the resolved username
pub const PROP_USER: &str = "user";
/// Connection property receiving the resolved password
pub const PROP_PASSWORD: &str = "password";

pub struct CredentialOrchestrator {
    backend: Backend,
    cache: LeaseCache,
    tokens: TokenResolver,
    env: Environment,
}

impl CredentialOrchestrator {
    pub fn new(backend: Backend, cache: LeaseCache, env: Environment) -> Self {
        Self {
            backend,
            cache,
            tokens: TokenResolver::new(env.clone()),
            env,
        }
    }

    pub fn with_token_resolver(mut self, tokens: TokenResolver) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn cache(&self) -> &LeaseCache {
        &self.cache
    }

    /// Resolve the username/password for a data source
    pub async fn resolve(&self, credentials: &Credentials) -> Result<DatabaseCredentials> {
        let address = resolve_address(credentials, &self.env)?;
        let secret_path = resolve_secret(credentials)?;

        info!("Address used: {}", address);
        info!("Secret used: {}", secret_path);

        // The lease check needs a token too, so this runs on cache hits as well.
        let token = self.tokens.resolve(credentials, &address).await?.token;

        let key = CacheKey::new(address.clone(), secret_path.clone());
        let secret = match self.cache.get(&key).await {
            None => self.fetch_and_store(key, &address, &secret_path, &token).await?,
            Some(cached) => {
                let lease = self
                    .backend
                    .lookup_lease(&address, &cached.lease_id, &token)
                    .await?;
                match lease {
                    Some(lease) => {
                        debug!(
                            "Reusing secret for {} (lease {}, expires {:?})",
                            secret_path,
                            cached.lease_id,
                            lease.expire_time()
                        );
                        cached
                    }
                    None => {
                        info!("Lease {} is no longer valid, fetching a new secret", cached.lease_id);
                        self.fetch_and_store(key, &address, &secret_path, &token).await?
                    }
                }
            }
        };

        info!("Username used {}", secret.data.username);
        Ok(secret.data)
    }

    /// Resolve credentials and write them into the connection properties
    pub async fn init_authentication(
        &self,
        credentials: &Credentials,
        props: &mut HashMap<String, String>,
    ) -> Result<()> {
        let resolved = self.resolve(credentials).await?;
        props.insert(PROP_USER.to_string(), resolved.username);
        props.insert(PROP_PASSWORD.to_string(), resolved.password);
        Ok(())
    }

    /// Like [`init_authentication`](Self::init_authentication), but gives up as soon
    /// as `interrupt` completes. Abandoned helpers and requests are torn down on drop.
    pub async fn init_authentication_until<F>(
        &self,
        credentials: &Credentials,
        props: &mut HashMap<String, String>,
        interrupt: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let resolved = tokio::select! {
            resolved = self.resolve(credentials) => resolved?,
            _ = interrupt => {
                warn!("Credential resolution interrupted");
                return Err(BackendError::Interrupted.into());
            }
        };

        props.insert(PROP_USER.to_string(), resolved.username);
        props.insert(PROP_PASSWORD.to_string(), resolved.password);
        Ok(())
    }

    async fn fetch_and_store(
        &self,
        key: CacheKey,
        address: &str,
        secret_path: &str,
        token: &VaultToken,
    ) -> Result<DynamicSecretResponse> {
        let secret = self
            .backend
            .fetch_secret(address, secret_path, token)
            .await?;
        self.cache.put(key, secret.clone()).await;
        Ok(secret)
    }
}
