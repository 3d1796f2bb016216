//! Secret backend implementations
//!
//! The orchestrator only talks to Vault through the [`SecretBackend`] trait.

mod secret_backend;
mod vault;

pub use secret_backend::{
    DatabaseCredentials, DynamicSecretResponse, LeaseDetails, LeaseResponse, SecretBackend,
};
pub use vault::{VaultClient, CONNECT_TIMEOUT, REQUEST_TIMEOUT};

/// Type alias for a shared backend trait object
pub type Backend = std::sync::Arc<dyn SecretBackend>;
