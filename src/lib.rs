//! Vault Database Credentials Library
//!
//! Resolves database usernames and passwords from HashiCorp Vault dynamic
//! secrets, reusing a secret for as long as Vault keeps its lease alive.

pub mod address;
pub mod backends;
pub mod cache;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod token;

pub use address::{resolve_address, resolve_secret};
pub use backends::{Backend, SecretBackend, VaultClient};
pub use cache::{CacheKey, LeaseCache};
pub use config::{Credentials, Environment};
pub use error::{BackendError, ConfigurationError, Error, TokenError};
pub use orchestrator::{CredentialOrchestrator, PROP_PASSWORD, PROP_USER};
pub use token::{TokenResolver, TokenSource, VaultToken};
