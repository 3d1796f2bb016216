//! Backend address and secret path resolution
//!
//! Both are pure lookups over the credentials and the captured environment.

use tracing::debug;
use url::Url;

use crate::config::{Credentials, Environment};
use crate::error::ConfigurationError;

/// Resolve the Vault address: explicit setting, then `VAULT_AGENT_ADDR`, then `VAULT_ADDR`
pub fn resolve_address(
    credentials: &Credentials,
    env: &Environment,
) -> Result<String, ConfigurationError> {
    let candidates = [
        ("data source", credentials.address.as_deref()),
        ("VAULT_AGENT_ADDR", env.vault_agent_addr.as_deref()),
        ("VAULT_ADDR", env.vault_addr.as_deref()),
    ];

    let (source, address) = candidates
        .into_iter()
        .find_map(|(source, value)| non_blank(value).map(|v| (source, v)))
        .ok_or(ConfigurationError::AddressNotDefined)?;

    Url::parse(address).map_err(|e| ConfigurationError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })?;

    debug!("Vault address taken from {}", source);
    Ok(address.to_string())
}

/// Validate the configured secret path
pub fn resolve_secret(credentials: &Credentials) -> Result<String, ConfigurationError> {
    non_blank(credentials.secret.as_deref())
        .map(str::to_string)
        .ok_or(ConfigurationError::SecretNotDefined)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(agent: Option<&str>, addr: Option<&str>) -> Environment {
        Environment {
            vault_agent_addr: agent.map(str::to_string),
            vault_addr: addr.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_explicit_address_wins() {
        let credentials = Credentials::new("db").with_address("http://explicit:8200");
        let env = env(Some("http://agent:8100"), Some("http://default:8200"));

        assert_eq!(
            resolve_address(&credentials, &env).unwrap(),
            "http://explicit:8200"
        );
    }

    #[test]
    fn test_agent_address_beats_default() {
        let credentials = Credentials::new("db");
        let env = env(Some("http://agent:8100"), Some("http://default:8200"));

        assert_eq!(resolve_address(&credentials, &env).unwrap(), "http://agent:8100");
    }

    #[test]
    fn test_default_address_is_last_resort() {
        let credentials = Credentials::new("db").with_address("   ");
        let env = env(None, Some("http://default:8200"));

        assert_eq!(resolve_address(&credentials, &env).unwrap(), "http://default:8200");
    }

    #[test]
    fn test_no_address_is_configuration_error() {
        let credentials = Credentials::new("db");
        let err = resolve_address(&credentials, &env(None, None)).unwrap_err();
        assert!(matches!(err, ConfigurationError::AddressNotDefined));
    }

    #[test]
    fn test_relative_address_rejected() {
        let credentials = Credentials::new("db").with_address("vault.internal");
        let err = resolve_address(&credentials, &env(None, None)).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidAddress { .. }));
    }

    #[test]
    fn test_secret_must_not_be_blank() {
        assert_eq!(
            resolve_secret(&Credentials::new("secret/data/db")).unwrap(),
            "secret/data/db"
        );
        assert!(matches!(
            resolve_secret(&Credentials::new(" \n")),
            Err(ConfigurationError::SecretNotDefined)
        ));
        assert!(matches!(
            resolve_secret(&Credentials::default()),
            Err(ConfigurationError::SecretNotDefined)
        ));
    }
}
