//! Error taxonomy for credential resolution
//!
//! Every error is fatal to the current connection attempt; nothing here is retried.

use std::path::PathBuf;
use thiserror::Error;

/// Data-source settings are incomplete or malformed
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Vault address not defined")]
    AddressNotDefined,

    #[error("Vault secret not defined")]
    SecretNotDefined,

    #[error("Vault address '{address}' is not a valid URL: {reason}")]
    InvalidAddress { address: String, reason: String },
}

/// No usable token could be obtained
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Vault token not defined")]
    TokenNotDefined,

    #[error("Failure running Vault Token Helper: {helper}, took too long to respond")]
    HelperTimeout { helper: String },

    #[error("Failure running Vault Token Helper: {helper}: {stderr}")]
    HelperFailed { helper: String, stderr: String },

    #[error("Failed to start Vault Token Helper {helper}")]
    HelperSpawn {
        helper: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse Vault config file {path:?}")]
    InvalidConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The backend rejected a request or could not be reached
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Problem connecting to Vault: status {status}: {body}")]
    FetchFailed { status: u16, body: String },

    #[error("Problem connecting to Vault: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Failed to parse Vault response")]
    InvalidResponse(#[source] reqwest::Error),

    #[error("Failed to build Vault URL from {address}")]
    InvalidUrl {
        address: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Vault request interrupted")]
    Interrupted,
}

/// Top-level error returned by the orchestrator
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_match_settings_hints() {
        assert_eq!(
            ConfigurationError::AddressNotDefined.to_string(),
            "Vault address not defined"
        );
        assert_eq!(
            ConfigurationError::SecretNotDefined.to_string(),
            "Vault secret not defined"
        );
        assert_eq!(TokenError::TokenNotDefined.to_string(), "Vault token not defined");
    }

    #[test]
    fn test_fetch_failure_carries_body() {
        let err: Error = BackendError::FetchFailed {
            status: 403,
            body: "{\"errors\":[\"permission denied\"]}".to_string(),
        }
        .into();

        let message = err.to_string();
        assert!(message.contains("403"));
        assert!(message.contains("permission denied"));
        assert!(matches!(err, Error::Backend(BackendError::FetchFailed { .. })));
    }

    #[test]
    fn test_helper_failure_carries_stderr() {
        let err = TokenError::HelperFailed {
            helper: "/usr/local/bin/helper".to_string(),
            stderr: "not logged in".to_string(),
        };
        assert!(err.to_string().ends_with("not logged in"));
    }
}
