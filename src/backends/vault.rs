use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::secret_backend::{DynamicSecretResponse, LeaseResponse, SecretBackend};
use crate::error::BackendError;
use crate::token::VaultToken;

/// Connection-establish timeout for every Vault request
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on a whole Vault request, connect through body
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const TOKEN_HEADER: &str = "X-Vault-Token";
const API_PREFIX: &str = "/v1/";
const LEASE_LOOKUP_PATH: &str = "/v1/sys/leases/lookup";

/// HashiCorp Vault client
#[derive(Clone)]
pub struct VaultClient {
    client: Client,
}

#[derive(Debug, Serialize)]
struct LeaseLookupRequest<'a> {
    lease_id: &'a str,
}

impl VaultClient {
    /// Create a new Vault client
    pub fn new() -> Result<Self, BackendError> {
        Self::with_timeouts(CONNECT_TIMEOUT, REQUEST_TIMEOUT)
    }

    /// Create a Vault client with explicit connect and request bounds
    pub fn with_timeouts(connect: Duration, request: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .http1_only()
            .connect_timeout(connect)
            .timeout(request)
            .build()
            .map_err(BackendError::Transport)?;

        Ok(Self { client })
    }

    fn secret_url(address: &str, secret_path: &str) -> Result<Url, BackendError> {
        let invalid = |source| BackendError::InvalidUrl {
            address: address.to_string(),
            source,
        };
        Url::parse(address)
            .and_then(|base| base.join(API_PREFIX))
            .and_then(|api| api.join(secret_path.trim_start_matches('/')))
            .map_err(invalid)
    }

    fn lease_lookup_url(address: &str) -> Result<Url, BackendError> {
        Url::parse(address)
            .and_then(|base| base.join(LEASE_LOOKUP_PATH))
            .map_err(|source| BackendError::InvalidUrl {
                address: address.to_string(),
                source,
            })
    }
}

// A body that stalls past the request bound is a transport failure, not a bad payload
fn decode_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Transport(e)
    } else {
        BackendError::InvalidResponse(e)
    }
}

#[async_trait::async_trait]
impl SecretBackend for VaultClient {
    async fn fetch_secret(
        &self,
        address: &str,
        secret_path: &str,
        token: &VaultToken,
    ) -> Result<DynamicSecretResponse, BackendError> {
        let url = Self::secret_url(address, secret_path)?;
        debug!("Reading dynamic secret from: {}", url);

        let response = self
            .client
            .get(url)
            .header(TOKEN_HEADER, token.expose())
            .send()
            .await
            .map_err(BackendError::Transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::FetchFailed {
                status: status.as_u16(),
                body,
            });
        }

        let secret: DynamicSecretResponse = response.json().await.map_err(decode_error)?;

        info!("Fetched dynamic secret {} (lease {})", secret_path, secret.lease_id);
        Ok(secret)
    }

    async fn lookup_lease(
        &self,
        address: &str,
        lease_id: &str,
        token: &VaultToken,
    ) -> Result<Option<LeaseResponse>, BackendError> {
        let url = Self::lease_lookup_url(address)?;
        debug!("Looking up lease {} at: {}", lease_id, url);

        let response = self
            .client
            .post(url)
            .header(TOKEN_HEADER, token.expose())
            .json(&LeaseLookupRequest { lease_id })
            .send()
            .await
            .map_err(BackendError::Transport)?;

        if !response.status().is_success() {
            info!("No lease found for {} (status {})", lease_id, response.status());
            return Ok(None);
        }

        let lease: LeaseResponse = response.json().await.map_err(decode_error)?;

        Ok(Some(lease))
    }

    fn backend_type(&self) -> &'static str {
        "HashiCorp Vault"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    const SECRET_BODY: &str = r#"{"lease_id":"abc-1","data":{"username":"u1","password":"p1"}}"#;

    #[test]
    fn test_vault_url_construction() {
        let url = VaultClient::secret_url("http://vault.example:8200", "secret/data/db").unwrap();
        assert_eq!(url.as_str(), "http://vault.example:8200/v1/secret/data/db");

        // A path on the address is replaced, not extended
        let url = VaultClient::secret_url("https://vault.example/ui/", "/database/creds/app").unwrap();
        assert_eq!(url.as_str(), "https://vault.example/v1/database/creds/app");

        let url = VaultClient::lease_lookup_url("http://127.0.0.1:8200").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8200/v1/sys/leases/lookup");

        assert!(matches!(
            VaultClient::secret_url("not a url", "db"),
            Err(BackendError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_secret_sends_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/secret/data/db")
            .match_header("x-vault-token", "s.ABC")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SECRET_BODY)
            .expect(1)
            .create_async()
            .await;

        let client = VaultClient::new().unwrap();
        let secret = client
            .fetch_secret(&server.url(), "secret/data/db", &VaultToken::new("s.ABC\n"))
            .await
            .unwrap();

        assert_eq!(secret.lease_id, "abc-1");
        assert_eq!(secret.data.username, "u1");
        assert_eq!(secret.data.password, "p1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_secret_failure_carries_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/database/creds/app")
            .with_status(403)
            .with_body(r#"{"errors":["permission denied"]}"#)
            .create_async()
            .await;

        let client = VaultClient::new().unwrap();
        let err = client
            .fetch_secret(&server.url(), "database/creds/app", &VaultToken::new("s.BAD"))
            .await
            .unwrap_err();

        match err {
            BackendError::FetchFailed { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("permission denied"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_secret_rejects_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/database/creds/app")
            .with_status(200)
            .with_body(r#"{"data":{}}"#)
            .create_async()
            .await;

        let client = VaultClient::new().unwrap();
        let err = client
            .fetch_secret(&server.url(), "database/creds/app", &VaultToken::new("s.ABC"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_lookup_lease_present() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/sys/leases/lookup")
            .match_header("x-vault-token", "s.ABC")
            .match_body(Matcher::Json(json!({ "lease_id": "abc-1" })))
            .with_status(200)
            .with_body(r#"{"data":{"id":"abc-1","ttl":120,"renewable":false}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = VaultClient::new().unwrap();
        let lease = client
            .lookup_lease(&server.url(), "abc-1", &VaultToken::new("s.ABC"))
            .await
            .unwrap();

        let lease = lease.expect("lease should be present");
        assert_eq!(lease.data.and_then(|d| d.ttl), Some(120));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_lookup_lease_gone_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/sys/leases/lookup")
            .with_status(400)
            .with_body(r#"{"errors":["invalid lease"]}"#)
            .create_async()
            .await;

        let client = VaultClient::new().unwrap();
        let lease = client
            .lookup_lease(&server.url(), "abc-1", &VaultToken::new("s.ABC"))
            .await
            .unwrap();
        assert!(lease.is_none());
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        let client = VaultClient::new().unwrap();
        let err = client
            .fetch_secret("http://127.0.0.1:1", "secret/data/db", &VaultToken::new("s.ABC"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }

    #[tokio::test]
    async fn test_silent_server_is_bounded_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());

        // Accept connections and never answer
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client =
            VaultClient::with_timeouts(CONNECT_TIMEOUT, Duration::from_millis(300)).unwrap();
        let token = VaultToken::new("s.ABC");
        let started = std::time::Instant::now();

        let err = client
            .fetch_secret(&address, "secret/data/db", &token)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Transport(ref e) if e.is_timeout()));

        let err = client
            .lookup_lease(&address, "abc-1", &token)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Transport(ref e) if e.is_timeout()));

        assert!(started.elapsed() < Duration::from_secs(5));
        server.abort();
    }
}
