//! Vault token discovery
//!
//! Sources are tried in order: the data source's token file, the token helper
//! named in the Vault config file, then `~/.vault-token`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{Credentials, Environment, VaultConfig, ENV_VAULT_ADDR};
use crate::error::TokenError;

/// How long a token helper may run before it is killed
pub const DEFAULT_HELPER_TIMEOUT: Duration = Duration::from_secs(10);

/// A Vault token. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct VaultToken(String);

impl VaultToken {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    fn is_blank(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for VaultToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultToken(***)")
    }
}

/// Where a token came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    TokenFile,
    TokenHelper,
    DefaultTokenFile,
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenSource::TokenFile => "token file",
            TokenSource::TokenHelper => "token helper",
            TokenSource::DefaultTokenFile => "default token file",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedToken {
    pub token: VaultToken,
    pub source: TokenSource,
}

/// Resolves the token to present to Vault
#[derive(Debug, Clone)]
pub struct TokenResolver {
    env: Environment,
    helper_timeout: Duration,
}

impl TokenResolver {
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            helper_timeout: DEFAULT_HELPER_TIMEOUT,
        }
    }

    pub fn with_helper_timeout(mut self, timeout: Duration) -> Self {
        self.helper_timeout = timeout;
        self
    }

    /// Resolve a token for `address`, first source wins
    pub async fn resolve(
        &self,
        credentials: &Credentials,
        address: &str,
    ) -> Result<ResolvedToken, TokenError> {
        let explicit = credentials
            .token_file
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty());

        if let Some(path) = explicit {
            if let Some(token) = read_token_file(path).await? {
                return Ok(found(token, TokenSource::TokenFile));
            }
            debug!("Token file {:?} not usable, trying other sources", path);
        }

        if let Some(config_file) = self.env.config_file() {
            if let Some(token) = self.token_from_helper(&config_file, address).await? {
                return Ok(found(token, TokenSource::TokenHelper));
            }
        }

        if let Some(path) = self.env.default_token_file() {
            if let Some(token) = read_token_file(&path).await? {
                return Ok(found(token, TokenSource::DefaultTokenFile));
            }
        }

        Err(TokenError::TokenNotDefined)
    }

    async fn token_from_helper(
        &self,
        config_file: &Path,
        address: &str,
    ) -> Result<Option<VaultToken>, TokenError> {
        if !file_exists(config_file).await {
            return Ok(None);
        }

        let config = VaultConfig::from_file(config_file)?;
        let Some(helper) = config.token_helper() else {
            debug!("No token helper configured in {:?}", config_file);
            return Ok(None);
        };

        let output = self.run_helper(helper, address).await?;
        let token = VaultToken::new(output);
        if token.is_blank() {
            // A configured helper with nothing to give means logged out
            return Err(TokenError::HelperFailed {
                helper: helper.to_string(),
                stderr: "returned an empty token".to_string(),
            });
        }
        Ok(Some(token))
    }

    /// Run `<helper> get`, draining stdout and stderr on separate tasks
    async fn run_helper(&self, helper: &str, address: &str) -> Result<String, TokenError> {
        debug!("Running token helper: {} get", helper);

        // An address already in the environment is what the helper would see anyway.
        let helper_addr = self.env.vault_addr.as_deref().unwrap_or(address);

        let mut child = Command::new(helper)
            .arg("get")
            .env(ENV_VAULT_ADDR, helper_addr)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TokenError::HelperSpawn {
                helper: helper.to_string(),
                source,
            })?;

        let stdout = DrainTask::spawn(child.stdout.take());
        let stderr = DrainTask::spawn(child.stderr.take());

        let finished = tokio::time::timeout(self.helper_timeout, async {
            let status = child.wait().await;
            let out = stdout.join().await;
            let err = stderr.join().await;
            (status, out, err)
        })
        .await;

        let (status, out, err) = match finished {
            Ok(results) => results,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill token helper {}: {}", helper, e);
                }
                return Err(TokenError::HelperTimeout {
                    helper: helper.to_string(),
                });
            }
        };

        let io_err = |source| TokenError::Io {
            path: PathBuf::from(helper),
            source,
        };
        let status = status.map_err(io_err)?;
        let out = out.map_err(io_err)?;
        let err = err.map_err(io_err)?;

        let stderr_text = err.trim();
        if !stderr_text.is_empty() {
            return Err(TokenError::HelperFailed {
                helper: helper.to_string(),
                stderr: stderr_text.to_string(),
            });
        }

        if !status.success() {
            return Err(TokenError::HelperFailed {
                helper: helper.to_string(),
                stderr: format!("exited with {}", status),
            });
        }

        Ok(out)
    }
}

fn found(token: VaultToken, source: TokenSource) -> ResolvedToken {
    info!("Vault token taken from {}", source);
    ResolvedToken { token, source }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn read_token_file(path: &Path) -> Result<Option<VaultToken>, TokenError> {
    if !file_exists(path).await {
        return Ok(None);
    }

    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| TokenError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let token = VaultToken::new(contents);
    if token.is_blank() {
        warn!("Token file {:?} is empty", path);
        return Ok(None);
    }
    Ok(Some(token))
}

/// Reads a child stream to the end on its own task; aborted if dropped unjoined
struct DrainTask(JoinHandle<std::io::Result<String>>);

impl DrainTask {
    fn spawn<R>(stream: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        Self(tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut stream) = stream {
                stream.read_to_end(&mut buf).await?;
            }
            Ok(String::from_utf8_lossy(&buf).into_owned())
        }))
    }

    async fn join(mut self) -> std::io::Result<String> {
        match (&mut self.0).await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::other(e)),
        }
    }
}

impl Drop for DrainTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}
