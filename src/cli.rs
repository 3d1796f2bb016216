//! CLI parsing and command execution
//!
//! This module handles command-line argument parsing and routes commands to the appropriate handlers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use vault_db_credentials::{
    resolve_address, CredentialOrchestrator, Credentials, Environment, LeaseCache,
    SecretBackend, TokenResolver, VaultClient, PROP_PASSWORD, PROP_USER,
};

#[derive(Parser)]
#[command(name = "vdc")]
#[command(about = "Resolve database credentials from HashiCorp Vault dynamic secrets", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a data-source profile (TOML)
    #[arg(short, long, env = "VDC_PROFILE")]
    pub profile: Option<PathBuf>,

    /// Secret path (overrides profile)
    #[arg(long)]
    pub secret: Option<String>,

    /// Vault address (overrides profile; falls back to VAULT_AGENT_ADDR, then VAULT_ADDR)
    #[arg(long)]
    pub address: Option<String>,

    /// File holding the Vault token (overrides profile)
    #[arg(long)]
    pub token_file: Option<PathBuf>,

    /// Seconds to wait for the token helper
    #[arg(long, default_value = "10")]
    pub helper_timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a sample data-source profile
    Init {
        /// Output path for the profile
        #[arg(short, long, default_value = "vdc-profile.toml")]
        output: PathBuf,
    },

    /// Resolve the database username and password
    Resolve {
        /// Resolve this many times in a row, reusing the cached lease
        #[arg(long, default_value = "1")]
        repeat: u32,
    },

    /// Show which Vault address would be used
    Address,

    /// Show which source the Vault token would come from
    Token,

    /// Check whether a lease is still valid
    Lease {
        /// Lease identifier
        lease_id: String,
    },
}

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    // Handle init command separately as it doesn't need credentials
    if let Commands::Init { output } = cli.command {
        Credentials::create_sample(&output)
            .with_context(|| format!("Failed to create sample profile at {:?}", output))?;
        info!("Sample profile created at {:?}", output);
        return Ok(());
    }

    let mut credentials = if let Some(profile) = &cli.profile {
        Credentials::from_file(profile)
            .with_context(|| format!("Failed to load profile from {:?}", profile))?
    } else {
        Credentials::default()
    };

    // Override with CLI arguments if provided
    if let Some(secret) = cli.secret {
        credentials.secret = Some(secret);
    }
    if let Some(address) = cli.address {
        credentials.address = Some(address);
    }
    if let Some(token_file) = cli.token_file {
        credentials.token_file = Some(token_file);
    }

    let env = Environment::from_env();
    let tokens = TokenResolver::new(env.clone())
        .with_helper_timeout(Duration::from_secs(cli.helper_timeout));

    match cli.command {
        Commands::Init { .. } => unreachable!(), // Handled above

        Commands::Address => {
            let address = resolve_address(&credentials, &env)?;
            println!("{}", address);
        }

        Commands::Token => {
            let address = resolve_address(&credentials, &env)?;
            let resolved = tokens
                .resolve(&credentials, &address)
                .await
                .context("Failed to resolve Vault token")?;
            println!("Token resolved from {}", resolved.source);
        }

        Commands::Lease { lease_id } => {
            let address = resolve_address(&credentials, &env)?;
            let token = tokens
                .resolve(&credentials, &address)
                .await
                .context("Failed to resolve Vault token")?
                .token;
            let client = VaultClient::new().context("Failed to create Vault client")?;

            let lease = client
                .lookup_lease(&address, &lease_id, &token)
                .await
                .context("Failed to look up lease")?;

            match lease {
                Some(lease) => match lease.expire_time() {
                    Some(expires) => println!("Lease {} is valid until {}", lease_id, expires),
                    None => println!("Lease {} is valid", lease_id),
                },
                None => println!("Lease {} is not valid", lease_id),
            }
        }

        Commands::Resolve { repeat } => {
            let client = VaultClient::new().context("Failed to create Vault client")?;
            info!("Using {} backend", client.backend_type());

            let orchestrator =
                CredentialOrchestrator::new(Arc::new(client), LeaseCache::new(), env)
                    .with_token_resolver(tokens);

            let mut props = HashMap::new();
            for _ in 0..repeat.max(1) {
                orchestrator
                    .init_authentication_until(&credentials, &mut props, interrupted())
                    .await
                    .context("Failed to resolve database credentials")?;
            }

            eprintln!("WARNING: Credentials will be displayed. Ensure this output is secured.");
            println!("{}: {}", PROP_USER, props.get(PROP_USER).map_or("", String::as_str));
            println!(
                "{}: {}",
                PROP_PASSWORD,
                props.get(PROP_PASSWORD).map_or("", String::as_str)
            );
        }
    }

    Ok(())
}

/// Completes on Ctrl-C; never completes if the signal cannot be watched
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
