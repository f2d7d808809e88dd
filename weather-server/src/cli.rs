use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Confirm, Password};
use tokio::net::TcpListener;
use weather_core::{
    Config, LookupSettings, MeasurementCache, MemoryCache, ProviderId, WeatherLookup,
    provider::providers_from_config,
    server::{serve, shutdown_signal},
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-server", version, about = "Weather lookup service")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP service (default).
    Serve {
        /// Port to listen on; overrides config and PORT.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Store credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "weatherstack" or "openweather".
        provider: String,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            None => run_serve(self.config, None).await,
            Some(Command::Serve { port }) => run_serve(self.config, port).await,
            Some(Command::Configure { provider }) => run_configure(self.config, &provider),
        }
    }
}

fn config_path(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => Config::config_file_path(),
    }
}

async fn run_serve(config: Option<PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let path = config_path(config)?;
    let mut config = Config::load_from(&path)?;
    if let Some(port) = port {
        config.port = port;
    }

    let lookup = build_lookup(&config)?;

    let address = config.bind_address();
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;

    serve(listener, lookup, shutdown_signal()).await
}

/// Wire registry, cache and orchestrator from config. Fails when no provider has credentials.
fn build_lookup(config: &Config) -> anyhow::Result<Arc<WeatherLookup>> {
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()
        .context("Failed to build HTTP client")?;

    let providers = providers_from_config(config, &http)?;
    let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
    tracing::info!(
        providers = ?names,
        cache_ttl_ms = config.cache_ttl_ms,
        http_timeout_ms = config.http_timeout_ms,
        "providers configured"
    );

    let cache: Arc<dyn MeasurementCache> = Arc::new(MemoryCache::new(config.cache_ttl()));
    Ok(Arc::new(WeatherLookup::new(
        cache,
        providers,
        LookupSettings::from(config),
    )))
}

fn run_configure(config: Option<PathBuf>, provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let path = config_path(config)?;
    // File values only: environment overrides must not be persisted.
    let mut config = Config::read_from(&path)?;

    let api_key = Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        anyhow::bail!("API key for '{id}' must not be empty");
    }

    let prefer = Confirm::new(&format!("Try {id} before other providers?"))
        .with_default(false)
        .prompt()
        .context("Failed to read provider preference")?;

    config.upsert_provider_api_key(id, api_key);
    if prefer {
        config.prefer_provider(id);
    }
    config.save_to(&path)?;

    println!("Saved credentials for {id} to {}", path.display());
    Ok(())
}
