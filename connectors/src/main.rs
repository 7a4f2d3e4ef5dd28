use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tether::config::{load_config, AuthScheme, TetherConfig};
use tether::credentials::{MasterKey, MASTER_KEY_ENV};
use tether_connectors::{FetchWindow, LimitlessClient, Stack, WhoopClient, WhoopDataType};
use tracing::info;

/// Largest fetch window accepted on the command line.
const MAX_WINDOW_DAYS: i64 = 3650;

/// Tether - authenticated access to WHOOP and Limitless.
#[derive(Parser, Debug)]
#[command(name = "tether", version, about, long_about = None)]
struct Cli {
    /// Optional TOML configuration file
    #[arg(long, env = "TETHER_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch records and print them as JSON lines.
    Fetch {
        #[command(subcommand)]
        source: Source,
    },

    /// Store a static API key for a key-based provider.
    SetKey { provider: String, key: String },

    /// Exchange an OAuth authorization code and store the tokens.
    Exchange {
        provider: String,
        code: String,
        redirect_uri: String,
    },

    /// List configured providers and whether credentials are stored.
    Providers,
}

#[derive(Subcommand, Debug)]
enum Source {
    /// WHOOP metrics: recovery, sleep, strain or hrv.
    Whoop {
        data_type: WhoopDataType,
        #[arg(default_value_t = 7, value_parser = clap::value_parser!(u32).range(..=MAX_WINDOW_DAYS))]
        days: u32,
    },

    /// Limitless lifelogs.
    Limitless {
        #[arg(default_value_t = 1, value_parser = clap::value_parser!(u32).range(..=MAX_WINDOW_DAYS))]
        days: u32,
        #[arg(long, default_value_t = 5)]
        max_pages: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tether=info,tether_connectors=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path).context("Failed to load configuration")?,
        None => TetherConfig::default(),
    };
    config.apply_env();

    let key = MasterKey::from_env()
        .with_context(|| format!("{MASTER_KEY_ENV} is required (base64-encoded 32-byte key)"))?;
    let stack = Stack::open(&config, key).context("Failed to initialize credential store")?;

    match cli.command {
        Command::Fetch { source } => fetch(&stack, source).await,
        Command::SetKey { provider, key } => {
            let provider_config = stack.providers.get(&provider)?;
            if provider_config.is_oauth() {
                anyhow::bail!("provider '{provider}' uses OAuth; use `exchange` instead");
            }
            stack.store.store_api_key(&provider, &key)?;
            info!(provider = %provider, "API key stored");
            Ok(())
        }
        Command::Exchange {
            provider,
            code,
            redirect_uri,
        } => {
            let credentials = stack
                .tokens
                .exchange_code(&provider, &code, &redirect_uri)
                .await
                .context("Authorization code exchange failed")?;
            print_line(&serde_json::json!({
                "provider": provider,
                "expires_at": credentials.expires_at,
                "has_refresh_token": credentials.refresh_token.is_some(),
            }))
        }
        Command::Providers => {
            let stored = stack.store.list_providers()?;
            for name in stack.providers.names() {
                let provider = stack.providers.get(name)?;
                let auth = match provider.auth {
                    AuthScheme::OAuth2 { .. } => "oauth2",
                    AuthScheme::ApiKey { .. } => "api_key",
                };
                print_line(&serde_json::json!({
                    "provider": name,
                    "base_url": provider.base_url,
                    "auth": auth,
                    "has_credentials": stored.iter().any(|p| p == name),
                }))?;
            }
            Ok(())
        }
    }
}

async fn fetch(stack: &Stack, source: Source) -> Result<()> {
    match source {
        Source::Whoop { data_type, days } => {
            let window = FetchWindow::last_days(days, Utc::now())?;
            let metrics = WhoopClient::new(stack.executor.clone())
                .metrics(data_type, &window)
                .await
                .with_context(|| format!("Failed to fetch WHOOP {data_type}"))?;
            for metric in &metrics {
                print_line(metric)?;
            }
        }
        Source::Limitless { days, max_pages } => {
            let window = FetchWindow::last_days(days, Utc::now())?;
            let events = LimitlessClient::new(stack.executor.clone())
                .lifelogs(&window, max_pages)
                .await
                .context("Failed to fetch Limitless lifelogs")?;
            for event in &events {
                print_line(event)?;
            }
        }
    }
    Ok(())
}

fn print_line<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
