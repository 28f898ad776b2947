// src/main.rs
use anyhow::{bail, Context};
use dotenvy::dotenv;
use quotewatch::config::AppConfig;
use quotewatch::connectors::backoff::BackoffPolicy;
use quotewatch::connectors::gateway::{GatewayClient, GatewayError};
use quotewatch::connectors::messages::{ALERTS_TOPIC, PRICES_TOPIC};
use quotewatch::connectors::subscription::SubscriptionManager;
use quotewatch::connectors::traits::GatewayAcker;
use quotewatch::core::{Dashboard, StreamStateEngine};
use quotewatch::session::SessionStore;
use quotewatch::tui::{self, ExitAction};
use quotewatch::types::Symbol;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // 1. Load Configuration
    let config = AppConfig::new().context("failed to load configuration")?;

    // 2. Set Up Logging (file only, the terminal belongs to the TUI)
    let _log_guard = init_tracing(&config);

    println!("========================================");
    println!("        QUOTEWATCH DASHBOARD");
    println!("========================================");
    println!("Gateway: {}", config.gateway_url);
    println!("Stream:  {}", config.stream_url);
    println!("========================================");

    // 3. Restore or Establish the Session
    let session = SessionStore::load(&config.session_file).await;
    let gateway = GatewayClient::new(&config.gateway_url);
    let (username, symbols) = bootstrap(&gateway, &session, &config).await?;
    println!("Signed in as 👤 {} ({} symbols)", username, symbols.len());

    // 4. Build the View Model
    let mut dashboard = Dashboard::new(
        &config.tracked_symbol,
        config.chart_capacity,
        config.alert_capacity,
        config.flash_decay(),
    );
    dashboard.set_username(&username);
    dashboard.seed_catalog(symbols);

    // 5. Wire the Stream
    let backoff = BackoffPolicy::new(config.backoff_config());
    let scope = session.connection_scope().await;
    let mut manager = SubscriptionManager::new(
        config.stream_url.clone(),
        vec![PRICES_TOPIC.to_string(), ALERTS_TOPIC.to_string()],
        backoff,
        scope,
    );
    let events = manager
        .take_events()
        .context("event stream already taken")?;
    let connection = manager.state();

    // 6. Run Engine + TUI
    let (command_tx, command_rx) = mpsc::channel(32);
    let acker = Box::new(GatewayAcker::new(gateway.clone(), session.clone()));
    let (engine, snapshots) =
        StreamStateEngine::new(dashboard, events, command_rx, connection, acker);

    manager.connect();
    let engine_task = tokio::spawn(engine.run());

    let action = tui::run(snapshots, command_tx).await?;

    // 7. Tear Down
    manager.disconnect().await;
    if action == ExitAction::Logout {
        session.clear().await;
        println!("Logged out.");
    }
    engine_task.await.context("engine task failed")??;

    Ok(())
}

/// Resolves a usable token and the symbol catalog. A stored token that
/// the gateway rejects gets one fresh login before giving up.
async fn bootstrap(
    gateway: &GatewayClient,
    session: &SessionStore,
    config: &AppConfig,
) -> anyhow::Result<(String, Vec<Symbol>)> {
    let (token, username) = match (session.token().await, session.username().await) {
        (Some(token), Some(username)) => {
            println!("Resuming session for {}", username);
            (token, username)
        }
        _ => login(gateway, session, config).await?,
    };

    match gateway.fetch_symbols(&token).await {
        Ok(symbols) => Ok((username, symbols)),
        Err(GatewayError::Unauthorized) if config.has_credentials() => {
            warn!("Stored token rejected, logging in again");
            session.clear().await;
            let (token, username) = login(gateway, session, config).await?;
            let symbols = gateway
                .fetch_symbols(&token)
                .await
                .context("failed to load symbol catalog")?;
            Ok((username, symbols))
        }
        Err(e) => Err(e).context("failed to load symbol catalog"),
    }
}

async fn login(
    gateway: &GatewayClient,
    session: &SessionStore,
    config: &AppConfig,
) -> anyhow::Result<(String, String)> {
    if !config.has_credentials() {
        bail!(
            "no stored session and no credentials configured \
             (set QUOTEWATCH_USERNAME / QUOTEWATCH_PASSWORD)"
        );
    }
    let response = gateway
        .login(&config.username, &config.password)
        .await
        .context("login failed")?;
    session.store(&response.token, &response.username).await;
    Ok((response.token, response.username))
}

fn init_tracing(config: &AppConfig) -> tracing_appender::non_blocking::WorkerGuard {
    let path = Path::new(&config.log_file);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file = path
        .file_name()
        .map(|f| f.to_os_string())
        .unwrap_or_else(|| "quotewatch.log".into());

    let appender = tracing_appender::rolling::never(dir, file);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    guard
}
