//! drip binary: wire settings, session manager, dispatcher, and the HTTP
//! control surface together, then run until ctrl-c.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use drip_core::logging::init_tracing;
use drip_core::retry::RetryConfig;
use drip_dispatch::{Dispatcher, FailurePolicy};
use drip_server::{AppState, ServerConfig};
use drip_session::gateway::GatewayTransport;
use drip_session::{CredentialStore, SessionManager};
use drip_settings::{FailurePolicySetting, get_settings, init_settings};

/// Paced message sender over a persistent platform session.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Settings file (default: ~/.drip/settings.json).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Override the control-surface port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let settings = match &args.settings {
        Some(path) => drip_settings::load_settings_from_path(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => drip_settings::load_settings().context("loading settings")?,
    };
    init_settings(settings);
    let settings = get_settings();

    let store_dir = expand_tilde(&settings.session.store_dir);
    let store = CredentialStore::open(&store_dir, &settings.session.account)
        .with_context(|| format!("opening credential store at {}", store_dir.display()))?;

    let transport = GatewayTransport::new(settings.transport.gateway_url.clone());
    let retry = RetryConfig {
        base_delay_ms: settings.reconnect.base_delay_ms,
        max_delay_ms: settings.reconnect.max_delay_ms,
        max_attempts: settings.reconnect.max_attempts,
    };
    let manager = Arc::new(SessionManager::new(Arc::new(transport), store, retry));

    let shutdown = CancellationToken::new();
    let session_task = tokio::spawn({
        let manager = Arc::clone(&manager);
        let shutdown = shutdown.clone();
        async move { manager.run(shutdown).await }
    });

    let policy = match settings.dispatch.failure_policy {
        FailurePolicySetting::LogAndContinue => FailurePolicy::LogAndContinue,
        FailurePolicySetting::Abort => FailurePolicy::Abort,
        FailurePolicySetting::Retry => FailurePolicy::Retry {
            max: settings.dispatch.retry_attempts,
        },
    };
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&manager),
        Duration::from_millis(settings.dispatch.min_delay_ms),
        policy,
    ));

    let metrics = drip_server::metrics::install_recorder();
    let port = args.port.unwrap_or(settings.server.port);
    let server = drip_server::start(
        ServerConfig { port },
        AppState {
            manager,
            dispatcher,
            metrics,
        },
        shutdown.clone(),
    )
    .await
    .with_context(|| format!("binding control surface on port {port}"))?;

    info!(port = server.port, "drip ready");

    tokio::signal::ctrl_c()
        .await
        .context("listening for ctrl-c")?;
    info!("shutting down");
    shutdown.cancel();

    match session_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "session manager ended with a store failure"),
        Err(e) => error!(error = %e, "session manager task panicked"),
    }
    Ok(())
}

/// Expand a leading `~` to `$HOME`.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}
