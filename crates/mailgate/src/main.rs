//! mailgate server entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use mailgate::state::spawn_session_purge;
use mailgate::wizard::Autoconfig;
use mailgate::{AppState, Config, ImapConnector, router};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailgate=info,mailgate_core=info,mailgate_imap=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("loading configuration")?;
    info!(
        bind = %config.bind,
        upload_dir = %config.upload_dir.display(),
        session_ttl = ?config.session_ttl,
        "starting mailgate"
    );

    let autoconfig = Autoconfig::new(config.autoconfig_url.clone())?;
    let connector = ImapConnector::new(config.connect);
    let bind = config.bind;
    let state = Arc::new(AppState::new(config, connector, autoconfig));
    spawn_session_purge(&state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!("listening on http://{bind}");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("mailgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut signal) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            signal.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
