use anyhow::Context;
use buildgate_auth::{OAuthState, open_store};
use buildgate_server::{
    BridgeHandler, BridgeState, Cli, JenkinsAdapter, LocalValidator,
    RemoteIntrospectionValidator, TokenValidator, ToolRegistry, build_app,
};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config()?;
    config.logging.initialize()?;

    let store = open_store(&config.auth.storage)
        .await
        .context("Failed to open token store")?;
    let oauth = OAuthState::new(store, config.auth.clone());

    let validator: Arc<dyn TokenValidator> = match &config.introspection_url {
        Some(url) => {
            info!(url = %url, "Validating tokens against remote introspection endpoint");
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .context("Failed to build introspection client")?;
            Arc::new(RemoteIntrospectionValidator::new(client, url.clone()))
        }
        None => Arc::new(LocalValidator::new(oauth.introspector())),
    };

    let jenkins = JenkinsAdapter::new(config.jenkins.clone())?;
    let registry = ToolRegistry::builder()
        .adapter(Arc::new(jenkins))
        .build()
        .context("Failed to build tool registry")?;
    info!(tools = registry.len(), "Tool registry ready");

    let handler = BridgeHandler::new(Arc::new(registry), config.bridge.tool_timeout)
        .with_instructions("Jenkins automation tools. Use get_build_log to inspect failures.");
    let bridge = BridgeState::new(handler, validator, &config.bridge)?;

    if let Some(interval) = config.purge_interval {
        spawn_purge(oauth.clone(), interval);
    }

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!(
        addr = %config.bind,
        issuer = %config.auth.issuer,
        "buildgate listening"
    );

    axum::serve(listener, build_app(oauth, bridge))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("buildgate stopped");
    Ok(())
}

fn spawn_purge(oauth: OAuthState, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match oauth.store.purge_expired(oauth.now()).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Purged expired OAuth records"),
                Err(e) => error!(error = %e, "Purge of expired OAuth records failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
