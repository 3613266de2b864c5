use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tipbridge::bridge::{ChatNetwork, MessageRouter, WebhookNetwork};
use tipbridge::ledger::{LedgerClient, NemLedgerClient};
use tipbridge::store::{DepositStore, FileBackend, StoreBackend};
use tipbridge::{api, config::Config, TippingEngine};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let ledger: Arc<dyn LedgerClient> = Arc::new(
        NemLedgerClient::new(config.ledger_url.clone(), config.ledger_timeout)
            .context("Failed to create ledger client")?
            .with_history_url(config.ledger_history_url.clone()),
    );

    let backend: Arc<dyn StoreBackend> = Arc::new(
        FileBackend::new(config.store_path.clone())
            .with_lock_timeout(config.store_lock_timeout)
            .with_stale_after(config.store_lock_stale),
    );
    let store = Arc::new(
        DepositStore::open(backend)
            .await
            .with_context(|| format!("Failed to open deposit store {}", config.store_path.display()))?,
    );

    let primary: Arc<dyn ChatNetwork> = Arc::new(
        WebhookNetwork::new(
            "primary",
            config.primary_webhook_url.clone(),
            config.ledger_timeout,
        )
        .context("Failed to create primary network adapter")?,
    );
    let secondary: Arc<dyn ChatNetwork> = Arc::new(
        WebhookNetwork::new(
            "secondary",
            config.secondary_webhook_url.clone(),
            config.ledger_timeout,
        )
        .context("Failed to create secondary network adapter")?,
    );

    let engine = Arc::new(
        TippingEngine::new(ledger, store.clone()).with_settlement_margin(config.settlement_margin),
    );
    let router = Arc::new(MessageRouter::new(
        primary,
        secondary,
        config.channel_mapping.clone(),
        engine,
    ));

    // Create router
    let app = api::create_router(api::AppState::new(router, store));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!(
        "{} bridging {} channel(s), listening on {}",
        config.bot_nickname,
        config.channel_mapping.len(),
        addr
    );

    // Run server
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
