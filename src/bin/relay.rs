use anyhow::Result;
use chatrelay::config::RelayConfig;
use chatrelay::providers::{ProviderRegistry, ScriptedAdapter};
use chatrelay::relay::{build_router, HttpOptions, RelayServer};
use chatrelay::types::ModelId;
use std::sync::Arc;
use std::time::Duration;

const DEMO_FRAME_DELAY: Duration = Duration::from_millis(120);

#[tokio::main]
async fn main() -> Result<()> {
    chatrelay::logging::init();

    let config = RelayConfig::load()?;
    config.validate()?;

    let registry = if std::env::args().skip(1).any(|arg| arg == "--demo") {
        tracing::info!("demo mode: scripted replies, no upstream calls");
        demo_registry()
    } else {
        ProviderRegistry::from_config(&config)?
    };
    if registry.available().is_empty() {
        tracing::warn!("no provider configured, every prompt will be answered with 503");
    }

    let router = build_router(registry, &HttpOptions::from(&config));
    let server = RelayServer::bind(config.bind_addr, router).await?;
    server.run_with_shutdown(shutdown_signal()).await
}

fn demo_registry() -> ProviderRegistry {
    ModelId::ALL
        .into_iter()
        .fold(ProviderRegistry::new(), |registry, model| {
            let adapter = ScriptedAdapter::replying(
                model,
                &["This is ", "a **demo** ", "reply from ", model.display_name(), "."],
            )
            .with_frame_delay(DEMO_FRAME_DELAY);
            registry.with_adapter(Arc::new(adapter))
        })
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "cannot listen for Ctrl+C, running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
