#![allow(dead_code)]

use chatrelay::config::ClientConfig;
use chatrelay::providers::{ProviderAdapter, ProviderRegistry};
use chatrelay::relay::{build_router, HttpOptions, RelayServer};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Starts a relay on an ephemeral loopback port and returns its base URL.
pub async fn spawn_relay(adapters: Vec<Arc<dyn ProviderAdapter>>) -> String {
    spawn_relay_with(adapters, HttpOptions::default()).await
}

pub async fn spawn_relay_with(
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    options: HttpOptions,
) -> String {
    let registry = adapters
        .into_iter()
        .fold(ProviderRegistry::new(), |registry, adapter| {
            registry.with_adapter(adapter)
        });
    let server = RelayServer::bind(
        SocketAddr::from(([127, 0, 0, 1], 0)),
        build_router(registry, &options),
    )
    .await
    .expect("bind relay");
    let addr = server.local_addr().expect("relay address");
    tokio::spawn(server.run());
    format!("http://{addr}")
}

pub fn client_config(relay_url: &str) -> ClientConfig {
    ClientConfig {
        relay_url: relay_url.to_string(),
        ..ClientConfig::default()
    }
}

/// Polls `flag` until set or `limit` passes.
pub async fn wait_for_flag(flag: &AtomicBool, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if flag.load(Ordering::SeqCst) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    flag.load(Ordering::SeqCst)
}
