use anyhow::Result;

use affinity::config::{Config, StorageBackend};
use affinity::server;

pub fn execute(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if config.storage.backend == StorageBackend::Memory {
        tracing::warn!("memory backend: items and reactions are lost on exit");
    }

    let service = super::open_service(&config)?;
    server::run(service, &config.server)
}
