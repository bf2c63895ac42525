// Copyright (C) 2025 Courierlink Ltd.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Binary entry point for the console server.

use courierlink_server::{AppState, Config, router};
use courierlink_store::{MemoryStore, PostgresStore, RecordStore};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn RecordStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url).await?;
            info!("connected to Postgres record store");
            Arc::new(store)
        }
        None => {
            warn!("COURIERLINK_DATABASE_URL not set; records will not survive restarts");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(store, config.allow_private_hosts)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "courierlink server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
