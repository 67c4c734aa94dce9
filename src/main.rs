// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use catalog_sync::{api, CatalogConfig, CatalogEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,catalog_sync=debug")),
        )
        .init();

    let config = CatalogConfig::load().context("loading configuration")?;
    let bind_addr = config.bind_addr.clone();

    let engine = Arc::new(CatalogEngine::connect(config).await?);
    if let Err(e) = engine.start().await {
        error!(error = %e, "Refusing to serve");
        engine.shutdown().await;
        return Err(e.into());
    }

    api::serve(engine.clone(), &bind_addr, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
    })
    .await
    .with_context(|| format!("serving on {bind_addr}"))?;

    engine.shutdown().await;
    Ok(())
}
