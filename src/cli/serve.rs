use super::{load_config, open_database};
use crate::web;
use anyhow::Result;
use std::path::Path;

pub async fn run(config_path: &Path, host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = load_config(config_path)?;
    let db = open_database(&config)?;

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", host, port);
    tracing::info!(
        "Starting server at http://{} ({} tag storage)",
        addr,
        config.storage.backend
    );

    web::serve(config, db, &addr).await?;

    Ok(())
}
