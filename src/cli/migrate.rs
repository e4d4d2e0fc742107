use super::{load_config, open_database};
use anyhow::Result;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    open_database(&config)?;
    tracing::info!("Migrations complete");
    Ok(())
}
