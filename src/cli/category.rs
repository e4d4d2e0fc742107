use super::{load_config, open_database, CategoryCommand};
use crate::services::categories;
use anyhow::Result;
use std::path::Path;

pub async fn run(config_path: &Path, command: CategoryCommand) -> Result<()> {
    let config = load_config(config_path)?;
    let db = open_database(&config)?;

    match command {
        CategoryCommand::Add { name } => {
            let category = categories::create_category(&db, &name)?;
            tracing::info!("Category '{}' created with cid {}", category.name, category.cid);
        }
        CategoryCommand::Moderator { cid, uid } => {
            categories::add_moderator(&db, cid, uid)?;
            tracing::info!("uid {} now moderates category {}", uid, cid);
        }
    }

    Ok(())
}
