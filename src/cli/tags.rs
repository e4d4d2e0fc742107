use super::{load_config, open_database, TagsCommand};
use crate::services::tag_store::open_tag_store;
use anyhow::Result;
use std::path::Path;

pub async fn run(config_path: &Path, command: TagsCommand) -> Result<()> {
    let config = load_config(config_path)?;
    let db = open_database(&config)?;
    let store = open_tag_store(config.storage.backend, &db);

    match command {
        TagsCommand::List => {
            println!("{:<6} {:<30} {:<9} {}", "ID", "NAME", "COLOR", "CATEGORY");
            println!("{}", "-".repeat(60));
            for tag in store.get_all()? {
                println!(
                    "{:<6} {:<30} {:<9} {}",
                    tag.id,
                    tag.name,
                    tag.color,
                    tag.category.unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}
