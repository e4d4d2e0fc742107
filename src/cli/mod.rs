pub mod category;
pub mod migrate;
pub mod serve;
pub mod tags;
pub mod user;

use crate::{Config, Database};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "courseboard")]
#[command(version)]
#[command(about = "Course forum extensions: assignment tags, anonymous posts, topic resolution", long_about = None)]
pub struct Cli {
    #[arg(short, long, default_value = "courseboard.toml", env = "COURSEBOARD_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    Serve {
        #[arg(short = 'H', long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    Migrate,
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    Category {
        #[command(subcommand)]
        command: CategoryCommand,
    },
    Tags {
        #[command(subcommand)]
        command: TagsCommand,
    },
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Create a user and print its API token
    Add {
        #[arg(long)]
        username: String,
        #[arg(long)]
        displayname: Option<String>,
        #[arg(long = "group")]
        groups: Vec<String>,
    },
    List,
}

#[derive(Subcommand)]
pub enum CategoryCommand {
    Add {
        #[arg(long)]
        name: String,
    },
    /// Make a user moderator of a category
    Moderator {
        #[arg(long)]
        cid: i64,
        #[arg(long)]
        uid: i64,
    },
}

#[derive(Subcommand)]
pub enum TagsCommand {
    List,
}

/// Loads the config file, falling back to defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        return Config::load(path);
    }
    tracing::warn!(
        "Config file '{}' not found, using defaults",
        path.display()
    );
    let config = Config::default();
    config.validate()?;
    Ok(config)
}

/// Opens and migrates the configured database.
pub fn open_database(config: &Config) -> Result<Database> {
    let db = Database::open_with_pool_size(&config.database.path, config.database.pool_size)?;
    db.migrate()?;
    Ok(db)
}
