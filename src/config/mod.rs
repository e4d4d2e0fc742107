use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub forum: ForumConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            pool_size: default_pool_size(),
        }
    }
}

/// Which tag store implementation backs the assignment tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Relational,
    #[serde(alias = "kv")]
    KeyValue,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relational => write!(f, "relational"),
            Self::KeyValue => write!(f, "keyvalue"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForumConfig {
    /// Members of this group may manage assignment tags.
    #[serde(default = "default_instructor_group")]
    pub instructor_group: String,
    #[serde(default = "default_admin_group")]
    pub admin_group: String,
    #[serde(default = "default_topics_per_page")]
    pub topics_per_page: usize,
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            instructor_group: default_instructor_group(),
            admin_group: default_admin_group(),
            topics_per_page: default_topics_per_page(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4567
}

fn default_database_path() -> String {
    "data/courseboard.db".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_instructor_group() -> String {
    "instructors".to_string()
}

fn default_admin_group() -> String {
    "administrators".to_string()
}

fn default_topics_per_page() -> usize {
    20
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!(
                "Could not read config file '{}': {}",
                path.display(),
                e
            )
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.forum.topics_per_page == 0 {
            anyhow::bail!("forum.topics_per_page must be greater than 0");
        }
        if self.forum.topics_per_page > 100 {
            anyhow::bail!("forum.topics_per_page must be 100 or less");
        }
        if self.forum.instructor_group.trim().is_empty() {
            anyhow::bail!("forum.instructor_group cannot be empty");
        }
        if self.forum.admin_group.trim().is_empty() {
            anyhow::bail!("forum.admin_group cannot be empty");
        }
        if self.database.pool_size == 0 {
            anyhow::bail!("database.pool_size must be greater than 0");
        }
        Ok(())
    }
}
