use crate::services::assignment_tags::AssignmentTagService;
use crate::services::privileges::{Privileges, SqlPrivileges};
use crate::services::tag_store::open_tag_store;
use crate::services::topics::TopicService;
use crate::{Config, Database};
use anyhow::Result;
use std::sync::Arc;
use tera::Tera;

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub tags: AssignmentTagService,
    pub topics: TopicService,
    pub templates: Tera,
}

impl AppState {
    /// Wires the services for the configured storage backend. The database
    /// must already be migrated.
    pub fn new(config: Config, db: Database) -> Result<Self> {
        if !db.has_table("assignment_tags")? || !db.has_table("kv_zsets")? {
            anyhow::bail!("Database schema is missing; run `courseboard migrate` first");
        }

        let privileges: Arc<dyn Privileges> = Arc::new(SqlPrivileges::new(db.clone(), &config.forum));
        let store = open_tag_store(config.storage.backend, &db);

        let tags = AssignmentTagService::new(
            store.clone(),
            privileges.clone(),
            config.forum.instructor_group.clone(),
        );
        let topics = TopicService::new(db.clone(), store, privileges, config.forum.topics_per_page);

        let mut templates = Tera::default();
        templates.add_raw_templates(vec![(
            "admin/assignment-tags.html",
            include_str!("../../templates/admin/assignment-tags.html"),
        )])?;

        Ok(Self {
            config,
            db,
            tags,
            topics,
            templates,
        })
    }
}
