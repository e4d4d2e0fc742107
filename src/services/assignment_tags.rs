use super::privileges::Privileges;
use super::tag_store::TagStore;
use crate::error::{ForumError, ForumResult};
use crate::models::{Caller, CreateTag, Tag, TagWithCount, UpdateTag};
use std::sync::Arc;

/// Authorization layer over the tag store. Administrators and members of the
/// instructor group may change tags; any signed-in user may read them.
#[derive(Clone)]
pub struct AssignmentTagService {
    store: Arc<dyn TagStore>,
    privileges: Arc<dyn Privileges>,
    instructor_group: String,
}

impl AssignmentTagService {
    pub fn new(
        store: Arc<dyn TagStore>,
        privileges: Arc<dyn Privileges>,
        instructor_group: impl Into<String>,
    ) -> Self {
        Self {
            store,
            privileges,
            instructor_group: instructor_group.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn TagStore> {
        &self.store
    }

    pub fn is_instructor_or_admin(&self, caller: &Caller) -> ForumResult<bool> {
        if caller.is_guest() {
            return Ok(false);
        }
        Ok(self.privileges.is_administrator(caller.uid)?
            || self
                .privileges
                .is_group_member(caller.uid, &self.instructor_group)?)
    }

    fn require_editor(&self, caller: &Caller) -> ForumResult<()> {
        if self.is_instructor_or_admin(caller)? {
            Ok(())
        } else {
            Err(ForumError::Forbidden)
        }
    }

    fn require_signed_in(caller: &Caller) -> ForumResult<()> {
        if caller.is_guest() {
            Err(ForumError::Unauthenticated)
        } else {
            Ok(())
        }
    }

    fn require_id(id: i64, what: &str) -> ForumResult<i64> {
        if id > 0 {
            Ok(id)
        } else {
            Err(ForumError::invalid(format!("{} must be a positive id", what)))
        }
    }

    pub fn create(&self, caller: &Caller, data: &CreateTag) -> ForumResult<Tag> {
        self.require_editor(caller)?;
        let name = data
            .name
            .as_deref()
            .ok_or_else(|| ForumError::invalid("name is required"))?;
        let tag = self
            .store
            .create(name, data.color.as_deref(), data.category.as_deref())?;
        tracing::info!("uid {} created assignment tag {} ({})", caller.uid, tag.id, tag.name);
        Ok(tag)
    }

    pub fn list(&self, caller: &Caller) -> ForumResult<Vec<Tag>> {
        Self::require_signed_in(caller)?;
        self.store.get_all()
    }

    pub fn get(&self, caller: &Caller, id: i64) -> ForumResult<Tag> {
        Self::require_signed_in(caller)?;
        let id = Self::require_id(id, "tag id")?;
        self.store.get(id)?.ok_or(ForumError::NotFound("tag"))
    }

    pub fn update(&self, caller: &Caller, id: i64, changes: &UpdateTag) -> ForumResult<Tag> {
        self.require_editor(caller)?;
        let id = Self::require_id(id, "tag id")?;
        let tag = self.store.update(id, changes)?;
        tracing::info!("uid {} updated assignment tag {}", caller.uid, id);
        Ok(tag)
    }

    pub fn delete(&self, caller: &Caller, id: i64) -> ForumResult<Tag> {
        self.require_editor(caller)?;
        let id = Self::require_id(id, "tag id")?;
        let tag = self.store.delete(id)?;
        tracing::info!("uid {} deleted assignment tag {} ({})", caller.uid, id, tag.name);
        Ok(tag)
    }

    /// Returns the post's tags after the change.
    pub fn add_to_post(&self, caller: &Caller, pid: i64, tag_id: i64) -> ForumResult<Vec<Tag>> {
        self.require_editor(caller)?;
        let pid = Self::require_id(pid, "post id")?;
        let tag_id = Self::require_id(tag_id, "tag id")?;
        self.store.add_to_post(pid, tag_id)?;
        self.store.get_post_tags(pid)
    }

    pub fn remove_from_post(&self, caller: &Caller, pid: i64, tag_id: i64) -> ForumResult<Vec<Tag>> {
        self.require_editor(caller)?;
        let pid = Self::require_id(pid, "post id")?;
        let tag_id = Self::require_id(tag_id, "tag id")?;
        self.store.remove_from_post(pid, tag_id)?;
        self.store.get_post_tags(pid)
    }

    pub fn set_post_tags(&self, caller: &Caller, pid: i64, tag_ids: Option<&[i64]>) -> ForumResult<Vec<Tag>> {
        self.require_editor(caller)?;
        let pid = Self::require_id(pid, "post id")?;
        let tag_ids = tag_ids.ok_or_else(|| ForumError::invalid("tagIds must be an array"))?;
        self.store.set_post_tags(pid, tag_ids)?;
        self.store.get_post_tags(pid)
    }

    pub fn get_post_tags(&self, caller: &Caller, pid: i64) -> ForumResult<Vec<Tag>> {
        Self::require_signed_in(caller)?;
        let pid = Self::require_id(pid, "post id")?;
        self.store.get_post_tags(pid)
    }

    pub fn get_tag_posts(&self, caller: &Caller, id: i64) -> ForumResult<Vec<i64>> {
        Self::require_signed_in(caller)?;
        let id = Self::require_id(id, "tag id")?;
        self.store.get_tag_posts(id)
    }

    /// Tags with post counts for the admin overview.
    pub fn usage(&self, caller: &Caller) -> ForumResult<Vec<TagWithCount>> {
        self.require_editor(caller)?;
        self.store.tag_usage()
    }
}
