pub mod anonymity;
pub mod assignment_tags;
pub mod categories;
pub mod privileges;
pub mod resolution;
pub mod tag_store;
pub mod topics;
pub mod users;
