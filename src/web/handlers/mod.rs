pub mod admin;
pub mod assignment_tags;
pub mod topics;
