//! Extracts assignments from Canvas course pages into a course-keyed store
//! that a Notion export step can consume.

pub mod db;
pub mod extract;
pub mod notify;
pub mod server;
pub mod types;
