/// Storage keys and row types for the key-value store

/// Key holding the course-keyed saved assignments
pub const SAVED_ASSIGNMENTS_KEY: &str = "savedAssignments";

/// Key holding the most recently processed course
pub const SAVED_COURSE_KEY: &str = "savedCourse";

/// Keys written by extraction runs rather than by the user
pub const RESERVED_KEYS: [&str; 2] = [SAVED_ASSIGNMENTS_KEY, SAVED_COURSE_KEY];

#[derive(Debug, Clone)]
pub struct StorageRow {
    pub key: String,
    pub value: String, // JSON string
    pub updated_at: String,
}
