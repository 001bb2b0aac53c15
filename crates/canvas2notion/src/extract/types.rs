/// Types for extracted assignment data
use super::error::{Diagnostic, InvalidReason};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A finished assignment, in the shape persisted and consumed by the export step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub name: String,
    /// Course code, prefixed with the course icon and a space when one is configured
    pub course: String,
    pub icon: Option<String>,
    pub url: String,
    /// ISO-8601 instant; empty only on records that were never valid
    pub available: String,
    /// ISO-8601 instant; empty when the record is invalid
    pub due: String,
}

/// A record together with the outcome of its validity checks.
///
/// Validity is kept out of [`AssignmentRecord`] so that persisted data never
/// carries it; callers must filter with [`BuiltAssignment::is_valid`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltAssignment {
    pub record: AssignmentRecord,
    pub(crate) invalid: Vec<InvalidReason>,
}

impl BuiltAssignment {
    /// Returns true if name, url and due are all present and due is in the future.
    pub fn is_valid(&self) -> bool {
        self.invalid.is_empty()
    }

    /// Reasons this record was rejected, in the order they were detected.
    pub fn invalid_reasons(&self) -> &[InvalidReason] {
        &self.invalid
    }

    pub fn into_record(self) -> AssignmentRecord {
        self.record
    }
}

/// Saved assignments keyed by (possibly icon-prefixed) course.
pub type SavedAssignments = BTreeMap<String, Vec<AssignmentRecord>>;

/// Everything a single pass over a page produced.
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub run_id: String,
    /// Resolved course code before icon prefixing
    pub course_code: String,
    pub icon: Option<String>,
    /// One entry per fragment, in document order, invalid ones included
    pub built: Vec<BuiltAssignment>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ExtractionReport {
    /// The store key for this page's course.
    pub fn course_key(&self) -> String {
        prefixed_course(&self.course_code, self.icon.as_deref())
    }

    pub fn valid_count(&self) -> usize {
        self.built.iter().filter(|b| b.is_valid()).count()
    }
}

/// Result of merging a run into the saved store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// `course` was replaced with `count` records and marked most recent
    Saved { course: String, count: usize },
    /// Fragments existed but none were valid; the recent-course marker was cleared
    NoValidAssignments,
    /// Nothing matched the assignment selector; no write happens
    NoAssignmentsFound,
}

/// Joins an icon and a course code the way the store keys them.
pub fn prefixed_course(code: &str, icon: Option<&str>) -> String {
    match icon {
        Some(icon) => format!("{icon} {code}"),
        None => code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_course() {
        assert_eq!(prefixed_course("COMP301", Some("📘")), "📘 COMP301");
        assert_eq!(prefixed_course("COMP301", None), "COMP301");
    }

    #[test]
    fn test_record_serializes_null_icon() {
        let record = AssignmentRecord {
            name: "Lab 1".to_string(),
            course: "CS101".to_string(),
            icon: None,
            url: "https://canvas.example/courses/1/assignments/2".to_string(),
            available: "2030-01-01T00:00:00.000Z".to_string(),
            due: "2030-01-02T00:00:00.000Z".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["icon"].is_null());
        assert_eq!(json["course"], "CS101");
    }
}
