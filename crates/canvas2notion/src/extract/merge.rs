//! Merging a run's records into the saved, course-keyed store.

use super::error::ExtractError;
use super::types::{AssignmentRecord, BuiltAssignment, MergeOutcome, SavedAssignments};
use serde::{Deserialize, Serialize};
use tracing::info;

/// The persisted assignment state: saved records plus the most recently
/// processed course, which downstream consumers read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentStore {
    pub assignments: SavedAssignments,
    /// Empty when the last run produced nothing valid
    pub saved_course: String,
}

impl AssignmentStore {
    /// Replaces `course` with the valid records of one run.
    ///
    /// `built` must be every record the run produced, so an empty slice means
    /// the page had no fragments. Invalid records are dropped here. All valid
    /// records must belong to `course`.
    pub fn merge(
        &mut self,
        course: &str,
        built: Vec<BuiltAssignment>,
    ) -> Result<MergeOutcome, ExtractError> {
        if built.is_empty() {
            return Ok(MergeOutcome::NoAssignmentsFound);
        }

        let valid: Vec<AssignmentRecord> = built
            .into_iter()
            .filter(BuiltAssignment::is_valid)
            .map(BuiltAssignment::into_record)
            .collect();

        if let Some(stray) = valid.iter().find(|r| r.course != course) {
            return Err(ExtractError::MixedCourses {
                expected: course.to_string(),
                found: stray.course.clone(),
            });
        }

        if valid.is_empty() {
            self.saved_course.clear();
            return Ok(MergeOutcome::NoValidAssignments);
        }

        let count = valid.len();
        info!(course = %course, count, "Replacing saved assignments for course");
        self.assignments.insert(course.to_string(), valid);
        self.saved_course = course.to_string();

        Ok(MergeOutcome::Saved {
            course: course.to_string(),
            count,
        })
    }
}
