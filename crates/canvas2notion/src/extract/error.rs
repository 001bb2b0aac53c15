//! Error and diagnostic types for the assignment extraction subsystem.

use serde::Serialize;
use thiserror::Error;

/// Errors that abort a run before or after extraction.
///
/// Nothing that happens while reading the page is an error; those outcomes are
/// reported as [`Diagnostic`]s instead.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Persisted storage could not be read or written
    #[error("Storage error: {0}")]
    Store(#[from] crate::db::StoreError),

    /// The page could not be downloaded
    #[error("Fetch error: {message}")]
    Fetch { message: String },

    /// The page URL could not be parsed
    #[error("URL error: {message}")]
    UrlError { message: String },

    /// Valid records disagreed on their course, so they cannot share one store key
    #[error("Assignments span more than one course: expected {expected}, found {found}")]
    MixedCourses { expected: String, found: String },
}

impl From<reqwest::Error> for ExtractError {
    fn from(err: reqwest::Error) -> Self {
        ExtractError::Fetch {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for ExtractError {
    fn from(err: url::ParseError) -> Self {
        ExtractError::UrlError {
            message: err.to_string(),
        }
    }
}

/// Why a built record was excluded from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    MissingTitle,
    MissingUrl,
    MissingDueDate,
    UnparseableDueDate,
    PastDue,
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            InvalidReason::MissingTitle => "missing title",
            InvalidReason::MissingUrl => "missing url",
            InvalidReason::MissingDueDate => "missing due date",
            InvalidReason::UnparseableDueDate => "unparseable due date",
            InvalidReason::PastDue => "due date is not in the future",
        };
        f.write_str(text)
    }
}

/// What was wrong with a rejected option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigProblem {
    /// Not a JSON object of strings
    InvalidJson,
    /// Not an IANA time zone name
    UnknownTimezone,
}

/// Structured events produced during a run.
///
/// Components never talk to the user directly. They push diagnostics and the
/// boundary in [`crate::notify`] decides how to render them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// An option could not be used and its default was substituted
    ConfigurationError {
        option: String,
        raw: String,
        problem: ConfigProblem,
    },
    /// A configured selector failed to match (reported once per run)
    SelectorError { selector: String },
    /// A fragment produced a record that will not be persisted
    RecordInvalid {
        index: usize,
        reasons: Vec<InvalidReason>,
    },
    /// The page contained no assignment fragments at all
    NoFragmentsFound,
    /// Fragments were found but none produced a valid record
    NoValidAssignments,
}

impl Diagnostic {
    /// Returns true if this diagnostic should reach the user as a notification.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Diagnostic::RecordInvalid { .. })
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::ConfigurationError {
                option,
                raw,
                problem: ConfigProblem::InvalidJson,
            } => write!(
                f,
                "The configured string for the {option} option is not valid JSON.\n\n\
                 Please verify this is a valid JSON object.\n\n\
                 Current configuration: \n{raw}"
            ),
            Diagnostic::ConfigurationError {
                option,
                raw,
                problem: ConfigProblem::UnknownTimezone,
            } => write!(
                f,
                "The configured {option} option is not a recognized time zone.\n\n\
                 Please use an IANA zone name such as Pacific/Auckland.\n\n\
                 Current configuration: \n{raw}"
            ),
            Diagnostic::SelectorError { selector } => write!(f, "Incorrect selector: {selector}"),
            Diagnostic::RecordInvalid { index, reasons } => {
                let reasons = reasons
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "Assignment #{} is invalid: {reasons}", index + 1)
            }
            Diagnostic::NoFragmentsFound => f.write_str(
                "No Canvas assignments were found on this page.\n\n\
                 Please ensure this is a valid Canvas Course Assignments page.\n\n\
                 If this is a Canvas Assignments page, the configured Canvas Class Names options may be incorrect.",
            ),
            Diagnostic::NoValidAssignments => f.write_str(
                "No valid assignments were found on this page.\n\n\
                 NOTE: Assignments without due dates are treated as invalid.",
            ),
        }
    }
}
