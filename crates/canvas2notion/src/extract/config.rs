//! Resolution of persisted options into the configuration for one run.

use super::error::{ConfigProblem, Diagnostic};
use chrono_tz::Tz;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Raw persisted options, keyed by option name, holding JSON values.
pub type OptionsSnapshot = HashMap<String, Value>;

/// Option keys as they are persisted.
pub mod keys {
    pub const TIMEZONE: &str = "timezone";
    pub const BREADCRUMBS: &str = "canvas.classNames.breadcrumbs";
    pub const ASSIGNMENT: &str = "canvas.classNames.assignment";
    pub const TITLE: &str = "canvas.classNames.title";
    pub const AVAILABLE_DATE: &str = "canvas.classNames.availableDate";
    pub const AVAILABLE_STATUS: &str = "canvas.classNames.availableStatus";
    pub const DUE_DATE: &str = "canvas.classNames.dueDate";
    pub const DATE_ELEMENT: &str = "canvas.classNames.dateElement";
    pub const COURSE_CODE_N: &str = "canvas.classValues.courseCodeN";
    pub const NOT_AVAILABLE: &str = "canvas.classValues.notAvailable";
    pub const COURSE_CODE_OVERRIDES: &str = "canvas.courseCodeOverrides";
    pub const COURSE_EMOJIS: &str = "notion.courseEmojis";
}

pub const DEFAULT_TIMEZONE: Tz = Tz::Pacific__Auckland;
pub const DEFAULT_COURSE_CODE_N: u32 = 2;
pub const DEFAULT_NOT_AVAILABLE: &str = "Not available until";

/// Returns every recognized option with its default value.
pub fn defaults() -> Vec<(&'static str, Value)> {
    let names = ClassNames::default();
    vec![
        (keys::TIMEZONE, Value::from(DEFAULT_TIMEZONE.name())),
        (keys::BREADCRUMBS, Value::from(names.breadcrumbs)),
        (keys::ASSIGNMENT, Value::from(names.assignment)),
        (keys::TITLE, Value::from(names.title)),
        (keys::AVAILABLE_DATE, Value::from(names.available_date)),
        (keys::AVAILABLE_STATUS, Value::from(names.available_status)),
        (keys::DUE_DATE, Value::from(names.due_date)),
        (keys::DATE_ELEMENT, Value::from(names.date_element)),
        (keys::COURSE_CODE_N, Value::from(DEFAULT_COURSE_CODE_N)),
        (keys::NOT_AVAILABLE, Value::from(DEFAULT_NOT_AVAILABLE)),
        (keys::COURSE_CODE_OVERRIDES, Value::from("{}")),
        (keys::COURSE_EMOJIS, Value::from("{}")),
    ]
}

/// Structural class names used to locate page elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNames {
    pub breadcrumbs: String,
    pub assignment: String,
    pub title: String,
    pub available_date: String,
    pub available_status: String,
    pub due_date: String,
    /// Screen-reader-only wrapper that holds the full date text
    pub date_element: String,
}

impl Default for ClassNames {
    fn default() -> Self {
        Self {
            breadcrumbs: "ic-app-crumbs".to_string(),
            assignment: "assignment".to_string(),
            title: "ig-title".to_string(),
            available_date: "assignment-date-available".to_string(),
            available_status: "status-description".to_string(),
            due_date: "assignment-date-due".to_string(),
            date_element: "screenreader-only".to_string(),
        }
    }
}

/// Immutable snapshot of everything extraction needs for one run.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub timezone: Tz,
    pub class_names: ClassNames,
    /// 1-indexed breadcrumb position holding the course code
    pub course_code_n: u32,
    /// Status text marking an assignment that is not yet available
    pub not_available_status: String,
    pub course_code_overrides: HashMap<String, String>,
    pub course_icons: HashMap<String, String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE,
            class_names: ClassNames::default(),
            course_code_n: DEFAULT_COURSE_CODE_N,
            not_available_status: DEFAULT_NOT_AVAILABLE.to_string(),
            course_code_overrides: HashMap::new(),
            course_icons: HashMap::new(),
        }
    }
}

impl ExtractionConfig {
    /// Builds a configuration from persisted options, field by field.
    ///
    /// Absent or malformed values fall back to their defaults. Override maps
    /// that fail to parse and unknown time zones are reported as
    /// [`Diagnostic::ConfigurationError`]; resolution itself never fails.
    pub fn resolve(options: &OptionsSnapshot) -> (Self, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let defaults = ClassNames::default();

        let class_names = ClassNames {
            breadcrumbs: read_string(options, keys::BREADCRUMBS, &defaults.breadcrumbs),
            assignment: read_string(options, keys::ASSIGNMENT, &defaults.assignment),
            title: read_string(options, keys::TITLE, &defaults.title),
            available_date: read_string(options, keys::AVAILABLE_DATE, &defaults.available_date),
            available_status: read_string(
                options,
                keys::AVAILABLE_STATUS,
                &defaults.available_status,
            ),
            due_date: read_string(options, keys::DUE_DATE, &defaults.due_date),
            date_element: read_string(options, keys::DATE_ELEMENT, &defaults.date_element),
        };

        let tz_name = read_string(options, keys::TIMEZONE, DEFAULT_TIMEZONE.name());
        let timezone = match tz_name.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                diagnostics.push(Diagnostic::ConfigurationError {
                    option: "Time Zone".to_string(),
                    raw: tz_name,
                    problem: ConfigProblem::UnknownTimezone,
                });
                DEFAULT_TIMEZONE
            }
        };

        let course_code_overrides = read_map(
            options,
            keys::COURSE_CODE_OVERRIDES,
            "Canvas Course Code Overrides",
            &mut diagnostics,
        );
        let course_icons = read_map(
            options,
            keys::COURSE_EMOJIS,
            "Notion Course Emojis",
            &mut diagnostics,
        );

        let config = Self {
            timezone,
            class_names,
            course_code_n: read_position(options, keys::COURSE_CODE_N, DEFAULT_COURSE_CODE_N),
            not_available_status: read_string(options, keys::NOT_AVAILABLE, DEFAULT_NOT_AVAILABLE),
            course_code_overrides,
            course_icons,
        };

        (config, diagnostics)
    }

    pub fn assignment_selector(&self) -> String {
        class_selector(&self.class_names.assignment)
    }

    pub fn title_selector(&self) -> String {
        class_selector(&self.class_names.title)
    }

    pub fn course_code_selector(&self) -> String {
        format!(
            "{} li:nth-of-type({}) span",
            class_selector(&self.class_names.breadcrumbs),
            self.course_code_n
        )
    }

    pub fn available_status_selector(&self) -> String {
        format!(
            "{} {}",
            class_selector(&self.class_names.available_date),
            class_selector(&self.class_names.available_status)
        )
    }

    pub fn available_date_selector(&self) -> String {
        format!(
            "{} {}",
            class_selector(&self.class_names.available_date),
            class_selector(&self.class_names.date_element)
        )
    }

    pub fn due_date_selector(&self) -> String {
        format!(
            "{} {}",
            class_selector(&self.class_names.due_date),
            class_selector(&self.class_names.date_element)
        )
    }
}

fn class_selector(class_name: &str) -> String {
    format!(".{class_name}")
}

fn read_string(options: &OptionsSnapshot, key: &str, default: &str) -> String {
    match options.get(key) {
        None => default.to_string(),
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(other) => {
            warn!(option = key, value = %other, "Ignoring malformed option, using default");
            default.to_string()
        }
    }
}

fn read_position(options: &OptionsSnapshot, key: &str, default: u32) -> u32 {
    let parsed = match options.get(key) {
        None => return default,
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse::<u32>().ok(),
        Some(_) => None,
    };

    match parsed.filter(|&n| n > 0) {
        Some(n) => n,
        None => {
            warn!(option = key, "Ignoring malformed position option, using default");
            default
        }
    }
}

/// Reads a JSON-encoded string map, reporting parse failures once.
fn read_map(
    options: &OptionsSnapshot,
    key: &str,
    label: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> HashMap<String, String> {
    let (parsed, raw) = match options.get(key) {
        None => return HashMap::new(),
        Some(Value::String(text)) => (serde_json::from_str(text), text.clone()),
        Some(value) => (serde_json::from_value(value.clone()), value.to_string()),
    };

    match parsed {
        Ok(map) => map,
        Err(e) => {
            warn!(option = key, error = %e, "Override map is not valid JSON, using empty map");
            diagnostics.push(Diagnostic::ConfigurationError {
                option: label.to_string(),
                raw,
                problem: ConfigProblem::InvalidJson,
            });
            HashMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(entries: &[(&str, Value)]) -> OptionsSnapshot {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_empty_snapshot_uses_defaults() {
        let (config, diagnostics) = ExtractionConfig::resolve(&OptionsSnapshot::new());

        assert!(diagnostics.is_empty());
        assert_eq!(config.timezone, Tz::Pacific__Auckland);
        assert_eq!(config.course_code_n, 2);
        assert_eq!(config.not_available_status, "Not available until");
        assert_eq!(
            config.course_code_selector(),
            ".ic-app-crumbs li:nth-of-type(2) span"
        );
        assert_eq!(
            config.due_date_selector(),
            ".assignment-date-due .screenreader-only"
        );
        assert_eq!(
            config.available_status_selector(),
            ".assignment-date-available .status-description"
        );
    }

    #[test]
    fn test_override_maps_parse_from_json_text() {
        let options = snapshot(&[
            (keys::COURSE_CODE_OVERRIDES, json!(r#"{"1234": "COMP301"}"#)),
            (keys::COURSE_EMOJIS, json!({"COMP301": "📘"})),
        ]);
        let (config, diagnostics) = ExtractionConfig::resolve(&options);

        assert!(diagnostics.is_empty());
        assert_eq!(config.course_code_overrides["1234"], "COMP301");
        assert_eq!(config.course_icons["COMP301"], "📘");
    }

    #[test]
    fn test_malformed_override_map_reports_once_and_is_empty() {
        let options = snapshot(&[(keys::COURSE_CODE_OVERRIDES, json!("{not json"))]);
        let (config, diagnostics) = ExtractionConfig::resolve(&options);

        assert!(config.course_code_overrides.is_empty());
        assert_eq!(
            diagnostics,
            vec![Diagnostic::ConfigurationError {
                option: "Canvas Course Code Overrides".to_string(),
                raw: "{not json".to_string(),
                problem: ConfigProblem::InvalidJson,
            }]
        );
    }

    #[test]
    fn test_malformed_scalars_fall_back_per_field() {
        let options = snapshot(&[
            (keys::COURSE_CODE_N, json!("0")),
            (keys::TITLE, json!(42)),
            (keys::DUE_DATE, json!("due-col")),
        ]);
        let (config, diagnostics) = ExtractionConfig::resolve(&options);

        assert!(diagnostics.is_empty());
        assert_eq!(config.course_code_n, 2);
        assert_eq!(config.class_names.title, "ig-title");
        assert_eq!(config.class_names.due_date, "due-col");
    }

    #[test]
    fn test_course_code_n_accepts_numeric_string() {
        let options = snapshot(&[(keys::COURSE_CODE_N, json!("3"))]);
        let (config, _) = ExtractionConfig::resolve(&options);
        assert_eq!(config.course_code_n, 3);
    }

    #[test]
    fn test_unknown_timezone_is_reported() {
        let options = snapshot(&[(keys::TIMEZONE, json!("Mars/Olympus"))]);
        let (config, diagnostics) = ExtractionConfig::resolve(&options);

        assert_eq!(config.timezone, DEFAULT_TIMEZONE);
        assert_eq!(
            diagnostics,
            vec![Diagnostic::ConfigurationError {
                option: "Time Zone".to_string(),
                raw: "Mars/Olympus".to_string(),
                problem: ConfigProblem::UnknownTimezone,
            }]
        );
        assert!(!diagnostics[0].to_string().contains("JSON"));
    }

    #[test]
    fn test_defaults_cover_every_key() {
        assert_eq!(defaults().len(), 12);
    }
}
