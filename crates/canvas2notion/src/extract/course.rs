//! Course code lookup from the page breadcrumbs.

use super::cache::SelectorCache;
use super::config::ExtractionConfig;
use scraper::Html;
use tracing::debug;

/// Code used when the breadcrumb selector does not match.
pub const UNKNOWN_COURSE_CODE: &str = "Unknown Course Code";

/// Reads the course code from the configured breadcrumb position and applies
/// any user override.
///
/// A missing breadcrumb is reported through `cache` and yields
/// [`UNKNOWN_COURSE_CODE`]; overrides are applied to the sentinel too.
pub fn resolve_course_code(
    document: &Html,
    config: &ExtractionConfig,
    cache: &mut SelectorCache,
) -> String {
    let selector = config.course_code_selector();
    let raw_code = cache
        .resolve(document.root_element(), &selector, true)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_else(|| UNKNOWN_COURSE_CODE.to_string());

    match config.course_code_overrides.get(&raw_code) {
        Some(code) => {
            debug!(raw = %raw_code, code = %code, "Applied course code override");
            code.clone()
        }
        None => raw_code,
    }
}

/// Icon configured for a resolved (override-applied) course code.
pub fn course_icon(code: &str, config: &ExtractionConfig) -> Option<String> {
    config.course_icons.get(code).cloned()
}
