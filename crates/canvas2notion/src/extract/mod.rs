//! Assignment extraction from Canvas assignment pages.
//!
//! A run resolves options into an [`ExtractionConfig`], discovers assignment
//! fragments, builds one record per fragment and merges the valid ones into
//! the saved store. Problems the user should hear about are collected as
//! [`Diagnostic`]s and rendered by [`crate::notify`].

mod cache;
mod config;
mod course;
mod date;
mod error;
mod fetch;
mod merge;
mod record;
mod types;

pub use cache::SelectorCache;
pub use config::{defaults, keys, ClassNames, ExtractionConfig, OptionsSnapshot};
pub use course::{course_icon, resolve_course_code, UNKNOWN_COURSE_CODE};
pub use date::{next_round_hour, to_iso_string, DateNormalizer};
pub use error::{ConfigProblem, Diagnostic, ExtractError, InvalidReason};
pub use fetch::{fetch_page, FetchConfig};
pub use merge::AssignmentStore;
pub use record::RecordBuilder;
pub use types::*;

use crate::db::Store;
use chrono::{DateTime, Utc};
use rand::Rng;
use scraper::Html;
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

/// Outcome of a full run against the store.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub course: String,
    pub fragments: usize,
    pub valid: usize,
    pub outcome: MergeOutcome,
    pub diagnostics: Vec<Diagnostic>,
}

/// Extracts every assignment fragment from `document`.
///
/// Pure with respect to storage: nothing is persisted. Records are returned in
/// document order, invalid ones included.
pub fn parse_assignments(
    document: &Html,
    page_url: Option<&Url>,
    config: &ExtractionConfig,
    now: DateTime<Utc>,
) -> ExtractionReport {
    let run_id = generate_run_id();
    let mut cache = SelectorCache::new();
    let mut diagnostics = Vec::new();

    let fragments = cache.select_all(document, &config.assignment_selector());
    info!(
        run_id = %run_id,
        fragments = fragments.len(),
        "Discovered assignment fragments"
    );

    if fragments.is_empty() {
        diagnostics.extend(cache.take_diagnostics());
        diagnostics.push(Diagnostic::NoFragmentsFound);
        return ExtractionReport {
            run_id,
            course_code: String::new(),
            icon: None,
            built: Vec::new(),
            diagnostics,
        };
    }

    let course_code = resolve_course_code(document, config, &mut cache);
    let icon = course_icon(&course_code, config);
    let dates = DateNormalizer::new(config.timezone, now);
    let builder = RecordBuilder::new(config, dates, &course_code, icon.clone(), page_url);

    let built: Vec<BuiltAssignment> = fragments
        .into_iter()
        .map(|fragment| builder.build(fragment, &mut cache))
        .collect();

    diagnostics.extend(cache.take_diagnostics());
    diagnostics.extend(built.iter().enumerate().filter(|(_, b)| !b.is_valid()).map(
        |(index, b)| Diagnostic::RecordInvalid {
            index,
            reasons: b.invalid_reasons().to_vec(),
        },
    ));

    let mut report = ExtractionReport {
        run_id,
        course_code,
        icon,
        built,
        diagnostics,
    };

    if report.valid_count() == 0 {
        warn!(run_id = %report.run_id, "No valid assignments on page");
        report.diagnostics.push(Diagnostic::NoValidAssignments);
        return report;
    }

    info!(
        run_id = %report.run_id,
        course = %report.course_key(),
        valid = report.valid_count(),
        total = report.built.len(),
        "Extracted assignments"
    );
    report
}

/// Runs extraction on `html` and merges the result into `store`.
///
/// Options are read once at the start. The merge runs inside a single store
/// transaction, so concurrent runs for different courses both survive.
/// Nothing is written when the page has no fragments.
pub fn process_page(
    store: &Store,
    html: &str,
    page_url: Option<&Url>,
    now: DateTime<Utc>,
) -> Result<RunSummary, ExtractError> {
    let (config, mut diagnostics) = ExtractionConfig::resolve(&store.options()?);

    let document = Html::parse_document(html);
    let report = parse_assignments(&document, page_url, &config, now);

    let run_id = report.run_id.clone();
    let course = report.course_key();
    let fragments = report.built.len();
    let valid = report.valid_count();
    diagnostics.extend(report.diagnostics);

    let outcome = store.update_assignments(|saved| saved.merge(&course, report.built))?;

    info!(run_id = %run_id, outcome = ?outcome, "Run finished");

    Ok(RunSummary {
        run_id,
        course,
        fragments,
        valid,
        outcome,
        diagnostics,
    })
}

/// Generates a short id used to correlate log lines from one run.
fn generate_run_id() -> String {
    let timestamp = Utc::now().timestamp_micros();
    let random: u32 = rand::thread_rng().gen();
    format!("{:x}-{:08x}", timestamp & 0xFFFF_FFFF, random)
}
