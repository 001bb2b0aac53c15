//! Per-fragment assignment record construction.

use super::cache::SelectorCache;
use super::config::ExtractionConfig;
use super::date::{to_iso_string, DateNormalizer};
use super::error::InvalidReason;
use super::types::{prefixed_course, AssignmentRecord, BuiltAssignment};
use scraper::ElementRef;
use tracing::{debug, warn};
use url::Url;

/// Builds [`AssignmentRecord`]s for every fragment on one page.
///
/// The course is resolved once per run by the caller and shared by every
/// record the builder produces.
pub struct RecordBuilder<'a> {
    config: &'a ExtractionConfig,
    dates: DateNormalizer,
    page_url: Option<&'a Url>,
    course: String,
    icon: Option<String>,
    title_selector: String,
    available_status_selector: String,
    available_date_selector: String,
    due_date_selector: String,
}

impl<'a> RecordBuilder<'a> {
    /// Creates a builder for a page whose resolved course code is `course_code`.
    pub fn new(
        config: &'a ExtractionConfig,
        dates: DateNormalizer,
        course_code: &str,
        icon: Option<String>,
        page_url: Option<&'a Url>,
    ) -> Self {
        Self {
            config,
            dates,
            page_url,
            course: prefixed_course(course_code, icon.as_deref()),
            icon,
            title_selector: config.title_selector(),
            available_status_selector: config.available_status_selector(),
            available_date_selector: config.available_date_selector(),
            due_date_selector: config.due_date_selector(),
        }
    }

    /// Extracts one fragment.
    ///
    /// Every field is computed even after the record is known to be invalid, so
    /// broken selectors are still reported for that fragment.
    pub fn build(&self, fragment: ElementRef<'_>, cache: &mut SelectorCache) -> BuiltAssignment {
        let mut invalid = Vec::new();

        let (name, url) = self.parse_title(fragment, cache, &mut invalid);
        let available = self.parse_available(fragment, cache);
        let due = self.parse_due(fragment, cache, &mut invalid);

        let record = AssignmentRecord {
            name,
            course: self.course.clone(),
            icon: self.icon.clone(),
            url,
            available,
            due,
        };

        if !invalid.is_empty() {
            debug!(name = %record.name, reasons = ?invalid, "Assignment is invalid");
        }

        BuiltAssignment { record, invalid }
    }

    fn parse_title(
        &self,
        fragment: ElementRef<'_>,
        cache: &mut SelectorCache,
        invalid: &mut Vec<InvalidReason>,
    ) -> (String, String) {
        let Some(title) = cache.resolve(fragment, &self.title_selector, true) else {
            invalid.push(InvalidReason::MissingTitle);
            return (String::new(), String::new());
        };

        let name = title.text().collect::<String>().trim().to_string();
        if name.is_empty() {
            invalid.push(InvalidReason::MissingTitle);
            return (String::new(), String::new());
        }

        let url = title
            .value()
            .attr("href")
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(|href| self.absolute_url(href));

        match url {
            Some(url) => (name, url),
            None => {
                invalid.push(InvalidReason::MissingUrl);
                (name, String::new())
            }
        }
    }

    fn absolute_url(&self, href: &str) -> String {
        let resolved = match self.page_url {
            Some(base) => base.join(href),
            None => Url::parse(href),
        };
        resolved
            .map(String::from)
            .unwrap_or_else(|_| href.to_string())
    }

    /// Availability is always set: either the parsed "not available until"
    /// date or the next whole hour, meaning available now.
    fn parse_available(&self, fragment: ElementRef<'_>, cache: &mut SelectorCache) -> String {
        let status = cache
            .resolve(fragment, &self.available_status_selector, false)
            .map(|el| el.text().collect::<String>().trim().to_string());

        if status.as_deref() != Some(self.config.not_available_status.as_str()) {
            return to_iso_string(&self.dates.next_round_hour());
        }

        let text = cache
            .resolve(fragment, &self.available_date_selector, false)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty());

        let instant = match text {
            Some(text) => self.dates.normalize(&text).unwrap_or_else(|| {
                warn!(text = %text, "Could not parse availability date, treating as available now");
                self.dates.next_round_hour()
            }),
            None => self.dates.next_round_hour(),
        };

        to_iso_string(&instant)
    }

    fn parse_due(
        &self,
        fragment: ElementRef<'_>,
        cache: &mut SelectorCache,
        invalid: &mut Vec<InvalidReason>,
    ) -> String {
        let text = cache
            .resolve(fragment, &self.due_date_selector, true)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            invalid.push(InvalidReason::MissingDueDate);
            return String::new();
        }

        match self.dates.normalize(&text) {
            Some(due) if due > self.dates.now() => to_iso_string(&due),
            Some(_) => {
                invalid.push(InvalidReason::PastDue);
                String::new()
            }
            None => {
                warn!(text = %text, "Could not parse due date");
                invalid.push(InvalidReason::UnparseableDueDate);
                String::new()
            }
        }
    }
}
