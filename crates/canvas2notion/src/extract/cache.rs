//! Run-scoped selector lookups with once-per-selector failure reporting.

use super::error::Diagnostic;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Tracks which selectors have matched or failed during one run.
///
/// Create one per run and pass it by reference to every resolver. A selector
/// that fails verification is reported at most once, and never after it has
/// matched anywhere in the run.
#[derive(Debug, Default)]
pub struct SelectorCache {
    valid: HashSet<String>,
    invalid: HashSet<String>,
    /// Parsed selectors; `None` marks a string that is not valid CSS
    compiled: HashMap<String, Option<Selector>>,
    diagnostics: Vec<Diagnostic>,
}

impl SelectorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the first descendant of `parent` matching `selector`.
    ///
    /// On a miss with `verify` set, a [`Diagnostic::SelectorError`] is queued
    /// unless the selector has already matched or already been reported.
    pub fn resolve<'a>(
        &mut self,
        parent: ElementRef<'a>,
        selector: &str,
        verify: bool,
    ) -> Option<ElementRef<'a>> {
        let found = self
            .compile(selector)
            .and_then(|compiled| parent.select(&compiled).next());

        match found {
            Some(element) => {
                self.record_success(selector);
                Some(element)
            }
            None => {
                if verify {
                    self.record_failure(selector);
                }
                None
            }
        }
    }

    /// Returns every element in `document` matching `selector`, in document order.
    pub fn select_all<'a>(&mut self, document: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
        let Some(compiled) = self.compile(selector) else {
            self.record_failure(selector);
            return Vec::new();
        };

        let elements: Vec<_> = document.select(&compiled).collect();
        if !elements.is_empty() {
            self.record_success(selector);
        }
        elements
    }

    pub fn is_known_valid(&self, selector: &str) -> bool {
        self.valid.contains(selector)
    }

    pub fn is_known_invalid(&self, selector: &str) -> bool {
        self.invalid.contains(selector)
    }

    /// Drains the diagnostics queued so far.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn compile(&mut self, selector: &str) -> Option<Selector> {
        self.compiled
            .entry(selector.to_string())
            .or_insert_with(|| match Selector::parse(selector) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    warn!(selector = %selector, error = ?e, "Configured selector is not valid CSS");
                    None
                }
            })
            .clone()
    }

    fn record_success(&mut self, selector: &str) {
        if self.valid.insert(selector.to_string()) {
            debug!(selector = %selector, "Selector resolved");
        }
        self.invalid.remove(selector);
    }

    fn record_failure(&mut self, selector: &str) {
        if self.valid.contains(selector) || self.invalid.contains(selector) {
            return;
        }
        warn!(selector = %selector, "Selector did not match");
        self.invalid.insert(selector.to_string());
        self.diagnostics.push(Diagnostic::SelectorError {
            selector: selector.to_string(),
        });
    }
}
