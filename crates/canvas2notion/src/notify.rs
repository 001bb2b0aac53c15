//! Renders run diagnostics as user-facing notifications.

use crate::extract::Diagnostic;
use tracing::debug;

/// A channel that shows messages to the user.
pub trait Notifier {
    fn notify(&mut self, message: &str);
}

/// Prints each notification to standard error, separated by a blank line.
#[derive(Debug, Default)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&mut self, message: &str) {
        eprintln!("{message}\n");
    }
}

/// Keeps notifications in memory, for API responses and tests.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    pub messages: Vec<String>,
}

impl Notifier for CollectingNotifier {
    fn notify(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}

/// Sends every user-facing diagnostic to `notifier`, in order.
///
/// Returns the number of notifications sent. Invalid records are only logged.
pub fn notify_all(diagnostics: &[Diagnostic], notifier: &mut impl Notifier) -> usize {
    let mut sent = 0;
    for diagnostic in diagnostics {
        if diagnostic.is_user_facing() {
            notifier.notify(&diagnostic.to_string());
            sent += 1;
        } else {
            debug!("{diagnostic}");
        }
    }
    sent
}
