use canvas2notion::db::Store;
use canvas2notion::extract::{
    keys, parse_assignments, process_page, AssignmentStore, Diagnostic, ExtractionConfig,
    MergeOutcome,
};
use canvas2notion::notify::{notify_all, CollectingNotifier};
use chrono::{DateTime, Utc};
use scraper::Html;
use serde_json::json;
use std::sync::Barrier;
use std::thread;
use url::Url;

const PAGE_URL: &str = "https://canvas.example.edu/courses/77/assignments";

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-03-10T08:15:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn page(course_code: &str, assignments: &[(&str, &str)]) -> String {
    let fragments: String = assignments
        .iter()
        .enumerate()
        .map(|(i, (title, due))| {
            format!(
                r#"<li class="assignment">
                    <a class="ig-title" href="/courses/77/assignments/{i}">{title}</a>
                    <div class="assignment-date-due"><span class="screenreader-only">{due}</span></div>
                </li>"#
            )
        })
        .collect();

    format!(
        r#"<html><body>
            <nav class="ic-app-crumbs"><ul>
                <li><a href="/"><span>Dashboard</span></a></li>
                <li><a href="/courses/77"><span>{course_code}</span></a></li>
                <li><span>Assignments</span></li>
            </ul></nav>
            <ul class="assignment-list">{fragments}</ul>
        </body></html>"#
    )
}

fn utc_store() -> Store {
    let store = Store::in_memory().unwrap();
    store.set_option(keys::TIMEZONE, &json!("UTC")).unwrap();
    store
}

#[test]
fn test_past_due_assignment_is_excluded_and_order_kept() {
    let store = utc_store();
    let html = page(
        "CS101",
        &[
            ("Lab 1", "Mar 14 at 11:59pm"),
            ("Old Quiz", "Mar 1 at 9am"),
            ("Lab 2", "Mar 21 at 11:59pm"),
        ],
    );
    let url = Url::parse(PAGE_URL).unwrap();

    let summary = process_page(&store, &html, Some(&url), now()).unwrap();

    assert_eq!(
        summary.outcome,
        MergeOutcome::Saved {
            course: "CS101".to_string(),
            count: 2
        }
    );
    let saved = store.load_assignments().unwrap();
    let names: Vec<_> = saved.assignments["CS101"]
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(names, vec!["Lab 1", "Lab 2"]);
    assert_eq!(saved.saved_course, "CS101");

    for record in &saved.assignments["CS101"] {
        let due = DateTime::parse_from_rfc3339(&record.due).unwrap();
        assert!(due > now());
        assert_eq!(record.available, "2025-03-10T09:00:00.000Z");
    }
    assert_eq!(
        saved.assignments["CS101"][1].url,
        "https://canvas.example.edu/courses/77/assignments/2"
    );
}

#[test]
fn test_rerun_replaces_course_entry() {
    let store = utc_store();
    process_page(
        &store,
        &page("CS101", &[("A", "Mar 14 at 5pm"), ("B", "Mar 15 at 5pm")]),
        None,
        now(),
    )
    .unwrap();
    process_page(&store, &page("CS101", &[("C", "Mar 16 at 5pm")]), None, now()).unwrap();

    let saved = store.load_assignments().unwrap();
    assert_eq!(saved.assignments["CS101"].len(), 1);
    assert_eq!(saved.assignments["CS101"][0].name, "C");
}

#[test]
fn test_concurrent_runs_keep_both_courses() {
    for _ in 0..50 {
        let store = utc_store();
        let barrier = Barrier::new(2);
        let pages = [
            page("CS101", &[("Lab", "Mar 14 at 5pm")]),
            page("MATH200", &[("Problem Set", "Mar 15 at 5pm")]),
        ];

        thread::scope(|scope| {
            for html in &pages {
                let (store, barrier) = (&store, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    process_page(store, html, None, now()).unwrap();
                });
            }
        });

        let saved = store.load_assignments().unwrap();
        assert!(saved.assignments.contains_key("CS101"));
        assert!(saved.assignments.contains_key("MATH200"));
    }
}

#[test]
fn test_zero_fragments_leaves_store_unchanged() {
    let store = utc_store();
    process_page(&store, &page("CS101", &[("A", "Mar 14 at 5pm")]), None, now()).unwrap();
    let before = store.load_assignments().unwrap();

    let summary = process_page(
        &store,
        "<html><body><p>Not an assignments page</p></body></html>",
        None,
        now(),
    )
    .unwrap();

    assert_eq!(summary.outcome, MergeOutcome::NoAssignmentsFound);
    assert!(summary.diagnostics.contains(&Diagnostic::NoFragmentsFound));
    assert_eq!(store.load_assignments().unwrap(), before);
}

#[test]
fn test_no_valid_assignments_clears_marker_only() {
    let store = utc_store();
    process_page(&store, &page("CS101", &[("A", "Mar 14 at 5pm")]), None, now()).unwrap();

    let summary = process_page(
        &store,
        &page("CS101", &[("Stale", "Jan 3 at 5pm")]),
        None,
        now(),
    )
    .unwrap();

    assert_eq!(summary.outcome, MergeOutcome::NoValidAssignments);
    assert_eq!(
        summary.diagnostics.last(),
        Some(&Diagnostic::NoValidAssignments)
    );
    let saved = store.load_assignments().unwrap();
    assert_eq!(saved.saved_course, "");
    assert_eq!(saved.assignments["CS101"][0].name, "A");
}

#[test]
fn test_override_and_icon_produce_prefixed_course() {
    let store = utc_store();
    store
        .set_option(keys::COURSE_CODE_OVERRIDES, &json!(r#"{"1234": "COMP301"}"#))
        .unwrap();
    store
        .set_option(keys::COURSE_EMOJIS, &json!(r#"{"COMP301": "📘"}"#))
        .unwrap();

    let summary =
        process_page(&store, &page("1234", &[("Essay", "Mar 14 at 5pm")]), None, now()).unwrap();

    assert_eq!(summary.course, "📘 COMP301");
    let saved = store.load_assignments().unwrap();
    let record = &saved.assignments["📘 COMP301"][0];
    assert_eq!(record.course, "📘 COMP301");
    assert_eq!(record.icon.as_deref(), Some("📘"));
}

#[test]
fn test_malformed_override_behaves_as_empty_with_one_notification() {
    let store = utc_store();
    store
        .set_option(keys::COURSE_CODE_OVERRIDES, &json!("{\"1234\": COMP301"))
        .unwrap();

    let summary =
        process_page(&store, &page("1234", &[("Essay", "Mar 14 at 5pm")]), None, now()).unwrap();

    assert_eq!(summary.course, "1234");
    let config_errors = summary
        .diagnostics
        .iter()
        .filter(|d| matches!(d, Diagnostic::ConfigurationError { .. }))
        .count();
    assert_eq!(config_errors, 1);

    let mut notifier = CollectingNotifier::default();
    assert_eq!(notify_all(&summary.diagnostics, &mut notifier), 1);
    assert!(notifier.messages[0].contains("Canvas Course Code Overrides"));
}

#[test]
fn test_bad_selector_reported_once_across_fragments() {
    let mut config = ExtractionConfig {
        timezone: chrono_tz::Tz::UTC,
        ..ExtractionConfig::default()
    };
    config.class_names.due_date = "due-date-typo".to_string();

    let html = page(
        "CS101",
        &[
            ("A", "Mar 14 at 5pm"),
            ("B", "Mar 15 at 5pm"),
            ("C", "Mar 16 at 5pm"),
        ],
    );
    let document = Html::parse_document(&html);
    let report = parse_assignments(&document, None, &config, now());

    let selector_errors: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| matches!(d, Diagnostic::SelectorError { .. }))
        .collect();
    assert_eq!(
        selector_errors,
        vec![&Diagnostic::SelectorError {
            selector: ".due-date-typo .screenreader-only".to_string()
        }]
    );
    assert_eq!(report.built.len(), 3);
    assert_eq!(report.valid_count(), 0);
}

#[test]
fn test_missing_breadcrumbs_use_unknown_course() {
    let store = utc_store();
    let html = r#"<html><body>
        <div class="assignment">
            <a class="ig-title" href="https://canvas.example.edu/a/1">Lab</a>
            <div class="assignment-date-due"><span class="screenreader-only">Mar 14 at 5pm</span></div>
        </div>
    </body></html>"#;

    let summary = process_page(&store, html, None, now()).unwrap();

    assert_eq!(summary.course, "Unknown Course Code");
    assert!(summary
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::SelectorError { .. })));
    let saved: AssignmentStore = store.load_assignments().unwrap();
    assert_eq!(saved.assignments["Unknown Course Code"].len(), 1);
}
