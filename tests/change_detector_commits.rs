// tests/change_detector_commits.rs
use listing_watch::change_detector::{detect_commits, detect_snapshot, BackfillDirective, CommitModeOptions};
use listing_watch::ingest::providers::fixture::FixtureSource;
use serde_json::{json, Value};

fn rec(id: &str) -> Value {
    json!({
        "id": id,
        "company_name": format!("Company {id}"),
        "title": "Software Engineering Intern",
        "url": format!("https://jobs.example/{id}"),
        "date_posted": 1757152800
    })
}

fn recs(ids: &[&str]) -> Option<Vec<Value>> {
    Some(ids.iter().map(|i| rec(i)).collect())
}

fn opts(directive: BackfillDirective) -> CommitModeOptions {
    CommitModeOptions {
        watch_paths: vec!["listings.json".into()],
        directive,
        ..Default::default()
    }
}

fn ids(det: &listing_watch::change_detector::Detection) -> Vec<String> {
    det.candidates.iter().filter_map(|l| l.id.clone()).collect()
}

/// c1 [a] → c2 [a,b] → c3 README only [a,b,c] → c4 [a,b,c,d]
fn history() -> FixtureSource {
    let src = FixtureSource::new("SimplifyJobs/Summer2026-Internships");
    src.push_commit("c1", &[".github/scripts/listings.json"], recs(&["a"]));
    src.push_commit("c2", &[".github/scripts/listings.json"], recs(&["a", "b"]));
    src.push_commit("c3", &["README.md"], recs(&["a", "b", "c"]));
    src.push_commit("c4", &[".github/scripts/listings.json", "README.md"], recs(&["a", "b", "c", "d"]));
    src
}

#[tokio::test]
async fn first_run_only_sets_the_baseline() {
    let src = history();
    let det = detect_commits(&src, None, &opts(BackfillDirective::None)).await.unwrap();
    assert!(det.baseline);
    assert!(det.candidates.is_empty());
    assert_eq!(det.next_marker.as_deref(), Some("c4"));
}

#[tokio::test]
async fn only_additions_since_the_marker() {
    let src = history();
    let det = detect_commits(&src, Some("c2"), &opts(BackfillDirective::None)).await.unwrap();
    // c3 touches no watched path; c4 adds d on top of c3
    assert_eq!(ids(&det), vec!["d"]);
    assert_eq!(det.commits_processed, 1);
    assert_eq!(det.next_marker.as_deref(), Some("c4"));

    let det = detect_commits(&src, Some("c1"), &opts(BackfillDirective::None)).await.unwrap();
    assert_eq!(ids(&det), vec!["b", "d"]);
}

#[tokio::test]
async fn up_to_date_marker_emits_nothing() {
    let src = history();
    let det = detect_commits(&src, Some("c4"), &opts(BackfillDirective::None)).await.unwrap();
    assert!(det.candidates.is_empty());
    assert_eq!(det.next_marker.as_deref(), Some("c4"));
}

#[tokio::test]
async fn reset_baseline_backfills_the_window() {
    let src = history();
    let det = detect_commits(&src, Some("c4"), &opts(BackfillDirective::ResetBaseline)).await.unwrap();
    assert_eq!(ids(&det), vec!["a", "b", "d"]);
    assert!(!det.baseline);
}

#[tokio::test]
async fn back_one_replays_the_last_commit() {
    let src = history();
    let det = detect_commits(&src, Some("c4"), &opts(BackfillDirective::BackOne)).await.unwrap();
    assert_eq!(ids(&det), vec!["d"]);
    assert_eq!(det.next_marker.as_deref(), Some("c4"));
}

#[tokio::test]
async fn unknown_marker_processes_whole_window() {
    let src = history();
    let det = detect_commits(&src, Some("gone"), &opts(BackfillDirective::None)).await.unwrap();
    assert_eq!(ids(&det), vec!["a", "b", "d"]);
}

#[tokio::test]
async fn empty_watch_paths_count_every_commit() {
    let src = history();
    let all = CommitModeOptions::default();
    let det = detect_commits(&src, Some("c2"), &all).await.unwrap();
    assert_eq!(ids(&det), vec!["c", "d"]);
    assert_eq!(det.commits_processed, 2);
}

#[tokio::test]
async fn source_error_is_propagated() {
    let src = history();
    src.set_failing(true);
    assert!(detect_commits(&src, Some("c2"), &opts(BackfillDirective::None)).await.is_err());
    assert!(detect_snapshot(&src).await.is_err());
}

#[tokio::test]
async fn snapshot_counts_rejects_and_keeps_marker() {
    let src = FixtureSource::new("o/r").with_snapshot(vec![rec("a"), json!("junk"), json!({"company_name": "x"})]);
    let det = detect_snapshot(&src).await.unwrap();
    assert_eq!(ids(&det), vec!["a"]);
    assert_eq!(det.rejected.len(), 2);
    assert_eq!(det.next_marker, None);
}
