//! End-to-end flow over realistic snapshot payloads: normalize, then the
//! list pipeline (filter, window, group, section) and the independent
//! calendar and statistics aggregations, all against the same canonical
//! list.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};
use shipwatch_timeline::calendar::{day_counts, day_drilldown, month_grid};
use shipwatch_timeline::filter::{filter, visible_window};
use shipwatch_timeline::group::group_bursts;
use shipwatch_timeline::normalize::{decode_append_only, decode_legacy};
use shipwatch_timeline::section::section_by_day;
use shipwatch_timeline::state::{apply, FilterAction, FilterState};
use shipwatch_timeline::stats::{all_window_stats, DEFAULT_TOP_COMPONENTS};
use shipwatch_timeline::{DeployEvent, DEFAULT_LINK_CAP, PAGE_BASE};
use std::collections::HashMap;

fn line(value: Value) -> String {
    serde_json::to_string(&value).expect("serialize line")
}

fn record(project: &str, env: &str, component: &str, at: &str, commit: &str) -> Value {
    let mut value = json!({
        "projectKey": project,
        "envKey": env,
        "component": component,
        "kind": "TAG_CHANGE",
        "fromTag": "1.0.0",
        "toTag": "1.1.0",
        "by": "alice",
        "at": at,
    });
    if !commit.is_empty() {
        value["commitUrl"] = json!(commit);
    }
    value
}

/// 2025-01-12: a three-event burst in qa plus one standalone prod deploy.
/// 2025-01-11: one deploy. 2025-01-10: one deploy, one NOTE, one bad line.
fn fixture_log() -> String {
    [
        line(record("TAP2", "qa", "api", "2025-01-12T10:00:00Z", "https://x/commit/77")),
        line(record("TAP2", "qa", "worker", "2025-01-12T10:00:05Z", "https://x/commit/77")),
        line(record("TAP2", "qa", "gateway", "2025-01-12T10:00:09Z", "https://x/commit/77")),
        line(record("TAP2", "prod", "api", "2025-01-12T14:00:00Z", "")),
        line(record("CORE", "qa", "billing", "2025-01-11T09:00:00Z", "")),
        line(record("CORE", "prod", "billing", "2025-01-10T09:00:00Z", "")),
        line(json!({"projectKey": "CORE", "kind": "NOTE", "at": "2025-01-10T10:00:00Z"})),
        "{broken".to_string(),
    ]
    .join("\n")
}

fn load_fixture() -> Vec<DeployEvent> {
    let mut labels = HashMap::new();
    labels.insert("TAP2".to_string(), "Tap Platform".to_string());
    decode_append_only("{}", &fixture_log(), &labels, DEFAULT_LINK_CAP)
        .expect("append-only decode")
}

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-01-12T18:00:00Z")
        .expect("valid now")
        .with_timezone(&Utc)
}

#[test]
fn canonical_list_keeps_non_deploys_that_views_exclude() {
    let events = load_fixture();
    // broken line skipped; NOTE retained in the canonical list
    assert_eq!(events.len(), 7);

    let filtered = filter(&events, &FilterState::default());
    assert_eq!(filtered.len(), 6);
    assert!(filtered.iter().all(|event| event.is_deploy()));
}

#[test]
fn list_pipeline_windows_groups_and_sections() {
    let events = load_fixture();
    let state = FilterState::default();

    let filtered = filter(&events, &state);
    let visible = visible_window(&filtered, state.visible);
    assert_eq!(visible.len(), 6.min(PAGE_BASE));

    let groups = group_bursts(visible);
    let membership: usize = groups.iter().map(|group| group.len()).sum();
    assert_eq!(membership, visible.len());

    // the qa burst collapses three rows into one
    assert_eq!(groups.len(), 4);
    let burst = groups
        .iter()
        .find(|group| group.is_burst())
        .expect("burst group");
    assert_eq!(burst.len(), 3);
    assert_eq!(burst.head().component, "api");
    assert_eq!(burst.head().project_label, "Tap Platform");

    let sections = section_by_day(groups, "2025-01-12");
    let days: Vec<&str> = sections.iter().map(|s| s.day.as_str()).collect();
    assert_eq!(days, vec!["2025-01-12", "2025-01-11", "2025-01-10"]);
    assert_eq!(sections[0].label, "Today");
    assert_eq!(sections[0].groups.len(), 2);
    assert_eq!(sections[1].label, "Yesterday");
}

#[test]
fn calendar_ignores_active_filters_but_drilldown_applies_them() {
    let events = load_fixture();
    let counts = day_counts(&events);

    let total: u32 = counts.values().sum();
    assert_eq!(total, 6, "all deploys with parsable timestamps");

    let today = NaiveDate::from_ymd_opt(2025, 1, 12).expect("valid date");
    let months = month_grid(&counts, today);
    assert_eq!(months.len(), 1);
    let grid_total: u32 = months
        .iter()
        .flat_map(|month| month.cells.iter())
        .map(|cell| cell.count)
        .sum();
    assert_eq!(grid_total, total);

    // narrow the filters, the counts stay put
    let mut state = FilterState::default();
    state.project = Some("CORE".to_string());
    assert_eq!(day_counts(&events).get("2025-01-12"), Some(&4));

    state.selected_day = Some("2025-01-12".to_string());
    let drill = day_drilldown(&events, &state).expect("drilldown");
    assert_eq!(drill.total, 0, "CORE deployed nothing on the selected day");

    state.project = Some("TAP2".to_string());
    let drill = day_drilldown(&events, &state).expect("drilldown");
    assert_eq!(drill.total, 4);
    assert!(!drill.truncated);
}

#[test]
fn statistics_roll_up_the_same_slice_per_window() {
    let events = load_fixture();
    let windows = all_window_stats(&events, now(), DEFAULT_TOP_COMPONENTS);

    let week = &windows[0];
    assert_eq!(week.window_days, 7);
    assert_eq!(week.total, 6);
    assert!((week.velocity - 0.9).abs() < f64::EPSILON);

    assert_eq!(week.by_deployer[0].key, "alice");
    assert_eq!(week.by_deployer[0].count, 6);

    assert_eq!(week.projects[0].project_key, "TAP2");
    assert_eq!(week.projects[0].project_label, "Tap Platform");
    assert_eq!(week.projects[0].total, 4);
    assert_eq!(week.projects[1].project_key, "CORE");
}

#[test]
fn legacy_fallback_payload_feeds_the_same_pipeline() {
    let doc = json!({
        "TAP2": {
            "events": [
                {"envKey": "qa", "kind": "TAG_CHANGE", "component": "api",
                 "by": "bob", "at": "2025-01-12T08:00:00Z"}
            ]
        },
        "CORE": [
            {"envKey": "prod", "kind": "TAG_CHANGE", "component": "billing",
             "at": "2025-01-11T08:00:00Z"}
        ]
    });

    let events = decode_legacy(&doc.to_string(), &HashMap::new(), DEFAULT_LINK_CAP)
        .expect("legacy decode");
    assert_eq!(events.len(), 2);

    let filtered = filter(&events, &FilterState::default());
    let sections = section_by_day(group_bursts(&filtered), "2025-01-12");
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0].label, "Today");
    assert_eq!(sections[1].groups[0].head().deployed_by, "unknown");
}

#[test]
fn pager_growth_reveals_older_events_without_reordering() {
    let mut log_lines = Vec::new();
    for day in 1..=25 {
        log_lines.push(line(record(
            "TAP2",
            "qa",
            "api",
            &format!("2025-01-{day:02}T08:00:00Z"),
            "",
        )));
    }
    let log = log_lines.join("\n");
    let events =
        decode_append_only("{}", &log, &HashMap::new(), DEFAULT_LINK_CAP).expect("decode");

    let mut state = FilterState::default();
    let filtered = filter(&events, &state);
    assert_eq!(filtered.len(), 25);

    let first_page = visible_window(&filtered, state.visible);
    assert_eq!(first_page.len(), PAGE_BASE);
    assert_eq!(first_page[0].timestamp, "2025-01-25T08:00:00Z");

    state = apply(&state, FilterAction::LoadMore);
    let second_page = visible_window(&filtered, state.visible);
    assert_eq!(second_page.len(), 20);
    for (wider, narrower) in second_page.iter().zip(first_page.iter()) {
        assert!(std::ptr::eq(*wider, *narrower), "growth keeps the prefix");
    }

    // predicate change snaps back to the base window
    state = apply(&state, FilterAction::SetDateTo(Some("2025-01-20".to_string())));
    assert_eq!(state.visible, PAGE_BASE);
}
