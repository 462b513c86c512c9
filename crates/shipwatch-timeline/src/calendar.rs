//! Calendar heatmap aggregation.
//!
//! Counts the entire event set (only the fixed `TAG_CHANGE` constraint
//! applies) so the heatmap reflects true activity regardless of the user's
//! filters; the day drill-in re-applies the active filters.

use crate::event::DeployEvent;
use crate::filter::filter;
use crate::state::{apply, FilterAction, FilterState, DAY_PREVIEW_LIMIT};
use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// Discretized activity level for heatmap coloring. Thresholds are fixed
/// constants, not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    None,
    Low,
    Medium,
    High,
}

impl Intensity {
    pub fn for_count(count: u32) -> Self {
        match count {
            0 => Self::None,
            1..=2 => Self::Low,
            3..=5 => Self::Medium,
            _ => Self::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarCell {
    pub date: String,
    pub count: u32,
    pub intensity: Intensity,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarMonth {
    /// `YYYY-MM`.
    pub key: String,
    /// e.g. `January 2025`.
    pub label: String,
    /// Grid offset of the first day, Monday-based.
    pub leading_blanks: u8,
    pub cells: Vec<CalendarCell>,
}

/// Day to deployment count over the full canonical set, parsable timestamps
/// only.
pub fn day_counts(events: &[DeployEvent]) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::<String, u32>::new();
    for event in events {
        if !event.is_deploy() {
            continue;
        }
        if let Some(day) = event.day() {
            *counts.entry(day.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

fn month_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

fn next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

/// Contiguous run of month grids spanning from the earlier of (first event
/// month, current month) to the later of (last event month, current month),
/// so the present month is always shown even when empty.
pub fn month_grid(counts: &BTreeMap<String, u32>, today: NaiveDate) -> Vec<CalendarMonth> {
    let parse = |key: &str| NaiveDate::parse_from_str(key, "%Y-%m-%d").ok();
    let first_event = counts.keys().next().and_then(|key| parse(key));
    let last_event = counts.keys().next_back().and_then(|key| parse(key));

    let current = month_start(today);
    let mut cursor = month_start(first_event.unwrap_or(today)).min(current);
    let end = month_start(last_event.unwrap_or(today)).max(current);

    let mut months = Vec::<CalendarMonth>::new();
    while cursor <= end {
        let mut cells = Vec::<CalendarCell>::new();
        let mut day = cursor;
        while day.month() == cursor.month() {
            let date = day.format("%Y-%m-%d").to_string();
            let count = counts.get(&date).copied().unwrap_or(0);
            cells.push(CalendarCell {
                date,
                count,
                intensity: Intensity::for_count(count),
            });
            let Some(next) = day.checked_add_days(Days::new(1)) else {
                break;
            };
            day = next;
        }

        months.push(CalendarMonth {
            key: cursor.format("%Y-%m").to_string(),
            label: cursor.format("%B %Y").to_string(),
            leading_blanks: cursor.weekday().num_days_from_monday() as u8,
            cells,
        });
        cursor = next_month(cursor);
    }

    months
}

/// Day selection for the drill-in. Selecting a day with zero events is a
/// no-op; selecting the already-selected day deselects it.
pub fn toggle_day(
    state: &FilterState,
    day: &str,
    counts: &BTreeMap<String, u32>,
) -> FilterState {
    if counts.get(day).copied().unwrap_or(0) == 0 {
        return state.clone();
    }
    apply(state, FilterAction::SelectDay(day.to_string()))
}

/// The selected day's events under the active filters, with the drill-in's
/// own display cap.
#[derive(Debug)]
pub struct DayDrilldown<'a> {
    pub day: String,
    /// Matching events before the cap.
    pub total: usize,
    pub events: Vec<&'a DeployEvent>,
    pub truncated: bool,
}

pub fn day_drilldown<'a>(
    events: &'a [DeployEvent],
    state: &FilterState,
) -> Option<DayDrilldown<'a>> {
    let day = state.selected_day.as_deref()?;

    let mut matching: Vec<&DeployEvent> = filter(events, state)
        .into_iter()
        .filter(|event| event.day() == Some(day))
        .collect();

    let total = matching.len();
    let truncated = !state.day_show_all && total > DAY_PREVIEW_LIMIT;
    if truncated {
        matching.truncate(DAY_PREVIEW_LIMIT);
    }

    Some(DayDrilldown {
        day: day.to_string(),
        total,
        events: matching,
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    fn event(day: &str, hour: u8, kind: EventKind) -> DeployEvent {
        let timestamp = format!("{day}T{hour:02}:00:00Z");
        DeployEvent {
            project_key: "TAP2".to_string(),
            project_label: "TAP2".to_string(),
            environment: "qa".to_string(),
            component: "api".to_string(),
            kind,
            from_version: String::new(),
            to_version: String::new(),
            deployed_by: "alice".to_string(),
            instant: chrono::DateTime::parse_from_rfc3339(&timestamp)
                .ok()
                .map(|dt| dt.with_timezone(&chrono::Utc)),
            timestamp,
            commit_url: String::new(),
            source_links: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn deploy(day: &str, hour: u8) -> DeployEvent {
        event(day, hour, EventKind::TagChange)
    }

    #[test]
    fn intensity_tiers_use_fixed_thresholds() {
        assert_eq!(Intensity::for_count(0), Intensity::None);
        assert_eq!(Intensity::for_count(1), Intensity::Low);
        assert_eq!(Intensity::for_count(2), Intensity::Low);
        assert_eq!(Intensity::for_count(3), Intensity::Medium);
        assert_eq!(Intensity::for_count(5), Intensity::Medium);
        assert_eq!(Intensity::for_count(6), Intensity::High);
        assert_eq!(Intensity::for_count(40), Intensity::High);
    }

    #[test]
    fn day_counts_ignore_non_deploys_and_unparsable_timestamps() {
        let mut bad = deploy("2025-01-10", 9);
        bad.instant = None;
        let events = vec![
            deploy("2025-01-10", 8),
            deploy("2025-01-10", 10),
            event("2025-01-10", 11, EventKind::Other("NOTE".to_string())),
            bad,
        ];

        let counts = day_counts(&events);
        assert_eq!(counts.get("2025-01-10"), Some(&2));
        assert_eq!(counts.len(), 1);
    }

    #[test]
    fn calendar_total_matches_deploys_with_parsable_timestamps() {
        let events = vec![
            deploy("2025-01-10", 8),
            deploy("2025-02-03", 9),
            deploy("2025-02-03", 10),
            event("2025-02-04", 9, EventKind::Other("NOTE".to_string())),
        ];
        let counts = day_counts(&events);
        let total: u32 = counts.values().sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn month_grid_spans_events_through_current_month() {
        let events = vec![deploy("2025-01-10", 8)];
        let counts = day_counts(&events);
        let today = NaiveDate::from_ymd_opt(2025, 3, 15).expect("valid date");

        let months = month_grid(&counts, today);
        let keys: Vec<&str> = months.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["2025-01", "2025-02", "2025-03"]);
        assert_eq!(months[0].cells.len(), 31);
        assert_eq!(months[1].cells.len(), 28);
        // 2025-01-01 is a Wednesday
        assert_eq!(months[0].leading_blanks, 2);
        assert_eq!(months[0].label, "January 2025");

        let jan10 = &months[0].cells[9];
        assert_eq!(jan10.date, "2025-01-10");
        assert_eq!(jan10.count, 1);
        assert_eq!(jan10.intensity, Intensity::Low);
    }

    #[test]
    fn month_grid_includes_current_month_before_any_events() {
        let events = vec![deploy("2025-05-02", 8)];
        let counts = day_counts(&events);
        let today = NaiveDate::from_ymd_opt(2025, 4, 1).expect("valid date");

        let months = month_grid(&counts, today);
        let keys: Vec<&str> = months.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["2025-04", "2025-05"]);
    }

    #[test]
    fn empty_event_set_still_renders_the_current_month() {
        let months = month_grid(
            &BTreeMap::new(),
            NaiveDate::from_ymd_opt(2025, 6, 20).expect("valid date"),
        );
        assert_eq!(months.len(), 1);
        assert_eq!(months[0].key, "2025-06");
        assert!(months[0].cells.iter().all(|cell| cell.count == 0));
    }

    #[test]
    fn toggling_a_zero_count_day_is_a_no_op() {
        let events = vec![deploy("2025-01-10", 8)];
        let counts = day_counts(&events);
        let state = FilterState::default();

        let unchanged = toggle_day(&state, "2025-01-11", &counts);
        assert_eq!(unchanged, state);

        let selected = toggle_day(&state, "2025-01-10", &counts);
        assert_eq!(selected.selected_day.as_deref(), Some("2025-01-10"));

        let deselected = toggle_day(&selected, "2025-01-10", &counts);
        assert_eq!(deselected.selected_day, None);
    }

    #[test]
    fn drilldown_applies_active_filters_and_caps_at_twenty() {
        let mut events = Vec::new();
        for hour in 0..23 {
            events.push(deploy("2025-01-10", hour));
        }
        let mut other_project = deploy("2025-01-10", 23);
        other_project.project_key = "CORE".to_string();
        events.push(other_project);

        let mut state = FilterState::default();
        state.selected_day = Some("2025-01-10".to_string());
        state.project = Some("TAP2".to_string());

        let drill = day_drilldown(&events, &state).expect("drilldown");
        assert_eq!(drill.total, 23);
        assert_eq!(drill.events.len(), DAY_PREVIEW_LIMIT);
        assert!(drill.truncated);
        assert!(drill
            .events
            .iter()
            .all(|event| event.project_key == "TAP2"));

        state.day_show_all = true;
        let full = day_drilldown(&events, &state).expect("drilldown");
        assert_eq!(full.events.len(), 23);
        assert!(!full.truncated);
    }

    #[test]
    fn drilldown_requires_a_selected_day() {
        let events = vec![deploy("2025-01-10", 8)];
        assert!(day_drilldown(&events, &FilterState::default()).is_none());
    }
}
