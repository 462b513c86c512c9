//! Partitions grouped events into human-relative day buckets for the list
//! view.

use crate::group::BurstGroup;
use chrono::{Days, NaiveDate};

#[derive(Debug)]
pub struct DaySection<'a> {
    /// Literal `YYYY-MM-DD` day key.
    pub day: String,
    /// `Today`, `Yesterday`, or the literal date.
    pub label: String,
    pub groups: Vec<BurstGroup<'a>>,
}

/// `Today`/`Yesterday` resolve against the caller-supplied current date so
/// the sectioner stays pure; the render layer computes "now" once per render.
pub fn day_label(day: &str, today: &str) -> String {
    if day == today {
        return "Today".to_string();
    }

    let yesterday = NaiveDate::parse_from_str(today, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.checked_sub_days(Days::new(1)))
        .map(|date| date.format("%Y-%m-%d").to_string());
    if yesterday.as_deref() == Some(day) {
        return "Yesterday".to_string();
    }

    day.to_string()
}

/// Buckets groups by the calendar day of their head event, in the order
/// distinct days are first encountered. The input is already time-sorted, so
/// sections come out newest-first. Groups whose head has no parsable
/// timestamp are excluded from date-bucketed views.
pub fn section_by_day<'a>(groups: Vec<BurstGroup<'a>>, today: &str) -> Vec<DaySection<'a>> {
    let mut sections = Vec::<DaySection<'a>>::new();

    for group in groups {
        let Some(day) = group.head().day() else {
            continue;
        };

        match sections.iter_mut().find(|section| section.day == day) {
            Some(section) => section.groups.push(group),
            None => {
                let day = day.to_string();
                sections.push(DaySection {
                    label: day_label(&day, today),
                    day,
                    groups: vec![group],
                });
            }
        }
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DeployEvent, EventKind};
    use crate::group::group_bursts;

    fn event(day: &str, hour: u8) -> DeployEvent {
        let timestamp = format!("{day}T{hour:02}:00:00Z");
        DeployEvent {
            project_key: "TAP2".to_string(),
            project_label: "TAP2".to_string(),
            environment: "qa".to_string(),
            component: "api".to_string(),
            kind: EventKind::TagChange,
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

    #[test]
    fn labels_resolve_today_yesterday_and_literal_dates() {
        assert_eq!(day_label("2025-01-12", "2025-01-12"), "Today");
        assert_eq!(day_label("2025-01-11", "2025-01-12"), "Yesterday");
        assert_eq!(day_label("2025-01-01", "2025-01-12"), "2025-01-01");
        // month boundary
        assert_eq!(day_label("2025-01-31", "2025-02-01"), "Yesterday");
    }

    #[test]
    fn sections_follow_first_encounter_order() {
        let events = vec![
            event("2025-01-12", 10),
            event("2025-01-12", 9),
            event("2025-01-11", 15),
            event("2025-01-09", 8),
        ];
        let refs: Vec<&DeployEvent> = events.iter().collect();
        let sections = section_by_day(group_bursts(&refs), "2025-01-12");

        let days: Vec<&str> = sections.iter().map(|s| s.day.as_str()).collect();
        assert_eq!(days, vec!["2025-01-12", "2025-01-11", "2025-01-09"]);
        assert_eq!(sections[0].label, "Today");
        assert_eq!(sections[1].label, "Yesterday");
        assert_eq!(sections[2].label, "2025-01-09");
        assert_eq!(sections[0].groups.len(), 2);
    }

    #[test]
    fn unparsable_heads_are_left_out_of_sections() {
        let mut bad = event("2025-01-12", 10);
        bad.instant = None;
        let events = vec![bad, event("2025-01-11", 9)];
        let refs: Vec<&DeployEvent> = events.iter().collect();

        let sections = section_by_day(group_bursts(&refs), "2025-01-12");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].day, "2025-01-11");
    }
}
