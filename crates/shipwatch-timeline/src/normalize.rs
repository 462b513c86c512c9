//! Converts the two snapshot encodings into one canonical event list.
//!
//! The append-only form is a small index document plus a newline-delimited
//! log of event records; the legacy form is a single document keyed by
//! project. Downstream components only ever see the canonical
//! [`DeployEvent`] list and never branch on which schema it came from.

use crate::error::LoadError;
use crate::event::{
    arrange_links, DeployEvent, EventKind, EventWarning, LinkKind, SourceLink, UNKNOWN_DEPLOYER,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::warn;

fn to_str(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn collect_links(record: &Value) -> (String, Vec<SourceLink>) {
    let mut links = Vec::<SourceLink>::new();

    let commit_url = to_str(record.get("commitUrl"));
    if !commit_url.is_empty() {
        links.push(SourceLink::new(commit_url.clone(), "commit"));
    }

    let kustomization_url = to_str(record.get("kustomizationUrl"));
    if !kustomization_url.is_empty() {
        links.push(SourceLink::new(kustomization_url, "kustomization"));
    }

    if let Some(Value::Array(items)) = record.get("links") {
        for item in items {
            let url = to_str(item.get("url"));
            if url.is_empty() {
                continue;
            }
            links.push(SourceLink::new(url, to_str(item.get("label"))));
        }
    }

    let commit_url = if commit_url.is_empty() {
        links
            .iter()
            .find(|link| link.kind == LinkKind::Commit)
            .map(|link| link.url.clone())
            .unwrap_or_default()
    } else {
        commit_url
    };

    (commit_url, links)
}

fn collect_warnings(record: &Value) -> Vec<EventWarning> {
    let Some(Value::Array(items)) = record.get("warnings") else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let code = to_str(item.get("code"));
            let message = to_str(item.get("message"));
            if code.is_empty() && message.is_empty() {
                return None;
            }
            Some(EventWarning { code, message })
        })
        .collect()
}

/// Builds one canonical event from a raw record. Returns `None` when the
/// record carries no project key (from the record itself or the surrounding
/// legacy document), since every canonical event must name its project.
pub(crate) fn event_from_record(
    record: &Value,
    project_hint: Option<&str>,
    labels: &HashMap<String, String>,
    link_cap: usize,
) -> Option<DeployEvent> {
    let mut project_key = to_str(record.get("projectKey"));
    if project_key.is_empty() {
        project_key = project_hint.unwrap_or_default().to_string();
    }
    if project_key.is_empty() {
        return None;
    }

    let project_label = labels
        .get(&project_key)
        .cloned()
        .unwrap_or_else(|| project_key.clone());

    let mut environment = to_str(record.get("envKey"));
    if environment.is_empty() {
        environment = to_str(record.get("env"));
    }
    let environment = environment.to_lowercase();

    let mut deployed_by = to_str(record.get("by"));
    if deployed_by.is_empty() {
        deployed_by = UNKNOWN_DEPLOYER.to_string();
    }

    let mut timestamp = to_str(record.get("at"));
    if timestamp.is_empty() {
        timestamp = to_str(record.get("time"));
    }
    let instant = parse_instant(&timestamp);

    let (commit_url, links) = collect_links(record);

    Some(DeployEvent {
        project_key,
        project_label,
        environment,
        component: to_str(record.get("component")),
        kind: EventKind::parse(&to_str(record.get("kind"))),
        from_version: to_str(record.get("fromTag")),
        to_version: to_str(record.get("toTag")),
        deployed_by,
        timestamp,
        instant,
        commit_url,
        source_links: arrange_links(links, link_cap),
        warnings: collect_warnings(record),
    })
}

/// Descending by timestamp; events with unparsable timestamps sort as the
/// oldest. The sort is stable so ties keep feed order.
pub fn sort_events(events: &mut [DeployEvent]) {
    events.sort_by(|a, b| match (a.instant, b.instant) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Decodes the append-only form. The index document is opaque beyond "parses
/// as JSON"; malformed log lines are skipped individually and logged, never
/// aborting the load.
pub fn decode_append_only(
    index_raw: &str,
    log_raw: &str,
    labels: &HashMap<String, String>,
    link_cap: usize,
) -> Result<Vec<DeployEvent>, LoadError> {
    serde_json::from_str::<Value>(index_raw)
        .map_err(|err| LoadError::InvalidIndex(err.to_string()))?;

    let mut events = Vec::<DeployEvent>::new();
    for (idx, line) in log_raw.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record = match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => value,
            Err(err) => {
                warn!("skipping malformed event log line {line_no}: {err}");
                continue;
            }
        };

        match event_from_record(&record, None, labels, link_cap) {
            Some(event) => events.push(event),
            None => warn!("skipping event log line {line_no}: missing project key"),
        }
    }

    sort_events(&mut events);
    Ok(events)
}

/// Decodes the legacy single-document form: an object keyed by project, each
/// value either a bare list of records or an object wrapping one under
/// `events`.
pub fn decode_legacy(
    raw: &str,
    labels: &HashMap<String, String>,
    link_cap: usize,
) -> Result<Vec<DeployEvent>, LoadError> {
    let doc = serde_json::from_str::<Value>(raw)
        .map_err(|err| LoadError::InvalidLegacy(err.to_string()))?;

    let Value::Object(projects) = doc else {
        return Err(LoadError::InvalidLegacy(
            "expected an object keyed by project".to_string(),
        ));
    };

    let mut events = Vec::<DeployEvent>::new();
    for (project_key, entry) in &projects {
        let records = match entry {
            Value::Array(items) => items.as_slice(),
            Value::Object(map) => match map.get("events") {
                Some(Value::Array(items)) => items.as_slice(),
                _ => {
                    warn!("legacy entry for {project_key} has no events list; skipping");
                    continue;
                }
            },
            _ => {
                warn!("legacy entry for {project_key} is neither list nor object; skipping");
                continue;
            }
        };

        for record in records {
            if let Some(event) = event_from_record(record, Some(project_key), labels, link_cap) {
                events.push(event);
            }
        }
    }

    sort_events(&mut events);
    Ok(events)
}
