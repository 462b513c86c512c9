//! The filter pipeline: pure, AND-combined predicates over the canonical
//! event list. No predicate mutates anything; the result is always a subset
//! of the input in input order.

use crate::event::DeployEvent;
use crate::state::FilterState;
use std::collections::BTreeSet;

/// Applies the active predicates. The `TAG_CHANGE` kind constraint is fixed
/// and not user-configurable; the repo/tag/deployer substring filters only
/// apply while advanced mode is on, so toggling it off never keeps filtering
/// on stale query text.
pub fn filter<'a>(events: &'a [DeployEvent], state: &FilterState) -> Vec<&'a DeployEvent> {
    events
        .iter()
        .filter(|event| matches(event, state))
        .collect()
}

fn matches(event: &DeployEvent, state: &FilterState) -> bool {
    if !event.is_deploy() {
        return false;
    }

    if let Some(project) = &state.project {
        if &event.project_key != project {
            return false;
        }
    }

    if !state.environments.is_empty() && !state.environments.contains(&event.environment) {
        return false;
    }

    if state.date_from.is_some() || state.date_to.is_some() {
        // Fixed-width YYYY-MM-DD makes lexicographic compare safe. Events
        // without a parsable timestamp cannot satisfy a date bound.
        let Some(day) = event.day() else {
            return false;
        };
        if let Some(from) = state.date_from.as_deref() {
            if day < from {
                return false;
            }
        }
        if let Some(to) = state.date_to.as_deref() {
            if day > to {
                return false;
            }
        }
    }

    if state.advanced {
        if !state.repo_query.is_empty()
            && !contains_ci_any(
                event
                    .source_links
                    .iter()
                    .map(|link| link.url.as_str())
                    .chain(std::iter::once(event.component.as_str())),
                &state.repo_query,
            )
        {
            return false;
        }

        if !state.tag_query.is_empty()
            && !contains_ci_any(
                [event.from_version.as_str(), event.to_version.as_str()],
                &state.tag_query,
            )
        {
            return false;
        }

        if !state.deployer_query.is_empty()
            && !contains_ci(&event.deployed_by, &state.deployer_query)
        {
            return false;
        }
    }

    true
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn contains_ci_any<'a>(haystacks: impl IntoIterator<Item = &'a str>, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    haystacks
        .into_iter()
        .any(|haystack| haystack.to_lowercase().contains(&needle))
}

/// First `visible` filtered events by time order. Grouping happens after
/// this windowing, so a burst member past the window edge stays hidden until
/// the window grows.
pub fn visible_window<'a, 'b>(
    filtered: &'b [&'a DeployEvent],
    visible: usize,
) -> &'b [&'a DeployEvent] {
    &filtered[..visible.min(filtered.len())]
}

/// Distinct environments a project has deployed to, for scoping the
/// environment choices to the active project.
pub fn environments_for_project(events: &[DeployEvent], project: &str) -> BTreeSet<String> {
    events
        .iter()
        .filter(|event| event.is_deploy() && event.project_key == project)
        .filter(|event| !event.environment.is_empty())
        .map(|event| event.environment.clone())
        .collect()
}
