//! Burst grouping: events that are side effects of the same underlying
//! change (same project, same environment, same source commit) collapse into
//! one unit of work.
//!
//! Two linear passes by construction: burst membership cannot be known until
//! every same-key event has been seen, while the head must stay the first
//! occurrence in a stable single traversal. The first pass counts
//! occurrences per key, the second assembles groups.

use crate::event::DeployEvent;
use std::collections::{HashMap, HashSet};

/// Either one event, or two or more events sharing a burst key. A burst's
/// head is its first-encountered member; `members` keeps feed order and
/// includes the head.
#[derive(Debug)]
pub enum BurstGroup<'a> {
    Single(&'a DeployEvent),
    Burst { members: Vec<&'a DeployEvent> },
}

impl<'a> BurstGroup<'a> {
    pub fn head(&self) -> &'a DeployEvent {
        match self {
            Self::Single(event) => event,
            Self::Burst { members } => members[0],
        }
    }

    pub fn members(&self) -> &[&'a DeployEvent] {
        match self {
            Self::Single(event) => std::slice::from_ref(event),
            Self::Burst { members } => members.as_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.members().len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn is_burst(&self) -> bool {
        matches!(self, Self::Burst { .. })
    }
}

/// `(project, environment lowercased, commit URL)`; empty when the event has
/// no commit URL, in which case it never groups.
fn burst_key(event: &DeployEvent) -> Option<(String, String, String)> {
    if event.commit_url.is_empty() {
        return None;
    }
    Some((
        event.project_key.clone(),
        event.environment.to_lowercase(),
        event.commit_url.clone(),
    ))
}

/// Groups a filtered, time-ordered slice. Every input event lands in exactly
/// one group; total membership equals the input length.
pub fn group_bursts<'a>(events: &[&'a DeployEvent]) -> Vec<BurstGroup<'a>> {
    let mut occurrences = HashMap::<(String, String, String), usize>::new();
    for event in events {
        if let Some(key) = burst_key(event) {
            *occurrences.entry(key).or_insert(0) += 1;
        }
    }

    let mut emitted = HashSet::<(String, String, String)>::new();
    let mut groups = Vec::<BurstGroup<'a>>::new();

    for (idx, event) in events.iter().enumerate() {
        let Some(key) = burst_key(event) else {
            groups.push(BurstGroup::Single(event));
            continue;
        };

        if occurrences[&key] < 2 {
            groups.push(BurstGroup::Single(event));
            continue;
        }

        if !emitted.insert(key.clone()) {
            continue;
        }

        let members: Vec<&'a DeployEvent> = events[idx..]
            .iter()
            .filter(|candidate| burst_key(candidate).as_ref() == Some(&key))
            .copied()
            .collect();
        groups.push(BurstGroup::Burst { members });
    }

    groups
}
