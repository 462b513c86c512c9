//! Time-windowed rollups over the canonical event set. Each output is a
//! pure function of the same windowed slice; none feeds back into another.

use crate::event::DeployEvent;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Supported rolling windows, in days.
pub const STATS_WINDOWS: [u32; 2] = [7, 30];

/// Default cut for the component leaderboard.
pub const DEFAULT_TOP_COMPONENTS: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct CountRow {
    pub key: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectStats {
    pub project_key: String,
    pub project_label: String,
    pub total: u64,
    pub by_deployer: Vec<CountRow>,
    pub by_environment: Vec<CountRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowStats {
    pub window_days: u32,
    pub total: u64,
    /// Deployments per day over the window, one decimal place.
    pub velocity: f64,
    pub by_deployer: Vec<CountRow>,
    pub by_environment: Vec<CountRow>,
    pub top_components: Vec<CountRow>,
    /// Ranked descending by total, ties broken by first-seen order.
    pub projects: Vec<ProjectStats>,
}

/// Counter that remembers the order keys were first seen, so ranking
/// tie-breaks are deterministic against the feed order.
#[derive(Default)]
struct OrderedCounter {
    order: Vec<String>,
    counts: HashMap<String, u64>,
}

impl OrderedCounter {
    fn bump(&mut self, key: &str) {
        match self.counts.get_mut(key) {
            Some(count) => *count += 1,
            None => {
                self.order.push(key.to_string());
                self.counts.insert(key.to_string(), 1);
            }
        }
    }

    /// Rows in descending count order; equal counts keep first-seen order
    /// (the sort is stable over the insertion sequence).
    fn ranked(&self) -> Vec<CountRow> {
        let mut rows: Vec<CountRow> = self
            .order
            .iter()
            .map(|key| CountRow {
                key: key.clone(),
                count: self.counts[key],
            })
            .collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count));
        rows
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Rollups for one window length against a caller-supplied `now` (kept as a
/// parameter so the aggregator stays pure and testable).
pub fn window_stats(
    events: &[DeployEvent],
    window_days: u32,
    now: DateTime<Utc>,
    top_components: usize,
) -> WindowStats {
    let cutoff = now - Duration::days(i64::from(window_days));

    let windowed: Vec<&DeployEvent> = events
        .iter()
        .filter(|event| event.is_deploy())
        .filter(|event| event.instant.map(|at| at >= cutoff).unwrap_or(false))
        .collect();

    let mut deployers = OrderedCounter::default();
    let mut environments = OrderedCounter::default();
    let mut components = OrderedCounter::default();
    let mut project_order = Vec::<String>::new();
    let mut per_project = HashMap::<String, (String, OrderedCounter, OrderedCounter)>::new();

    for event in &windowed {
        deployers.bump(&event.deployed_by);
        environments.bump(&event.environment);
        if !event.component.is_empty() {
            components.bump(&event.component);
        }

        let entry = per_project
            .entry(event.project_key.clone())
            .or_insert_with(|| {
                project_order.push(event.project_key.clone());
                (
                    event.project_label.clone(),
                    OrderedCounter::default(),
                    OrderedCounter::default(),
                )
            });
        entry.1.bump(&event.deployed_by);
        entry.2.bump(&event.environment);
    }

    let mut projects: Vec<ProjectStats> = project_order
        .iter()
        .map(|key| {
            let (label, by_deployer, by_environment) = &per_project[key];
            ProjectStats {
                project_key: key.clone(),
                project_label: label.clone(),
                total: by_deployer.counts.values().sum(),
                by_deployer: by_deployer.ranked(),
                by_environment: by_environment.ranked(),
            }
        })
        .collect();
    projects.sort_by(|a, b| b.total.cmp(&a.total));

    let mut top = components.ranked();
    top.truncate(top_components);

    let total = windowed.len() as u64;
    WindowStats {
        window_days,
        total,
        velocity: round1(total as f64 / f64::from(window_days.max(1))),
        by_deployer: deployers.ranked(),
        by_environment: environments.ranked(),
        top_components: top,
        projects,
    }
}

/// All supported windows, in declaration order.
pub fn all_window_stats(
    events: &[DeployEvent],
    now: DateTime<Utc>,
    top_components: usize,
) -> Vec<WindowStats> {
    STATS_WINDOWS
        .iter()
        .map(|days| window_stats(events, *days, now, top_components))
        .collect()
}
