use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::sync::OnceLock;

pub const UNKNOWN_DEPLOYER: &str = "unknown";

/// Default cap on source links kept per event for display.
pub const DEFAULT_LINK_CAP: usize = 5;

fn semver_re() -> &'static Regex {
    static SEMVER_RE: OnceLock<Regex> = OnceLock::new();
    SEMVER_RE.get_or_init(|| Regex::new(r"(\d+\.\d+\.\d+)").expect("valid semver regex"))
}

/// The tag of a recorded change. Only [`EventKind::TagChange`] represents an
/// actual deployment; every other kind is ingested but filtered out before
/// grouping and statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    TagChange,
    Other(String),
}

impl EventKind {
    pub fn parse(raw: &str) -> Self {
        if raw == "TAG_CHANGE" {
            Self::TagChange
        } else {
            Self::Other(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::TagChange => "TAG_CHANGE",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Fixed display ordering for source links: commit/PR first, then infra
/// manifest, build, branch, everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Commit,
    Manifest,
    Build,
    Branch,
    Other,
}

impl LinkKind {
    pub fn classify(label: &str, url: &str) -> Self {
        let label = label.to_ascii_lowercase();
        let url = url.to_ascii_lowercase();
        let matches = |needle: &str| label.contains(needle) || url.contains(needle);

        if matches("commit") || matches("/pull/") || matches("/merge_requests/") || label == "pr" {
            Self::Commit
        } else if matches("kustomization") || matches("manifest") {
            Self::Manifest
        } else if matches("build") || matches("pipeline") {
            Self::Build
        } else if matches("branch") || matches("/tree/") {
            Self::Branch
        } else {
            Self::Other
        }
    }

    fn priority(self) -> u8 {
        match self {
            Self::Commit => 0,
            Self::Manifest => 1,
            Self::Build => 2,
            Self::Branch => 3,
            Self::Other => 4,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceLink {
    pub url: String,
    pub label: String,
    pub kind: LinkKind,
}

impl SourceLink {
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        let url = url.into();
        let label = label.into();
        let kind = LinkKind::classify(&label, &url);
        Self { url, label, kind }
    }
}

/// Deduplicates by URL (first occurrence wins), orders by link-kind priority
/// and caps the result. The relative order of links sharing a kind is kept.
pub fn arrange_links(links: Vec<SourceLink>, cap: usize) -> Vec<SourceLink> {
    let mut seen = HashSet::<String>::new();
    let mut out: Vec<SourceLink> = links
        .into_iter()
        .filter(|link| !link.url.is_empty() && seen.insert(link.url.clone()))
        .collect();
    out.sort_by_key(|link| link.kind.priority());
    out.truncate(cap);
    out
}

#[derive(Debug, Clone, Serialize)]
pub struct EventWarning {
    pub code: String,
    pub message: String,
}

/// One recorded change of a component's deployed version in one environment.
///
/// Canonical: once built by the normalizer an event is never edited, only
/// filtered and grouped into views.
#[derive(Debug, Clone, Serialize)]
pub struct DeployEvent {
    pub project_key: String,
    pub project_label: String,
    pub environment: String,
    pub component: String,
    pub kind: EventKind,
    pub from_version: String,
    pub to_version: String,
    pub deployed_by: String,
    /// Raw ISO-8601 timestamp as stored in the snapshot.
    pub timestamp: String,
    /// Parsed instant, used for ordering and statistics windows only.
    /// `None` keeps the event in the canonical list but out of every
    /// date-bucketed view.
    #[serde(skip)]
    pub instant: Option<DateTime<Utc>>,
    /// Commit URL the change originated from; empty when unknown. Drives
    /// burst grouping.
    pub commit_url: String,
    pub source_links: Vec<SourceLink>,
    pub warnings: Vec<EventWarning>,
}

impl DeployEvent {
    pub fn is_deploy(&self) -> bool {
        matches!(self.kind, EventKind::TagChange)
    }

    /// Calendar day of the stored timestamp, as the literal date substring.
    ///
    /// Deliberately not re-derived from the parsed instant so that day
    /// boundaries match what the producer wrote (timezone drift would change
    /// user-visible buckets).
    pub fn day(&self) -> Option<&str> {
        if self.instant.is_some() && self.timestamp.len() >= 10 {
            Some(&self.timestamp[..10])
        } else {
            None
        }
    }
}

/// Extracts a short `vX.Y.Z` display form from an opaque version identifier,
/// dropping build metadata. Returns the input unchanged when no semver core
/// is detectable.
pub fn display_version(raw: &str) -> String {
    match semver_re().captures(raw) {
        Some(cap) => format!("v{}", &cap[1]),
        None => raw.to_string(),
    }
}

/// Empty identifiers render as `-`; the coercion never happens at storage
/// time.
pub fn display_or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
