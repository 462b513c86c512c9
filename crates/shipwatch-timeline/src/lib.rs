//! Deployment-event timeline engine.
//!
//! Ingests snapshot payloads into one canonical event list and derives every
//! consumer view from it: the filtered/grouped/sectioned list, the calendar
//! heatmap with day drill-in, and the rolling statistics. The engine is
//! read-only; nothing downstream of normalization mutates an event.

pub mod calendar;
mod error;
pub mod event;
pub mod filter;
pub mod group;
pub mod normalize;
pub mod section;
pub mod state;
pub mod stats;
pub mod store;

pub use error::LoadError;
pub use event::{
    arrange_links, display_or_dash, display_version, DeployEvent, EventKind, EventWarning,
    LinkKind, SourceLink, DEFAULT_LINK_CAP, UNKNOWN_DEPLOYER,
};
pub use state::{FilterAction, FilterState, DAY_PREVIEW_LIMIT, PAGE_BASE, PAGE_STEP};
pub use store::{EventSet, SnapshotPaths, SnapshotStore};
