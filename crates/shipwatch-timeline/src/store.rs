//! Async snapshot loading.
//!
//! The only asynchronous boundary in the engine: everything downstream
//! operates on an already-resident [`EventSet`]. Loading tries the
//! append-only form first and falls back to the legacy document; when both
//! fail the store still yields an empty event list plus the captured error
//! so every consuming view can render an explicit unavailable state.

use crate::error::LoadError;
use crate::event::DeployEvent;
use crate::normalize::{decode_append_only, decode_legacy};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// The canonical event list plus the captured load error, if any. Appended
/// to by loads only; consumers never mutate it.
#[derive(Debug, Default)]
pub struct EventSet {
    pub events: Vec<DeployEvent>,
    pub error: Option<String>,
}

impl EventSet {
    pub fn unavailable(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotPaths {
    pub index: PathBuf,
    pub log: PathBuf,
    pub legacy: PathBuf,
}

pub struct SnapshotStore {
    paths: SnapshotPaths,
    labels: HashMap<String, String>,
    link_cap: usize,
    current: RwLock<Arc<EventSet>>,
    /// Ticket of the newest load request issued so far. Starts at 1 so the
    /// implicit "any completed load will do" ticket of [`Self::events`] is
    /// never confused with a reload ticket.
    requested: AtomicU64,
    /// Highest ticket the resident data satisfies. Holding this guards the
    /// whole read-decode-publish sequence, so loads are serialized:
    /// concurrent triggers await the in-flight result instead of fetching
    /// again, and a later load can never be overwritten by an earlier one.
    satisfied: Mutex<u64>,
}

impl SnapshotStore {
    pub fn new(paths: SnapshotPaths, labels: HashMap<String, String>, link_cap: usize) -> Self {
        Self {
            paths,
            labels,
            link_cap,
            current: RwLock::new(Arc::new(EventSet::default())),
            requested: AtomicU64::new(1),
            satisfied: Mutex::new(0),
        }
    }

    /// Resident events, loading once if nothing has been loaded yet.
    pub async fn events(&self) -> Arc<EventSet> {
        self.load_satisfying(1).await
    }

    /// Forces a fresh load. Last caller wins: a reload requested after
    /// another completes observes data read no earlier than its own request.
    pub async fn reload(&self) -> Arc<EventSet> {
        let ticket = self.requested.fetch_add(1, Ordering::SeqCst) + 1;
        self.load_satisfying(ticket).await
    }

    async fn load_satisfying(&self, ticket: u64) -> Arc<EventSet> {
        let mut satisfied = self.satisfied.lock().await;
        if *satisfied >= ticket {
            return self.current.read().await.clone();
        }

        // Requests issued before the files are read are covered by this load.
        let covers = self.requested.load(Ordering::SeqCst);
        let set = Arc::new(self.read_snapshot().await);
        *self.current.write().await = set.clone();
        *satisfied = covers.max(ticket).max(*satisfied);
        set
    }

    async fn read_snapshot(&self) -> EventSet {
        match self.read_append_only().await {
            Ok(events) => {
                info!("loaded {} events from append-only snapshot", events.len());
                EventSet {
                    events,
                    error: None,
                }
            }
            Err(append_err) => {
                warn!("append-only snapshot load failed ({append_err}); trying legacy document");
                match self.read_legacy().await {
                    Ok(events) => {
                        info!("loaded {} events from legacy snapshot", events.len());
                        EventSet {
                            events,
                            error: None,
                        }
                    }
                    Err(legacy_err) => EventSet {
                        events: Vec::new(),
                        error: Some(format!(
                            "append-only load failed: {append_err}; legacy load failed: {legacy_err}"
                        )),
                    },
                }
            }
        }
    }

    async fn read_append_only(&self) -> Result<Vec<DeployEvent>, LoadError> {
        let index_raw = read_file(&self.paths.index).await?;
        let log_raw = read_file(&self.paths.log).await?;
        decode_append_only(&index_raw, &log_raw, &self.labels, self.link_cap)
    }

    async fn read_legacy(&self) -> Result<Vec<DeployEvent>, LoadError> {
        let raw = read_file(&self.paths.legacy).await?;
        decode_legacy(&raw, &self.labels, self.link_cap)
    }
}

async fn read_file(path: &Path) -> Result<String, LoadError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|err| LoadError::unreadable(path.display().to_string(), err.to_string()))
}
