//! UI-session filter and pagination state.
//!
//! The only mutable, session-scoped value in the engine. It is never
//! persisted and is updated exclusively through pure reducer transitions so
//! filtering, grouping and pagination stay pure functions of
//! `(events, state)`.

use std::collections::BTreeSet;

/// Initial visible-window size over the filtered set.
pub const PAGE_BASE: usize = 10;
/// Window growth per "load more" action.
pub const PAGE_STEP: usize = 10;
/// Display cap for a calendar day drill-in before "show all".
pub const DAY_PREVIEW_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    /// `None` selects all projects.
    pub project: Option<String>,
    /// Empty means all environments of the selected project. Choices are
    /// scoped to the active project and reset when it changes.
    pub environments: BTreeSet<String>,
    /// Inclusive `YYYY-MM-DD` bounds.
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub repo_query: String,
    pub tag_query: String,
    pub deployer_query: String,
    /// Gates the repo/tag/deployer substring filters.
    pub advanced: bool,
    /// Pager window over the filtered (not grouped) set.
    pub visible: usize,
    /// Calendar day drill-in selection.
    pub selected_day: Option<String>,
    pub day_show_all: bool,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            project: None,
            environments: BTreeSet::new(),
            date_from: None,
            date_to: None,
            repo_query: String::new(),
            tag_query: String::new(),
            deployer_query: String::new(),
            advanced: false,
            visible: PAGE_BASE,
            selected_day: None,
            day_show_all: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterAction {
    SelectProject(Option<String>),
    ToggleEnvironment(String),
    SetDateFrom(Option<String>),
    SetDateTo(Option<String>),
    SetRepoQuery(String),
    SetTagQuery(String),
    SetDeployerQuery(String),
    SetAdvanced(bool),
    LoadMore,
    /// Toggle semantics: selecting the already-selected day deselects it.
    /// Zero-count days are rejected by the calendar layer before an action
    /// is ever dispatched.
    SelectDay(String),
    ShowAllSelectedDay,
    ClearDaySelection,
}

/// Pure transition. Any change to a filter predicate resets the visible
/// window to its base; changing the day selection resets its sub-limit.
pub fn apply(state: &FilterState, action: FilterAction) -> FilterState {
    let mut next = state.clone();
    match action {
        FilterAction::SelectProject(project) => {
            if next.project != project {
                next.environments.clear();
            }
            next.project = project;
            next.visible = PAGE_BASE;
        }
        FilterAction::ToggleEnvironment(env) => {
            let env = env.to_lowercase();
            if !next.environments.remove(&env) {
                next.environments.insert(env);
            }
            next.visible = PAGE_BASE;
        }
        FilterAction::SetDateFrom(date) => {
            next.date_from = date;
            next.visible = PAGE_BASE;
        }
        FilterAction::SetDateTo(date) => {
            next.date_to = date;
            next.visible = PAGE_BASE;
        }
        FilterAction::SetRepoQuery(query) => {
            next.repo_query = query;
            next.visible = PAGE_BASE;
        }
        FilterAction::SetTagQuery(query) => {
            next.tag_query = query;
            next.visible = PAGE_BASE;
        }
        FilterAction::SetDeployerQuery(query) => {
            next.deployer_query = query;
            next.visible = PAGE_BASE;
        }
        FilterAction::SetAdvanced(advanced) => {
            next.advanced = advanced;
            next.visible = PAGE_BASE;
        }
        FilterAction::LoadMore => {
            next.visible = next.visible.saturating_add(PAGE_STEP);
        }
        FilterAction::SelectDay(day) => {
            if next.selected_day.as_deref() == Some(day.as_str()) {
                next.selected_day = None;
            } else {
                next.selected_day = Some(day);
            }
            next.day_show_all = false;
        }
        FilterAction::ShowAllSelectedDay => {
            if next.selected_day.is_some() {
                next.day_show_all = true;
            }
        }
        FilterAction::ClearDaySelection => {
            next.selected_day = None;
            next.day_show_all = false;
        }
    }
    next
}
