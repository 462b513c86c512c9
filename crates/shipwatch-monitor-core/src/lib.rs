use anyhow::{anyhow, Result};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use shipwatch_config::AppConfig;
use shipwatch_timeline::calendar::{day_counts, day_drilldown, month_grid};
use shipwatch_timeline::filter::{environments_for_project, filter, visible_window};
use shipwatch_timeline::group::{group_bursts, BurstGroup};
use shipwatch_timeline::section::section_by_day;
use shipwatch_timeline::stats::all_window_stats;
use shipwatch_timeline::{
    display_or_dash, display_version, DeployEvent, EventSet, FilterState, SnapshotPaths,
    SnapshotStore,
};

#[derive(Clone)]
struct AppState {
    store: Arc<SnapshotStore>,
    static_dir: PathBuf,
    stats_top_components: usize,
    preview_rows: usize,
}

/// Filter state over the wire. Environments arrive comma-separated so the
/// whole state fits in a flat query string.
#[derive(Debug, Default, Deserialize)]
struct TimelineQuery {
    project: Option<String>,
    envs: Option<String>,
    from: Option<String>,
    to: Option<String>,
    repo: Option<String>,
    tag: Option<String>,
    deployer: Option<String>,
    advanced: Option<bool>,
    visible: Option<usize>,
    day: Option<String>,
    day_all: Option<bool>,
}

fn state_from_query(params: &TimelineQuery) -> FilterState {
    let mut state = FilterState::default();

    state.project = params
        .project
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    if let Some(envs) = params.envs.as_deref() {
        state.environments = envs
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_lowercase)
            .collect();
    }
    state.date_from = params.from.clone().filter(|value| !value.is_empty());
    state.date_to = params.to.clone().filter(|value| !value.is_empty());
    state.repo_query = params.repo.clone().unwrap_or_default();
    state.tag_query = params.tag.clone().unwrap_or_default();
    state.deployer_query = params.deployer.clone().unwrap_or_default();
    state.advanced = params.advanced.unwrap_or(false);
    state.visible = params.visible.unwrap_or(state.visible).max(1);
    state.selected_day = params.day.clone().filter(|value| !value.is_empty());
    state.day_show_all = params.day_all.unwrap_or(false);

    state
}

pub async fn run_server(
    cfg: AppConfig,
    host: String,
    port: u16,
    static_dir: PathBuf,
) -> Result<()> {
    let store = SnapshotStore::new(
        SnapshotPaths {
            index: cfg.index_path(),
            log: cfg.log_path(),
            legacy: cfg.legacy_path(),
        },
        cfg.project_labels(),
        cfg.engine.link_display_cap,
    );

    let state = AppState {
        store: Arc::new(store),
        static_dir,
        stats_top_components: cfg.engine.stats_top_components,
        preview_rows: cfg.engine.preview_rows,
    };

    let app = Router::new()
        .route("/api/health", get(api_health))
        .route("/api/timeline", get(api_timeline))
        .route("/api/calendar", get(api_calendar))
        .route("/api/stats", get(api_stats))
        .route("/api/preview", get(api_preview))
        .route("/api/reload", post(api_reload))
        .fallback(get(static_fallback))
        .with_state(state.clone());

    let bind = format!("{}:{}", host, port)
        .parse::<SocketAddr>()
        .map_err(|err| anyhow!("invalid bind address: {err}"))?;

    println!("shipwatch-monitor running at http://{}", bind);
    println!("serving UI from {}", state.static_dir.display());

    let listener = tokio::net::TcpListener::bind(bind).await.map_err(|error| {
        if error.kind() == ErrorKind::AddrInUse {
            anyhow!(
                "failed to bind {bind}: address already in use. another monitor may already be running. stop it or rerun with `shipwatch-monitor --port <free-port>`"
            )
        } else {
            anyhow!("failed to bind {bind}: {error}")
        }
    })?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn json_response<T: Serialize>(payload: T, status: StatusCode) -> Response {
    let mut response = Json(payload).into_response();
    *response.status_mut() = status;
    response
}

fn snapshot_payload(set: &EventSet) -> Value {
    match &set.error {
        Some(error) => json!({"available": false, "error": error}),
        None => json!({"available": true, "error": Value::Null}),
    }
}

fn event_row(event: &DeployEvent) -> Value {
    json!({
        "project_key": event.project_key,
        "project_label": display_or_dash(&event.project_label),
        "environment": display_or_dash(&event.environment),
        "component": display_or_dash(&event.component),
        "kind": event.kind,
        "from_version": display_version(&event.from_version),
        "to_version": display_version(&event.to_version),
        "deployed_by": event.deployed_by,
        "timestamp": event.timestamp,
        "commit_url": event.commit_url,
        "links": event.source_links,
        "warnings": event.warnings,
    })
}

fn group_payload(group: &BurstGroup<'_>) -> Value {
    json!({
        "burst": group.is_burst(),
        "size": group.len(),
        "head": event_row(group.head()),
        "members": group
            .members()
            .iter()
            .map(|event| event_row(event))
            .collect::<Vec<_>>(),
    })
}

fn timeline_payload(set: &EventSet, state: &FilterState, today: &str) -> Value {
    let filtered = filter(&set.events, state);
    let window = visible_window(&filtered, state.visible);
    let sections = section_by_day(group_bursts(window), today);

    let environments = state
        .project
        .as_deref()
        .map(|project| environments_for_project(&set.events, project))
        .unwrap_or_default();

    json!({
        "snapshot": snapshot_payload(set),
        "total_matching": filtered.len(),
        "visible": window.len(),
        "has_more": filtered.len() > window.len(),
        "environments": environments,
        "sections": sections
            .iter()
            .map(|section| json!({
                "day": section.day,
                "label": section.label,
                "groups": section
                    .groups
                    .iter()
                    .map(group_payload)
                    .collect::<Vec<_>>(),
            }))
            .collect::<Vec<_>>(),
    })
}

fn calendar_payload(set: &EventSet, state: &FilterState, today: chrono::NaiveDate) -> Value {
    let counts = day_counts(&set.events);
    let months = month_grid(&counts, today);

    let drilldown = day_drilldown(&set.events, state).map(|drill| {
        json!({
            "day": drill.day,
            "total": drill.total,
            "truncated": drill.truncated,
            "events": drill.events.iter().map(|event| event_row(event)).collect::<Vec<_>>(),
        })
    });

    json!({
        "snapshot": snapshot_payload(set),
        "months": months,
        "drilldown": drilldown,
    })
}

fn preview_payload(set: &EventSet, today: &str, rows: usize) -> Value {
    let filtered = filter(&set.events, &FilterState::default());
    let groups: Vec<BurstGroup<'_>> = group_bursts(&filtered).into_iter().take(rows).collect();
    let sections = section_by_day(groups, today);

    json!({
        "snapshot": snapshot_payload(set),
        "sections": sections
            .iter()
            .map(|section| json!({
                "day": section.day,
                "label": section.label,
                "groups": section
                    .groups
                    .iter()
                    .map(group_payload)
                    .collect::<Vec<_>>(),
            }))
            .collect::<Vec<_>>(),
    })
}

async fn api_health(State(state): State<AppState>) -> Response {
    let set = state.store.events().await;
    match &set.error {
        None => json_response(
            json!({
                "ok": true,
                "events": set.events.len(),
                "error": Value::Null,
            }),
            StatusCode::OK,
        ),
        Some(error) => json_response(
            json!({
                "ok": false,
                "events": 0,
                "error": error,
            }),
            StatusCode::SERVICE_UNAVAILABLE,
        ),
    }
}

async fn api_timeline(
    Query(params): Query<TimelineQuery>,
    State(state): State<AppState>,
) -> Response {
    let set = state.store.events().await;
    let filter_state = state_from_query(&params);
    let today = Utc::now().format("%Y-%m-%d").to_string();
    json_response(
        timeline_payload(&set, &filter_state, &today),
        StatusCode::OK,
    )
}

async fn api_calendar(
    Query(params): Query<TimelineQuery>,
    State(state): State<AppState>,
) -> Response {
    let set = state.store.events().await;
    let filter_state = state_from_query(&params);
    let today = Utc::now().date_naive();
    json_response(calendar_payload(&set, &filter_state, today), StatusCode::OK)
}

async fn api_stats(State(state): State<AppState>) -> Response {
    let set = state.store.events().await;
    let windows = all_window_stats(&set.events, Utc::now(), state.stats_top_components);
    json_response(
        json!({
            "snapshot": snapshot_payload(&set),
            "windows": windows,
        }),
        StatusCode::OK,
    )
}

async fn api_preview(State(state): State<AppState>) -> Response {
    let set = state.store.events().await;
    let today = Utc::now().format("%Y-%m-%d").to_string();
    json_response(
        preview_payload(&set, &today, state.preview_rows),
        StatusCode::OK,
    )
}

async fn api_reload(State(state): State<AppState>) -> Response {
    let set = state.store.reload().await;
    json_response(
        json!({
            "ok": set.error.is_none(),
            "events": set.events.len(),
            "snapshot": snapshot_payload(&set),
        }),
        StatusCode::OK,
    )
}

async fn static_fallback(State(state): State<AppState>, uri: Uri) -> Response {
    let requested = uri.path();
    if requested.contains("..") {
        return json_response(
            json!({"ok": false, "error": "forbidden"}),
            StatusCode::FORBIDDEN,
        );
    }

    let file_path = if requested == "/" || requested.is_empty() {
        state.static_dir.join("index.html")
    } else {
        let mut target = state.static_dir.join(requested.trim_start_matches('/'));
        if target.is_dir() {
            target.push("index.html");
        }
        target
    };

    let canonical_root = match tokio::fs::canonicalize(&state.static_dir).await {
        Ok(path) => path,
        Err(error) => {
            return json_response(
                json!({"ok": false, "error": format!("static directory unavailable: {error}")}),
                StatusCode::INTERNAL_SERVER_ERROR,
            );
        }
    };

    let canonical_file = match tokio::fs::canonicalize(&file_path).await {
        Ok(path) => path,
        Err(_) => {
            return json_response(
                json!({"ok": false, "error": "not found"}),
                StatusCode::NOT_FOUND,
            );
        }
    };

    if !canonical_file.starts_with(&canonical_root) {
        return json_response(
            json!({"ok": false, "error": "forbidden"}),
            StatusCode::FORBIDDEN,
        );
    }

    let bytes = match tokio::fs::read(&canonical_file).await {
        Ok(value) => value,
        Err(error) => {
            return json_response(
                json!({"ok": false, "error": format!("failed to read file: {error}")}),
                StatusCode::INTERNAL_SERVER_ERROR,
            );
        }
    };

    let content_type = mime_guess::from_path(&canonical_file)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    response
}
