//! Web dashboard with JSON status endpoints and pause/resume/scan controls

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::mpsc;

use crate::engine::Command;
use crate::status::StatusHandle;

/// Dashboard application state
#[derive(Clone)]
pub struct DashboardState {
    pub status: StatusHandle,
    pub commands: mpsc::Sender<Command>,
}

/// Build the dashboard axum router
pub fn build_router(status: StatusHandle, commands: mpsc::Sender<Command>) -> Router {
    let dashboard_state = DashboardState { status, commands };

    Router::new()
        .route("/", get(index_handler))
        .route("/api/status", get(status_handler))
        .route("/api/recent", get(recent_handler))
        .route("/api/pause", post(pause_handler))
        .route("/api/resume", post(resume_handler))
        .route("/api/scan", post(scan_handler))
        .route("/health", get(health_handler))
        .with_state(dashboard_state)
}

async fn index_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let status = dashboard.status.snapshot();
    let state_label = if !status.running {
        "Stopped"
    } else if status.paused {
        "Paused"
    } else {
        "Running"
    };

    let rows: String = dashboard
        .status
        .recent_deliveries()
        .iter()
        .rev()
        .map(|d| {
            let outcome = if d.success { "OK" } else { "Failed" };
            format!(
                r#"<tr><td>{}</td><td>{:?}</td><td>{}</td><td>{}</td><td>{}</td></tr>"#,
                d.at.format("%Y-%m-%d %H:%M:%S"),
                d.kind,
                escape_html(&d.message),
                d.sender,
                outcome
            )
        })
        .collect();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Window Watch</title>
</head>
<body style="font-family: system-ui, sans-serif; max-width: 960px; margin: 0 auto; padding: 1rem;">
    <h1>Window Watch</h1>
    <p>State: <strong>{}</strong> &middot; uptime {}s &middot; consecutive errors {} &middot; total errors {}</p>
    <p>Last match: {}</p>
    <p>Last error: {}</p>
    <form method="post" action="/api/pause" style="display:inline"><button>Pause</button></form>
    <form method="post" action="/api/resume" style="display:inline"><button>Resume</button></form>
    <form method="post" action="/api/scan" style="display:inline"><button>Scan now</button></form>
    <h2>Recent deliveries</h2>
    <table style="width: 100%; border-collapse: collapse;">
        <thead><tr><th>Time</th><th>Kind</th><th>Message</th><th>Sender</th><th>Status</th></tr></thead>
        <tbody>{}</tbody>
    </table>
</body>
</html>"#,
        state_label,
        status.uptime_seconds,
        status.error_count,
        status.total_errors,
        escape_html(status.last_match.as_deref().unwrap_or("none")),
        escape_html(status.last_error.as_deref().unwrap_or("none")),
        rows
    );

    Html(html)
}

async fn status_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    Json(dashboard.status.snapshot())
}

async fn recent_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    Json(dashboard.status.recent_deliveries())
}

async fn pause_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    forward(&dashboard, Command::Pause).await
}

async fn resume_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    forward(&dashboard, Command::Resume).await
}

async fn scan_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    forward(&dashboard, Command::ScanNow).await
}

async fn forward(dashboard: &DashboardState, command: Command) -> StatusCode {
    match dashboard.commands.send(command).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => {
            tracing::warn!("Dropping {:?}, engine is not listening", command);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
