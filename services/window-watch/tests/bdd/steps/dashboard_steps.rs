//! BDD step definitions for dashboard feature

use axum::body::Body;
use axum::http::Request;
use chrono::Utc;
use cucumber::{given, then, when};
use tokio::sync::mpsc;
use tower::ServiceExt;

use window_watch::dashboard::build_router;
use window_watch::engine::Command;
use window_watch::status::new_status_handle;

use crate::world::WatchWorld;

fn parse_command(s: &str) -> Command {
    match s {
        "Pause" => Command::Pause,
        "Resume" => Command::Resume,
        "ScanNow" => Command::ScanNow,
        other => panic!("Unknown command: {}", other),
    }
}

#[given("a dashboard for a running engine")]
fn dashboard_for_engine(world: &mut WatchWorld) {
    let status = new_status_handle(10);
    status.set_running(true);
    world.status = Some(status);
}

#[given(expr = "the last match was {string}")]
fn last_match(world: &mut WatchWorld, text: String) {
    let status = world.status.as_ref().expect("status not set");
    status.mark_match(&text, Utc::now());
}

#[when(expr = "a {word} request is sent to {string}")]
async fn send_request(world: &mut WatchWorld, method: String, path: String) {
    let status = world.status.as_ref().expect("status not set").clone();
    let (tx, rx) = mpsc::channel(4);
    world.commands = Some(rx);

    let request = Request::builder()
        .method(method.as_str())
        .uri(path.as_str())
        .body(Body::empty())
        .expect("invalid request");
    let response = build_router(status, tx)
        .oneshot(request)
        .await
        .expect("request failed");

    world.response_status = Some(response.status().as_u16());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    world.response_body = Some(String::from_utf8_lossy(&bytes).to_string());
}

#[then(expr = "the response status is {int}")]
fn response_status(world: &mut WatchWorld, status: u16) {
    assert_eq!(world.response_status, Some(status));
}

#[then(expr = "the engine receives a {string} command")]
fn engine_receives(world: &mut WatchWorld, command: String) {
    let rx = world.commands.as_mut().expect("no request sent");
    assert_eq!(rx.try_recv().ok(), Some(parse_command(&command)));
}

#[then(expr = "the status field {string} is {string}")]
fn status_field(world: &mut WatchWorld, field: String, value: String) {
    let body = world.response_body.as_ref().expect("no response");
    let json: serde_json::Value = serde_json::from_str(body).expect("not json");
    assert_eq!(json[field.as_str()], value.as_str());
}
