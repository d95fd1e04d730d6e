//! BDD step definitions for the sent-message history

use chrono::{Duration, Utc};
use cucumber::{given, then};

use window_watch::history::HistoryItem;

use crate::world::WatchWorld;

#[given(expr = "{string} was sent {int} seconds ago")]
fn previously_sent(world: &mut WatchWorld, text: String, seconds: i64) {
    let path = world.history_path();
    let mut items: Vec<HistoryItem> = window_watch::history::load(&path);
    items.push(HistoryItem {
        text,
        sent_at: Utc::now() - Duration::seconds(seconds),
    });
    std::fs::write(&path, serde_json::to_string(&items).expect("serialize history"))
        .expect("write history");
}

#[given(expr = "a history cap of {int}")]
fn history_cap(world: &mut WatchWorld, max: usize) {
    world.config.max_history = max;
}

#[then(expr = "the history holds {int} entries")]
fn history_len(world: &mut WatchWorld, count: usize) {
    assert_eq!(world.outcome().history.len(), count);
}

#[then(expr = "the history holds messages {int} to {int} in order")]
fn history_range(world: &mut WatchWorld, first: usize, last: usize) {
    let expected: Vec<String> = (first..=last).map(|i| format!("message {}", i)).collect();
    assert_eq!(world.outcome().history, expected);
}

#[then("the history file matches memory")]
fn history_file_matches(world: &mut WatchWorld) {
    let path = world.history_path();
    let on_disk: Vec<String> = window_watch::history::load(&path)
        .into_iter()
        .map(|item| item.text)
        .collect();
    assert_eq!(on_disk, world.outcome().history);
}
