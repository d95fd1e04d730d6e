//! BDD step definitions for the notification loop

use std::time::Duration;

use cucumber::gherkin::Step;
use cucumber::{given, then, when};

use crate::world::{ScanScript, WatchWorld};

#[given("a scanner that always reports:")]
fn scanner_always_reports(world: &mut WatchWorld, step: &Step) {
    let table = step.table.as_ref().expect("step needs a table");
    let snippets = table
        .rows
        .iter()
        .filter_map(|row| row.first().cloned())
        .collect();
    world.script = ScanScript::Always(snippets);
}

#[given("a scanner that reports a new message every cycle")]
fn scanner_counting(world: &mut WatchWorld) {
    world.script = ScanScript::Counting;
}

#[given("a scanner that cannot find the window")]
fn scanner_failing(world: &mut WatchWorld) {
    world.script = ScanScript::Failing;
}

#[given(expr = "a scanner that takes {int} seconds per scan")]
fn scanner_slow(world: &mut WatchWorld, seconds: u64) {
    world.script = ScanScript::Slow(Duration::from_secs(seconds));
}

#[given(expr = "a debounce of {int} seconds")]
fn debounce(world: &mut WatchWorld, seconds: i64) {
    world.config.debounce_seconds = seconds;
}

#[given(expr = "a poll interval of {int} second(s)")]
fn poll_interval(world: &mut WatchWorld, seconds: u64) {
    world.config.poll_interval_seconds = seconds;
}

#[given(expr = "an error backoff from {int} to {int} seconds")]
fn error_backoff(world: &mut WatchWorld, base: u64, max: u64) {
    world.config.error_backoff_base_seconds = base;
    world.config.error_backoff_max_seconds = max;
}

#[given(expr = "a watchdog timeout of {int} seconds with restart enabled")]
fn watchdog_with_restart(world: &mut WatchWorld, seconds: u64) {
    world.config.watchdog_timeout_seconds = seconds;
    world.config.watchdog_restart = true;
}

#[given(expr = "a watchdog timeout of {int} seconds with restart disabled")]
fn watchdog_without_restart(world: &mut WatchWorld, seconds: u64) {
    world.config.watchdog_timeout_seconds = seconds;
    world.config.watchdog_restart = false;
}

#[when(expr = "the engine runs {int} cycle(s)")]
fn engine_runs(world: &mut WatchWorld, cycles: usize) {
    world.run_cycles(cycles);
}

#[then(expr = "exactly {int} message(s) is/are sent")]
fn messages_sent(world: &mut WatchWorld, count: usize) {
    assert_eq!(world.outcome().matches().len(), count);
}

#[then(expr = "the message {string} is sent")]
fn message_sent(world: &mut WatchWorld, text: String) {
    assert!(
        world.outcome().matches().contains(&text),
        "{:?} not among {:?}",
        text,
        world.outcome().matches()
    );
}

#[then(expr = "the waits are {string} seconds")]
fn waits_are(world: &mut WatchWorld, expected: String) {
    let expected: Vec<u64> = expected
        .split(',')
        .map(|s| s.trim().parse().expect("not a number"))
        .collect();
    assert_eq!(world.outcome().waits, expected);
}

#[then(expr = "the consecutive error count is {int}")]
fn consecutive_errors(world: &mut WatchWorld, count: u32) {
    assert_eq!(world.outcome().status.error_count, count);
}

#[then(expr = "an error mentioning {string} is recorded")]
fn error_recorded(world: &mut WatchWorld, fragment: String) {
    let last_error = world
        .outcome()
        .status
        .last_error
        .clone()
        .expect("no error recorded");
    assert!(last_error.contains(&fragment), "last error: {}", last_error);
}

#[then(expr = "an error notification mentioning {string} is sent")]
fn error_notified(world: &mut WatchWorld, fragment: String) {
    assert!(world
        .outcome()
        .messages
        .iter()
        .any(|m| m.starts_with("error:") && m.contains(&fragment)));
}

#[then(expr = "the scanner has been built {int} time(s)")]
fn scanner_builds(world: &mut WatchWorld, count: u32) {
    assert_eq!(world.outcome().scanner_builds, count);
}
