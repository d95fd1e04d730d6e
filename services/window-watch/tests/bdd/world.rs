//! BDD test world for window watch service

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cucumber::World;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use window_watch::engine::{Command, Engine};
use window_watch::factory::ComponentFactory;
use window_watch::scanner::Scanner;
use window_watch::sender::Sender;
use window_watch::status::{new_status_handle, StatusHandle, StatusSnapshot};
use window_watch::{Config, WatchError};

/// What the test scanner reports on each scan
#[derive(Debug, Clone, Default)]
pub enum ScanScript {
    #[default]
    Nothing,
    Always(Vec<String>),
    /// A different message on every scan
    Counting,
    Failing,
    Slow(Duration),
}

#[derive(Debug)]
struct ScriptedScanner {
    script: ScanScript,
    calls: AtomicU32,
}

#[async_trait::async_trait]
impl Scanner for ScriptedScanner {
    fn type_name(&self) -> &str {
        "scripted"
    }

    async fn scan(&self, _pattern: &str) -> window_watch::Result<Vec<String>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            ScanScript::Nothing => Ok(Vec::new()),
            ScanScript::Always(snippets) => Ok(snippets.clone()),
            ScanScript::Counting => Ok(vec![format!("message {}", call + 1)]),
            ScanScript::Failing => Err(WatchError::SurfaceUnavailable(
                "window not found".to_string(),
            )),
            ScanScript::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Vec::new())
            }
        }
    }
}

#[derive(Debug, Default)]
struct RecordingSender {
    messages: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Sender for RecordingSender {
    fn type_name(&self) -> &str {
        "recording"
    }

    async fn send(&self, message: &str) -> window_watch::Result<()> {
        self.messages
            .lock()
            .map_err(|_| WatchError::Sender("poisoned".to_string()))?
            .push(message.to_string());
        Ok(())
    }
}

struct ScriptedFactory {
    scanner: Arc<ScriptedScanner>,
    sender: Arc<RecordingSender>,
    scanner_builds: AtomicU32,
}

impl ComponentFactory for ScriptedFactory {
    fn build_scanner(&self) -> window_watch::Result<Arc<dyn Scanner>> {
        self.scanner_builds.fetch_add(1, Ordering::SeqCst);
        Ok(self.scanner.clone())
    }

    fn build_sender(&self) -> window_watch::Result<Arc<dyn Sender>> {
        Ok(self.sender.clone())
    }
}

/// Everything observable after the engine ran its cycles
#[derive(Debug)]
pub struct RunOutcome {
    pub waits: Vec<u64>,
    pub messages: Vec<String>,
    pub history: Vec<String>,
    pub status: StatusSnapshot,
    pub scanner_builds: u32,
}

impl RunOutcome {
    /// Messages that were matches rather than error or healthcheck reports
    pub fn matches(&self) -> Vec<String> {
        self.messages
            .iter()
            .filter(|m| !m.starts_with("error:") && !m.starts_with("healthcheck:"))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Default, World)]
pub struct WatchWorld {
    pub dir: Option<tempfile::TempDir>,
    pub config: Config,
    pub script: ScanScript,
    pub outcome: Option<RunOutcome>,

    // Dashboard testing
    pub status: Option<StatusHandle>,
    pub commands: Option<mpsc::Receiver<Command>>,
    pub response_status: Option<u16>,
    pub response_body: Option<String>,
}

impl WatchWorld {
    pub fn history_path(&mut self) -> PathBuf {
        self.dir
            .get_or_insert_with(|| tempfile::tempdir().expect("failed to create temp dir"))
            .path()
            .join("history.json")
    }

    /// Run `cycles` iterations on a fresh engine with a paused clock
    pub fn run_cycles(&mut self, cycles: usize) {
        let config = Config {
            history_file: self.history_path(),
            ..self.config.clone()
        };
        let script = self.script.clone();

        let outcome = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .start_paused(true)
                .build()
                .expect("failed to build runtime");
            runtime.block_on(run_engine(config, script, cycles))
        })
        .join()
        .expect("engine thread panicked");

        self.outcome = Some(outcome);
    }

    pub fn outcome(&self) -> &RunOutcome {
        self.outcome.as_ref().expect("engine has not run")
    }
}

async fn run_engine(config: Config, script: ScanScript, cycles: usize) -> RunOutcome {
    let factory = Arc::new(ScriptedFactory {
        scanner: Arc::new(ScriptedScanner {
            script,
            calls: AtomicU32::new(0),
        }),
        sender: Arc::new(RecordingSender::default()),
        scanner_builds: AtomicU32::new(0),
    });
    let status = new_status_handle(config.dashboard.history_size);
    let (_tx, rx) = mpsc::channel(1);

    let mut engine = Engine::new(
        &config,
        factory.clone(),
        status.clone(),
        rx,
        CancellationToken::new(),
    )
    .expect("failed to build engine");

    let mut waits = Vec::with_capacity(cycles);
    for _ in 0..cycles {
        waits.push(engine.run_once().await.as_secs());
    }

    let outcome = RunOutcome {
        waits,
        messages: factory.sender.messages.lock().expect("poisoned").clone(),
        history: engine
            .history()
            .items()
            .iter()
            .map(|item| item.text.clone())
            .collect(),
        status: status.snapshot(),
        scanner_builds: factory.scanner_builds.load(Ordering::SeqCst),
    };
    outcome
}
