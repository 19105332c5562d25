//! Recognition manager: configuration lifecycle, the job queue and the
//! single worker thread that drains it.
//!
//! States move `Uninitialized -> Initialized -> Running -> Uninitialized`;
//! every run needs a fresh `init`. Configuration can only change while not
//! running, and the worker reads a snapshot taken by `init`.

use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, info, warn};

use crate::config::{ActiveConfig, LadderConfig, ManagerConfig};
use crate::core::settings::RecognitionSettings;
use crate::error::{ConfigError, ManagerError, RecognitionError};
use crate::events::{EventDispatcher, EventKind, ManagerEvent, ManagerEventListener};
use crate::extract::ExtractContext;
use crate::layout::detector::LineDetector;
use crate::ocr::reference::{reference_image, REFERENCE_TEXT};
use crate::ocr::OcrEngine;
use crate::pages::{is_supported, PageSource};
use crate::pipeline::{RecognitionFailure, RecognitionOutcome, RecognitionPipeline, Target};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Uninitialized,
    Initialized,
    Running,
}

type Notify = Box<dyn FnOnce(RecognitionOutcome) + Send>;

struct Job {
    target: Target,
    notify: Notify,
}

impl Job {
    fn abort(self) {
        let failure = RecognitionFailure {
            id: self.target.id,
            source: self.target.source,
            error: RecognitionError::Aborted,
        };
        (self.notify)(Err(failure));
    }
}

/// Receives the single outcome of one submitted file.
#[derive(Debug)]
pub struct JobHandle {
    target: Target,
    rx: Receiver<RecognitionOutcome>,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.target.id
    }

    /// Blocks until the job finishes, fails or is aborted.
    pub fn wait(self) -> RecognitionOutcome {
        match self.rx.recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(self.dropped()),
        }
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<RecognitionOutcome> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn try_outcome(&self) -> Option<RecognitionOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(self.dropped())),
        }
    }

    fn dropped(&self) -> RecognitionFailure {
        RecognitionFailure {
            id: self.target.id.clone(),
            source: self.target.source.clone(),
            error: RecognitionError::Aborted,
        }
    }
}

struct Inner {
    state: ManagerState,
    config: ManagerConfig,
    active: Option<Arc<ActiveConfig>>,
    worker: Option<JoinHandle<()>>,
}

pub struct RecognitionManager {
    inner: Mutex<Inner>,
    running: Arc<AtomicBool>,
    sender: Sender<Job>,
    receiver: Receiver<Job>,
    events: Arc<EventDispatcher>,
    ctx: ExtractContext,
    pages: Arc<dyn PageSource>,
}

impl RecognitionManager {
    pub fn new(engine: Arc<dyn OcrEngine>, pages: Arc<dyn PageSource>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            inner: Mutex::new(Inner {
                state: ManagerState::Uninitialized,
                config: ManagerConfig::default(),
                active: None,
                worker: None,
            }),
            running: Arc::new(AtomicBool::new(false)),
            sender,
            receiver,
            events: Arc::new(EventDispatcher::default()),
            ctx: ExtractContext::new(engine),
            pages,
        }
    }

    pub fn with_config(self, config: ManagerConfig) -> Self {
        self.lock().config = config;
        self
    }

    pub fn with_detector(mut self, detector: Arc<dyn LineDetector>) -> Self {
        self.ctx.detector = detector;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ManagerState {
        self.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == ManagerState::Running
    }

    pub fn queue_len(&self) -> usize {
        self.receiver.len()
    }

    pub fn config(&self) -> ManagerConfig {
        self.lock().config.clone()
    }

    pub fn set_event_listener(&self, listener: Arc<dyn ManagerEventListener>) {
        self.events.set_listener(listener);
    }

    pub fn remove_event_listener(&self) {
        self.events.remove_listener();
    }

    pub fn set_temp_dir(&self, dir: impl Into<PathBuf>) -> Result<(), ConfigError> {
        let dir = dir.into();
        self.configure("temporary directory", |config| config.temp_dir = Some(dir))
    }

    pub fn set_debug_output(&self, enabled: bool) -> Result<(), ConfigError> {
        self.configure("debug output", |config| config.debug_output = enabled)
    }

    pub fn set_ladder(&self, ladder: impl Into<LadderConfig>) -> Result<(), ConfigError> {
        let ladder = ladder.into();
        self.configure("settings ladder", |config| config.ladder = ladder)
    }

    pub fn set_poll_interval(&self, interval: Duration) -> Result<(), ConfigError> {
        let millis = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self.configure("poll interval", |config| config.poll_interval_ms = millis)
    }

    pub fn set_self_test(&self, enabled: bool) -> Result<(), ConfigError> {
        self.configure("self-test", |config| config.self_test = enabled)
    }

    fn configure(&self, what: &str, apply: impl FnOnce(&mut ManagerConfig)) -> Result<(), ConfigError> {
        {
            let mut inner = self.lock();
            if inner.state != ManagerState::Running {
                apply(&mut inner.config);
                return Ok(());
            }
        }
        let err = ConfigError::Running;
        self.events.fire(
            ManagerEvent::new(EventKind::Miscellaneous, format!("can't change {what}"))
                .with_cause(&err),
        );
        Err(err)
    }

    /// Prepares directories and checks the engine, verifying its answer
    /// when the configuration asks for it.
    pub fn init(&self) -> Result<(), ManagerError> {
        let verify = self.lock().config.self_test;
        self.init_with(verify)
    }

    /// Like [`init`](Self::init); the engine always reads the reference
    /// image, but its answer is only checked when `verify` is set.
    pub fn init_with(&self, verify: bool) -> Result<(), ManagerError> {
        let result = self.try_init(verify);
        if let Err(err) = &result {
            self.events.fire(
                ManagerEvent::new(EventKind::System, "initialization failed").with_cause(err),
            );
        }
        result
    }

    fn try_init(&self, verify: bool) -> Result<(), ManagerError> {
        let config = {
            let inner = self.lock();
            if inner.state == ManagerState::Running {
                return Err(ConfigError::Running.into());
            }
            inner.config.clone()
        };

        let active = config.activate()?;
        self.self_test(verify)?;

        let mut inner = self.lock();
        if inner.state == ManagerState::Running {
            return Err(ConfigError::Running.into());
        }
        info!(
            temp_dir = %active.temp_dir.display(),
            debug = active.debug_dir.is_some(),
            steps = active.ladder.len(),
            "recognition manager initialized"
        );
        inner.active = Some(Arc::new(active));
        inner.state = ManagerState::Initialized;
        Ok(())
    }

    fn self_test(&self, verify: bool) -> Result<(), ManagerError> {
        let page = self
            .ctx
            .engine
            .recognize(&reference_image(), None, &RecognitionSettings::SELF_TEST)
            .map_err(ManagerError::SelfTestEngine)?;
        let text = page.text();
        let text = text.trim();
        if verify && !text.eq_ignore_ascii_case(REFERENCE_TEXT) {
            return Err(ManagerError::SelfTest(text.to_string()));
        }
        debug!(engine = self.ctx.engine.name(), read = text, verify, "self-test done");
        Ok(())
    }

    /// Spawns the worker. Starting a running manager is a no-op.
    pub fn start(&self) -> Result<(), ManagerError> {
        let mut inner = self.lock();
        let active = match (inner.state, inner.active.clone()) {
            (ManagerState::Running, _) => return Ok(()),
            (ManagerState::Initialized, Some(active)) => active,
            _ => {
                drop(inner);
                let err = ManagerError::NotInitialized;
                self.events
                    .fire(ManagerEvent::new(EventKind::System, "can't start").with_cause(&err));
                return Err(err);
            }
        };

        self.running.store(true, Ordering::SeqCst);
        let worker = Worker {
            receiver: self.receiver.clone(),
            running: Arc::clone(&self.running),
            events: Arc::clone(&self.events),
            pipeline: RecognitionPipeline::new(self.ctx.clone(), Arc::clone(&self.pages)),
            config: active,
        };
        let handle = thread::Builder::new()
            .name("fieldscan-worker".to_string())
            .spawn(move || worker.run());

        match handle {
            Ok(handle) => {
                inner.worker = Some(handle);
                inner.state = ManagerState::Running;
                info!("recognition manager started");
                Ok(())
            }
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                Err(ManagerError::Worker(err.to_string()))
            }
        }
    }

    /// Stops the worker after its current target and aborts every queued
    /// one. The manager must be initialized again before the next start.
    pub fn stop(&self) {
        let worker = {
            let mut inner = self.lock();
            inner.state = ManagerState::Uninitialized;
            inner.active = None;
            inner.worker.take()
        };
        self.running.store(false, Ordering::SeqCst);

        if let Some(worker) = worker {
            if worker.join().is_err() {
                self.events.fire(ManagerEvent::new(
                    EventKind::System,
                    "recognition worker terminated abnormally",
                ));
            }
            info!("recognition manager stopped");
        }
        abort_queued(&self.receiver);
    }

    /// Queues one file; the handle receives its outcome.
    pub fn push_file(&self, path: impl Into<PathBuf>) -> JobHandle {
        let target = Target::new(path);
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.enqueue(
            target.clone(),
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        JobHandle { target, rx }
    }

    /// Queues one file; `on_done` runs on the worker thread with its outcome.
    pub fn push_file_with(
        &self,
        path: impl Into<PathBuf>,
        on_done: impl FnOnce(RecognitionOutcome) + Send + 'static,
    ) {
        self.enqueue(Target::new(path), Box::new(on_done));
    }

    /// Queues every supported file directly inside `dir`, in name order.
    pub fn push_all_files(&self, dir: &Path) -> io::Result<Vec<JobHandle>> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && is_supported(path))
            .collect();
        files.sort();
        Ok(files.into_iter().map(|path| self.push_file(path)).collect())
    }

    fn enqueue(&self, target: Target, notify: Notify) {
        debug!(id = %target.id, "queued");
        if let Err(rejected) = self.sender.send(Job { target, notify }) {
            rejected.into_inner().abort();
        }
    }
}

impl Drop for RecognitionManager {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    receiver: Receiver<Job>,
    running: Arc<AtomicBool>,
    events: Arc<EventDispatcher>,
    pipeline: RecognitionPipeline,
    config: Arc<ActiveConfig>,
}

impl Worker {
    fn run(self) {
        self.clean_working_dir();
        while self.running.load(Ordering::SeqCst) {
            match self.receiver.recv_timeout(self.config.poll_interval) {
                Ok(job) => self.process(job),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        abort_queued(&self.receiver);
    }

    fn process(&self, job: Job) {
        let Job { target, notify } = job;
        info!(id = %target.id, source = %target.source.display(), "recognizing");

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.pipeline.process(&target, &self.config, &self.events)
        }))
        .unwrap_or_else(|payload| Err(RecognitionError::Internal(panic_message(payload.as_ref()))));
        self.clean_working_dir();

        let outcome = match result {
            Ok(report) => {
                info!(
                    id = %report.id,
                    document_type = ?report.document_type,
                    completeness = report.completeness,
                    "recognition finished"
                );
                Ok(report)
            }
            Err(error) => {
                self.events.fire(
                    ManagerEvent::new(EventKind::Recognition, format!("can't recognize {}", target.id))
                        .with_file(&target.source)
                        .with_cause(&error),
                );
                Err(RecognitionFailure {
                    id: target.id.clone(),
                    source: target.source.clone(),
                    error,
                })
            }
        };

        if panic::catch_unwind(AssertUnwindSafe(move || notify(outcome))).is_err() {
            warn!(id = %target.id, "result callback panicked");
        }
    }

    fn clean_working_dir(&self) {
        if let Err(err) = clean_dir(&self.config.working_dir) {
            warn!(dir = %self.config.working_dir.display(), error = %err, "can't clean working directory");
        }
    }
}

fn abort_queued(receiver: &Receiver<Job>) {
    let mut aborted = 0;
    for job in receiver.try_iter() {
        job.abort();
        aborted += 1;
    }
    if aborted > 0 {
        info!(aborted, "queued targets aborted");
    }
}

/// Removes everything inside `dir`, keeping `dir` itself.
fn clean_dir(dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic during recognition".to_string()
    }
}
