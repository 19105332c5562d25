use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Initialization and lifecycle failures.
    System,
    /// A target could not be recognized.
    Recognition,
    /// Rejected configuration changes, debug output failures and the like.
    Miscellaneous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerEvent {
    pub kind: EventKind,
    pub message: String,
    pub file: Option<PathBuf>,
    pub cause: Option<String>,
}

impl ManagerEvent {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            file: None,
            cause: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_cause(mut self, cause: &dyn std::error::Error) -> Self {
        self.cause = Some(cause.to_string());
        self
    }
}

/// Receives manager notifications. Called on the thread that raised the
/// event, usually the worker; a slow listener stalls recognition.
pub trait ManagerEventListener: Send + Sync {
    fn system_exception(&self, _event: &ManagerEvent) {}

    fn recognition_exception(&self, _event: &ManagerEvent) {}

    fn miscellaneous_exception(&self, _event: &ManagerEvent) {}
}

#[derive(Default)]
pub struct EventDispatcher {
    listener: Mutex<Option<Arc<dyn ManagerEventListener>>>,
}

impl EventDispatcher {
    pub fn set_listener(&self, listener: Arc<dyn ManagerEventListener>) {
        if let Ok(mut slot) = self.listener.lock() {
            *slot = Some(listener);
        }
    }

    pub fn remove_listener(&self) {
        if let Ok(mut slot) = self.listener.lock() {
            *slot = None;
        }
    }

    pub fn fire(&self, event: ManagerEvent) {
        match event.kind {
            EventKind::System | EventKind::Recognition => error!(
                kind = ?event.kind,
                file = ?event.file,
                cause = event.cause.as_deref().unwrap_or("-"),
                "{}",
                event.message
            ),
            EventKind::Miscellaneous => warn!(
                file = ?event.file,
                cause = event.cause.as_deref().unwrap_or("-"),
                "{}",
                event.message
            ),
        }

        // Clone out of the lock so a listener may call back into the manager.
        let listener = self.listener.lock().ok().and_then(|slot| slot.clone());
        let Some(listener) = listener else {
            return;
        };
        match event.kind {
            EventKind::System => listener.system_exception(&event),
            EventKind::Recognition => listener.recognition_exception(&event),
            EventKind::Miscellaneous => listener.miscellaneous_exception(&event),
        }
    }
}
