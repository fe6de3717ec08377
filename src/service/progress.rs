use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, RwLock};

/// Phase of a city data request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Cache,
    Download,
    Error,
}

/// A progress milestone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub percentage: u8,
    pub message: String,
}

pub type ProgressCallback = dyn Fn(&ProgressEvent) -> anyhow::Result<()> + Send + Sync;

/// Observer list notified in registration order.
///
/// A callback that errors or panics is logged and skipped; it never aborts
/// the operation being reported on.
#[derive(Default, Clone)]
pub struct ProgressReporter {
    callbacks: Arc<RwLock<Vec<Arc<ProgressCallback>>>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_callback<F>(&self, callback: F)
    where
        F: Fn(&ProgressEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callbacks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::new(callback));
    }

    pub fn len(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn update(&self, stage: Stage, percentage: u8, message: &str) {
        let event = ProgressEvent {
            stage,
            percentage: percentage.min(100),
            message: message.to_string(),
        };
        self.notify(&event);
    }

    pub fn notify(&self, event: &ProgressEvent) {
        // Snapshot so callbacks may register further callbacks
        let callbacks: Vec<Arc<ProgressCallback>> = self
            .callbacks
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        for (index, callback) in callbacks.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(index, error = %e, "progress callback failed");
                }
                Err(_) => {
                    tracing::warn!(index, "progress callback panicked");
                }
            }
        }
    }
}

/// Collects every event it sees; used to echo progress back in API responses
#[derive(Debug, Default, Clone)]
pub struct ProgressLog {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reporter whose only observer appends to this log
    pub fn reporter(&self) -> ProgressReporter {
        let reporter = ProgressReporter::new();
        let events = self.events.clone();
        reporter.add_callback(move |event| {
            events
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(event.clone());
            Ok(())
        });
        reporter
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
