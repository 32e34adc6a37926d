//! Debounced extraction scheduling
//!
//! One pending timer per chat id. Re-scheduling within the debounce window
//! replaces the timer instead of stacking tasks, so a burst of collector
//! batches ends in exactly one extraction run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::extract::ChatExtractor;

/// Per-chat one-shot timer wheel
pub struct ExtractionScheduler {
    debounce: Duration,
    extractor: Arc<dyn ChatExtractor>,
    timers: Arc<Mutex<HashMap<Uuid, JoinHandle<()>>>>,
}

impl ExtractionScheduler {
    pub fn new(debounce: Duration, extractor: Arc<dyn ChatExtractor>) -> Self {
        Self {
            debounce,
            extractor,
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Schedule (or re-arm) the extraction timer for a chat
    pub fn schedule(&self, chat_id: Uuid, client_id: Option<String>) {
        let extractor = Arc::clone(&self.extractor);
        let timers = Arc::clone(&self.timers);
        let debounce = self.debounce;

        let handle = tokio::spawn(async move {
            if !debounce.is_zero() {
                tokio::time::sleep(debounce).await;
            }
            extractor.extract_chat(chat_id, client_id.as_deref()).await;
            timers.lock().remove(&chat_id);
        });

        let mut timers = self.timers.lock();
        if let Some(previous) = timers.insert(chat_id, handle) {
            debug!(chat_id = %chat_id, "debounce timer re-armed");
            previous.abort();
        }
    }

    /// Pending timer count (diagnostics)
    pub fn pending(&self) -> usize {
        self.timers.lock().len()
    }
}
