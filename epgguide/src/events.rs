//! Fire-and-forget broadcast of data-change notifications.

use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};

/// Notification broadcast to external collaborators (UI refresh,
/// plugin reaction hooks). Deliberately payload-free: "something
/// changed" is the whole message, consumers re-read through the read
/// API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuideEvent {
    DataChanged,
}

#[derive(Debug, Clone, Default)]
pub struct GuideEventBus {
    subscribers: Arc<Mutex<Vec<Sender<GuideEvent>>>>,
}

impl GuideEventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> Receiver<GuideEvent> {
        let (tx, rx) = unbounded::<GuideEvent>();
        {
            let mut subscribers = self.subscribers.lock().unwrap();
            subscribers.push(tx);
        }
        rx
    }

    pub(crate) fn broadcast(&self, event: GuideEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
