//! Test doubles for the session runtime

use super::SessionEvent;
use crate::platform::{Payload, Platform};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;

const EVENT_WAIT: Duration = Duration::from_secs(5);

/// Platform that records every payload sent through it
#[derive(Debug, Default)]
pub struct RecordingPlatform {
    sent: Mutex<Vec<(String, Payload)>>,
}

#[allow(dead_code)]
impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, Payload)> {
        self.sent.lock().unwrap().clone()
    }

    /// Text replies for one session, in order
    pub fn texts_for(&self, session_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == session_id)
            .filter_map(|(_, payload)| match payload {
                Payload::Text(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Platform for RecordingPlatform {
    fn send(&self, session_id: &str, payload: Payload) {
        self.sent.lock().unwrap().push((session_id.to_string(), payload));
    }
}

/// Next event, failing the test if none arrives in time
pub async fn next_event(rx: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(EVENT_WAIT, rx.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("session event channel closed")
}

/// Every event up to and including `Closed`
pub async fn collect_until_closed(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    loop {
        let event = next_event(rx).await;
        let closed = matches!(event, SessionEvent::Closed { .. });
        events.push(event);
        if closed {
            return events;
        }
    }
}
