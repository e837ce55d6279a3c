//! Outbound boundary towards transports
//!
//! Bodies reply through a [`Platform`]. Sending is fire-and-forget: the engine
//! never waits on or inspects delivery.

use crate::session::{FileInfo, Session};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A message sent from the agent to a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum Payload {
    Text(String),
    Markdown(String),
    Html(String),
    File(FileInfo),
    Options(Vec<String>),
    Location { latitude: f64, longitude: f64 },
}

/// A communication channel (websocket, chat service, ...)
pub trait Platform: Send + Sync {
    /// Deliver a payload to the user behind `session_id`
    fn send(&self, session_id: &str, payload: Payload);

    fn reply(&self, session: &Session, message: &str) {
        self.send(session.id(), Payload::Text(message.to_string()));
    }

    fn reply_markdown(&self, session: &Session, message: &str) {
        self.send(session.id(), Payload::Markdown(message.to_string()));
    }

    fn reply_html(&self, session: &Session, message: &str) {
        self.send(session.id(), Payload::Html(message.to_string()));
    }

    fn reply_file(&self, session: &Session, file: FileInfo) {
        self.send(session.id(), Payload::File(file));
    }

    fn reply_options(&self, session: &Session, options: Vec<String>) {
        self.send(session.id(), Payload::Options(options));
    }

    fn reply_location(&self, session: &Session, latitude: f64, longitude: f64) {
        self.send(
            session.id(),
            Payload::Location {
                latitude,
                longitude,
            },
        );
    }
}

/// A payload addressed to a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outgoing {
    pub session_id: String,
    pub payload: Payload,
}

/// Platform that hands payloads to a transport task over a channel
#[derive(Debug, Clone)]
pub struct ChannelPlatform {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl ChannelPlatform {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Platform for ChannelPlatform {
    fn send(&self, session_id: &str, payload: Payload) {
        let outgoing = Outgoing {
            session_id: session_id.to_string(),
            payload,
        };
        if self.tx.send(outgoing).is_err() {
            tracing::debug!(session_id = %session_id, "Transport gone, dropping payload");
        }
    }
}
