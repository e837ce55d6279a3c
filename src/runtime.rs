//! Session runtime
//!
//! Each live session is owned by one tokio task fed through a bounded inbox,
//! so stimuli for a session are applied and stepped one at a time while
//! different sessions progress in parallel. Every task shares the same
//! immutable [`StateMachine`].

mod executor;

#[cfg(test)]
pub mod testing;

use executor::SessionRuntime;

use crate::config::EngineConfig;
use crate::error::RuntimeError;
use crate::session::Stimulus;
use crate::state_machine::{StateMachine, StepOutcome};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};

const BROADCAST_CAPACITY: usize = 128;

/// Messages accepted by a session task
#[derive(Debug)]
pub(crate) enum Inbound {
    Stimulus(Stimulus),
    Close,
}

/// Why a session task stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Requested,
    Idle,
    /// A body panicked; the session state is lost
    Failed,
    Shutdown,
}

/// Events broadcast to subscribers of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        session_id: String,
        path: Vec<String>,
    },
    Stepped {
        session_id: String,
        outcome: StepOutcome,
    },
    /// The step overran its budget. It keeps running and its outcome follows.
    StepTimedOut {
        session_id: String,
        state: String,
        budget_ms: u64,
    },
    Closed {
        session_id: String,
        reason: CloseReason,
    },
}

/// Handle to interact with a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inbox: mpsc::Sender<Inbound>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    epoch: u64,
}

impl SessionHandle {
    /// Queue a stimulus. Waits while the inbox is full.
    pub async fn send(&self, session_id: &str, stimulus: Stimulus) -> Result<(), RuntimeError> {
        self.inbox
            .send(Inbound::Stimulus(stimulus))
            .await
            .map_err(|_| RuntimeError::SessionClosed(session_id.to_string()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }
}

pub(crate) type Registry = Arc<RwLock<HashMap<String, SessionHandle>>>;

/// Manager for all session runtimes of one agent
pub struct SessionManager {
    machine: Arc<StateMachine>,
    config: EngineConfig,
    sessions: Registry,
    next_epoch: AtomicU64,
}

impl SessionManager {
    pub fn new(machine: Arc<StateMachine>, config: EngineConfig) -> Self {
        Self {
            machine,
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_epoch: AtomicU64::new(0),
        }
    }

    pub fn machine(&self) -> &Arc<StateMachine> {
        &self.machine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the handle of a running session, starting it if needed, along
    /// with a receiver for its events.
    ///
    /// A new session enters the initial state and runs its body on its own
    /// task. The receiver is subscribed before that task is spawned, so it
    /// always sees `Started`.
    pub async fn get_or_create(
        &self,
        session_id: &str,
    ) -> (SessionHandle, broadcast::Receiver<SessionEvent>) {
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(session_id) {
                return (handle.clone(), handle.subscribe());
            }
        }

        let mut sessions = self.sessions.write().await;
        // Another caller may have won the race for the write lock
        if let Some(handle) = sessions.get(session_id) {
            return (handle.clone(), handle.subscribe());
        }

        let (inbox_tx, inbox_rx) = mpsc::channel(self.config.channel_capacity);
        let (broadcast_tx, events) = broadcast::channel(BROADCAST_CAPACITY);
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        let handle = SessionHandle {
            inbox: inbox_tx,
            broadcast_tx: broadcast_tx.clone(),
            epoch,
        };
        sessions.insert(session_id.to_string(), handle.clone());

        let session = self.machine.new_session(session_id);
        let runtime = SessionRuntime::new(
            Arc::clone(&self.machine),
            &self.config,
            inbox_rx,
            broadcast_tx,
        )
        .with_registry(Arc::clone(&self.sessions), epoch);
        tokio::spawn(runtime.run(session));

        tracing::info!(session_id = %session_id, agent = %self.machine.name(), "Session created");
        (handle, events)
    }

    /// Deliver a stimulus, starting the session if it is not running
    pub async fn send(&self, session_id: &str, stimulus: Stimulus) -> Result<(), RuntimeError> {
        let (handle, _) = self.get_or_create(session_id).await;
        handle.send(session_id, stimulus).await
    }

    pub async fn subscribe(
        &self,
        session_id: &str,
    ) -> Result<broadcast::Receiver<SessionEvent>, RuntimeError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(SessionHandle::subscribe)
            .ok_or_else(|| RuntimeError::SessionNotFound(session_id.to_string()))
    }

    /// Stop a session once the stimuli already queued for it are processed
    pub async fn close(&self, session_id: &str) -> Result<(), RuntimeError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| RuntimeError::SessionNotFound(session_id.to_string()))?;
        handle
            .inbox
            .send(Inbound::Close)
            .await
            .map_err(|_| RuntimeError::SessionClosed(session_id.to_string()))
    }

    pub async fn active_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{collect_until_closed, next_event, RecordingPlatform};
    use super::*;
    use crate::error::BodyError;
    use crate::platform::Platform;
    use crate::session::{IntentPrediction, Session};
    use crate::state_machine::StateMachineBuilder;
    use std::time::Duration;

    fn greeter(platform: Arc<RecordingPlatform>) -> Arc<StateMachine> {
        let mut builder = StateMachineBuilder::new("greeter");
        builder.intent("hello");

        let p = Arc::clone(&platform);
        builder
            .new_state("idle")
            .initial()
            .body(move |s: &mut Session| {
                p.reply(s, "ready");
                Ok(())
            })
            .when_intent_matched_go_to("hello", "greet");

        let p = Arc::clone(&platform);
        builder
            .new_state("greet")
            .body(move |s: &mut Session| {
                p.reply(s, "hi there");
                Ok(())
            })
            .go_to("idle");

        let p = platform;
        builder.global_fallback_body(move |s: &mut Session| {
            p.reply(s, "sorry?");
            Ok(())
        });
        Arc::new(builder.build().unwrap())
    }

    fn hello() -> Stimulus {
        Stimulus::Message {
            text: "hello".to_string(),
            prediction: Some(IntentPrediction::new("hello", 0.97)),
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            step_timeout: Duration::from_secs(5),
            session_idle_timeout: None,
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let platform = Arc::new(RecordingPlatform::new());
        let manager = SessionManager::new(greeter(Arc::clone(&platform)), config());

        let (_, mut events) = manager.get_or_create("alice").await;

        let started = next_event(&mut events).await;
        assert_eq!(
            started,
            SessionEvent::Started {
                session_id: "alice".to_string(),
                path: vec!["idle".to_string()],
            }
        );

        manager.send("alice", hello()).await.unwrap();
        match next_event(&mut events).await {
            SessionEvent::Stepped { outcome, .. } => {
                assert!(outcome.moved());
                assert_eq!(outcome.state(), "idle");
            }
            other => panic!("unexpected event {other:?}"),
        }

        assert_eq!(
            platform.texts_for("alice"),
            vec!["ready".to_string(), "hi there".to_string(), "ready".to_string()]
        );
        assert_eq!(manager.active_sessions().await, vec!["alice".to_string()]);

        manager.close("alice").await.unwrap();
        let tail = collect_until_closed(&mut events).await;
        assert_eq!(
            tail.last(),
            Some(&SessionEvent::Closed {
                session_id: "alice".to_string(),
                reason: CloseReason::Requested,
            })
        );
        assert!(manager.active_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let platform = Arc::new(RecordingPlatform::new());
        let manager = SessionManager::new(greeter(Arc::clone(&platform)), config());

        let (_, mut alice) = manager.get_or_create("alice").await;
        let (_, mut bob) = manager.get_or_create("bob").await;
        next_event(&mut alice).await;
        next_event(&mut bob).await;

        manager.send("bob", hello()).await.unwrap();
        manager
            .send(
                "alice",
                Stimulus::Message {
                    text: "blah".to_string(),
                    prediction: Some(IntentPrediction::new("other", 0.4)),
                },
            )
            .await
            .unwrap();
        next_event(&mut alice).await;
        next_event(&mut bob).await;

        assert_eq!(platform.texts_for("alice"), vec!["ready".to_string(), "sorry?".to_string()]);
        assert_eq!(platform.texts_for("bob").len(), 3);
        assert_eq!(
            manager.active_sessions().await,
            vec!["alice".to_string(), "bob".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unknown_session_errors() {
        let manager = SessionManager::new(greeter(Arc::new(RecordingPlatform::new())), config());
        assert!(matches!(
            manager.subscribe("ghost").await,
            Err(RuntimeError::SessionNotFound(_))
        ));
        assert!(matches!(
            manager.close("ghost").await,
            Err(RuntimeError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_step_reports_timeout_then_outcome() {
        let mut builder = StateMachineBuilder::new("slow");
        builder.intent("hello");
        builder.new_state("idle").initial().when_intent_matched_go_to("hello", "work");
        builder.new_state("work").body(|_: &mut Session| {
            std::thread::sleep(Duration::from_millis(150));
            Ok::<(), BodyError>(())
        });
        let machine = Arc::new(builder.build().unwrap());

        let manager = SessionManager::new(
            machine,
            EngineConfig {
                step_timeout: Duration::from_millis(20),
                session_idle_timeout: None,
                ..EngineConfig::default()
            },
        );
        let (_, mut events) = manager.get_or_create("carol").await;
        next_event(&mut events).await;

        manager.send("carol", hello()).await.unwrap();
        assert!(matches!(
            next_event(&mut events).await,
            SessionEvent::StepTimedOut { budget_ms: 20, .. }
        ));
        match next_event(&mut events).await {
            SessionEvent::Stepped { outcome, .. } => assert_eq!(outcome.state(), "work"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_idle_session_is_closed() {
        let platform = Arc::new(RecordingPlatform::new());
        let manager = SessionManager::new(
            greeter(platform),
            EngineConfig {
                session_idle_timeout: Some(Duration::from_millis(50)),
                ..config()
            },
        );
        let (stale, mut events) = manager.get_or_create("dave").await;
        let tail = collect_until_closed(&mut events).await;
        assert_eq!(
            tail.last(),
            Some(&SessionEvent::Closed {
                session_id: "dave".to_string(),
                reason: CloseReason::Idle,
            })
        );
        // Deregistered before Closed went out
        assert!(manager.active_sessions().await.is_empty());

        // A handle kept from before the close is refused, not silently queued
        assert!(matches!(
            stale.send("dave", hello()).await,
            Err(RuntimeError::SessionClosed(_))
        ));

        // The manager starts a fresh session that does step the stimulus
        let (_, mut events) = manager.get_or_create("dave").await;
        manager.send("dave", hello()).await.unwrap();
        loop {
            if let SessionEvent::Stepped { outcome, .. } = next_event(&mut events).await {
                assert!(outcome.moved());
                break;
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_started_is_never_missed() {
        let platform = Arc::new(RecordingPlatform::new());
        let manager = SessionManager::new(greeter(platform), config());

        for i in 0..50 {
            let id = format!("user-{i}");
            let (_, mut events) = manager.get_or_create(&id).await;
            assert!(matches!(
                next_event(&mut events).await,
                SessionEvent::Started { session_id, .. } if session_id == id
            ));
        }

        // An existing session hands out a fresh receiver
        let (_, mut again) = manager.get_or_create("user-0").await;
        manager.send("user-0", hello()).await.unwrap();
        assert!(matches!(next_event(&mut again).await, SessionEvent::Stepped { .. }));
    }

    #[tokio::test]
    async fn test_panicking_body_fails_session() {
        let mut builder = StateMachineBuilder::new("fragile");
        builder.intent("hello");
        builder.new_state("idle").initial().when_intent_matched_go_to("hello", "boom");
        builder
            .new_state("boom")
            .body(|_: &mut Session| -> Result<(), BodyError> { panic!("body exploded") });
        let manager = SessionManager::new(Arc::new(builder.build().unwrap()), config());

        let (_, mut events) = manager.get_or_create("erin").await;
        next_event(&mut events).await;
        manager.send("erin", hello()).await.unwrap();

        let tail = collect_until_closed(&mut events).await;
        assert_eq!(
            tail.last(),
            Some(&SessionEvent::Closed {
                session_id: "erin".to_string(),
                reason: CloseReason::Failed,
            })
        );
    }

    #[test]
    fn test_event_wire_shape() {
        let event = SessionEvent::Closed {
            session_id: "s".to_string(),
            reason: CloseReason::Idle,
        };
        assert_eq!(
            serde_json::to_value(event).unwrap(),
            serde_json::json!({"type": "closed", "session_id": "s", "reason": "idle"})
        );
    }
}
