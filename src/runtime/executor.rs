//! Session task

use super::{CloseReason, Inbound, Registry, SessionEvent};
use crate::config::EngineConfig;
use crate::session::{Session, Stimulus};
use crate::state_machine::StateMachine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinError;

/// Owns one session and applies the stimuli queued for it
pub(crate) struct SessionRuntime {
    machine: Arc<StateMachine>,
    step_timeout: Duration,
    idle_timeout: Option<Duration>,
    inbox: mpsc::Receiver<Inbound>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    /// Registry to leave on exit, with the epoch of our entry in it
    registry: Option<(Registry, u64)>,
}

impl SessionRuntime {
    pub(crate) fn new(
        machine: Arc<StateMachine>,
        config: &EngineConfig,
        inbox: mpsc::Receiver<Inbound>,
        broadcast_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            machine,
            step_timeout: config.step_timeout,
            idle_timeout: config.session_idle_timeout,
            inbox,
            broadcast_tx,
            registry: None,
        }
    }

    pub(crate) fn with_registry(mut self, registry: Registry, epoch: u64) -> Self {
        self.registry = Some((registry, epoch));
        self
    }

    pub(crate) async fn run(mut self, session: Session) {
        let session_id = session.id().to_string();
        tracing::info!(session_id = %session_id, "Starting session runtime");

        let (mut reason, session) = self.drive(session).await;

        // Leave the registry and shut the inbox under the registry lock, so no
        // caller can obtain this handle and have a stimulus accepted after it.
        self.deregister(&session_id).await;
        let pending = self.drain_inbox();
        match session {
            Some(session) => {
                if !pending.is_empty() {
                    tracing::info!(session_id = %session_id, pending = pending.len(), "Stepping stimuli queued before close");
                }
                if let Err(e) = self.step_all(session, pending).await {
                    reason = Self::failed(&session_id, &e);
                }
            }
            None if !pending.is_empty() => {
                tracing::warn!(session_id = %session_id, dropped = pending.len(), "Session lost, dropping queued stimuli");
            }
            None => {}
        }

        tracing::info!(session_id = %session_id, reason = ?reason, "Session runtime finished");
        self.broadcast(SessionEvent::Closed { session_id, reason });
    }

    /// Process stimuli until the session closes. The session is returned
    /// unless a step panicked.
    async fn drive(&mut self, session: Session) -> (CloseReason, Option<Session>) {
        let session_id = session.id().to_string();

        let (mut session, path) = match self.execute(session, StateMachine::start).await {
            Ok(done) => done,
            Err(e) => return (Self::failed(&session_id, &e), None),
        };
        self.broadcast(SessionEvent::Started {
            session_id: session_id.clone(),
            path,
        });

        loop {
            let next = match self.idle_timeout {
                Some(idle) => {
                    let Ok(next) = tokio::time::timeout(idle, self.inbox.recv()).await else {
                        tracing::info!(session_id = %session_id, idle_secs = idle.as_secs(), "Closing idle session");
                        return (CloseReason::Idle, Some(session));
                    };
                    next
                }
                None => self.inbox.recv().await,
            };

            let stimulus = match next {
                Some(Inbound::Stimulus(stimulus)) => stimulus,
                Some(Inbound::Close) => return (CloseReason::Requested, Some(session)),
                None => return (CloseReason::Shutdown, Some(session)),
            };

            session = match self.step_one(session, stimulus).await {
                Ok(session) => session,
                Err(e) => return (Self::failed(&session_id, &e), None),
            };
        }
    }

    async fn step_one(&self, session: Session, stimulus: Stimulus) -> Result<Session, JoinError> {
        let session_id = session.id().to_string();
        let (session, outcome) = self
            .execute(session, move |machine, session| {
                session.receive(stimulus);
                machine.step(session)
            })
            .await?;
        self.broadcast(SessionEvent::Stepped { session_id, outcome });
        Ok(session)
    }

    async fn step_all(&self, mut session: Session, stimuli: Vec<Stimulus>) -> Result<(), JoinError> {
        for stimulus in stimuli {
            session = self.step_one(session, stimulus).await?;
        }
        Ok(())
    }

    async fn deregister(&mut self, session_id: &str) {
        let Some((registry, epoch)) = self.registry.take() else {
            self.inbox.close();
            return;
        };
        let mut sessions = registry.write().await;
        if sessions.get(session_id).is_some_and(|h| h.epoch == epoch) {
            sessions.remove(session_id);
        }
        self.inbox.close();
    }

    /// Stimuli accepted before the inbox was closed
    fn drain_inbox(&mut self) -> Vec<Stimulus> {
        let mut pending = Vec::new();
        while let Ok(inbound) = self.inbox.try_recv() {
            if let Inbound::Stimulus(stimulus) = inbound {
                pending.push(stimulus);
            }
        }
        pending
    }

    /// Run `f` on the blocking pool. Overrunning the step budget is reported
    /// but the work is left to finish.
    async fn execute<T, F>(&self, session: Session, f: F) -> Result<(Session, T), JoinError>
    where
        F: FnOnce(&StateMachine, &mut Session) -> T + Send + 'static,
        T: Send + 'static,
    {
        let session_id = session.id().to_string();
        let state = session.current_state().to_string();
        let machine = Arc::clone(&self.machine);

        let mut task = tokio::task::spawn_blocking(move || {
            let mut session = session;
            let out = f(&machine, &mut session);
            (session, out)
        });

        if let Ok(done) = tokio::time::timeout(self.step_timeout, &mut task).await {
            return done;
        }

        let budget_ms = u64::try_from(self.step_timeout.as_millis()).unwrap_or(u64::MAX);
        tracing::warn!(
            session_id = %session_id,
            state = %state,
            budget_ms,
            "Step exceeded its time budget"
        );
        self.broadcast(SessionEvent::StepTimedOut {
            session_id,
            state,
            budget_ms,
        });
        task.await
    }

    fn failed(session_id: &str, error: &JoinError) -> CloseReason {
        tracing::error!(session_id = %session_id, error = %error, "Session step panicked");
        CloseReason::Failed
    }

    fn broadcast(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.broadcast_tx.send(event);
    }
}
