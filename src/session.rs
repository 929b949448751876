//! Session driver - runs a [`SelectionMachine`] on a tokio task
//!
//! Events arrive over an mpsc channel, fetches are spawned into a
//! `JoinSet`, and each state change is published as a [`SelectionView`] on
//! a watch channel. The machine is the only mutator of the selection; the
//! task owns it exclusively.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::detail::TermPolicy;
use crate::gateway::AnalyticsGateway;
use crate::selection::{FetchOutcome, SelectionEvent, SelectionMachine, SelectionView};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session is no longer running")]
    Closed,

    #[error("Session task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

fn cfg_event_buffer() -> usize {
    if crate::config::is_initialized() {
        crate::config::get().session.event_buffer
    } else {
        crate::config::defaults::SESSION_EVENT_BUFFER
    }
}

fn cfg_term_policy() -> TermPolicy {
    if crate::config::is_initialized() {
        crate::config::get().detail.term_policy
    } else {
        TermPolicy::default()
    }
}

/// A selection workflow bound to a gateway.
pub struct Session {
    gateway: Arc<dyn AnalyticsGateway>,
    term_policy: TermPolicy,
    machine: SelectionMachine,
}

impl Session {
    pub fn new(gateway: Arc<dyn AnalyticsGateway>, term_policy: TermPolicy) -> Self {
        Self {
            gateway,
            term_policy,
            machine: SelectionMachine::new(),
        }
    }

    /// Session using the configured term policy.
    pub fn from_config(gateway: Arc<dyn AnalyticsGateway>) -> Self {
        Self::new(gateway, cfg_term_policy())
    }

    /// Spawn the session task with the configured event buffer.
    pub fn spawn(self) -> SessionHandle {
        self.spawn_with_buffer(cfg_event_buffer())
    }

    /// Spawn the session task.
    pub fn spawn_with_buffer(self, buffer: usize) -> SessionHandle {
        let (event_tx, event_rx) = mpsc::channel(buffer.max(1));
        let (view_tx, view_rx) = watch::channel(self.machine.view());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(self.run(event_rx, view_tx, cancel.clone()));

        SessionHandle {
            events: event_tx,
            views: view_rx,
            cancel,
            task,
        }
    }

    async fn run(
        mut self,
        mut events: mpsc::Receiver<SelectionEvent>,
        views: watch::Sender<SelectionView>,
        cancel: CancellationToken,
    ) -> SelectionMachine {
        info!(gateway = self.gateway.gateway_name(), "[Session] Task starting");
        let mut fetches: JoinSet<FetchOutcome> = JoinSet::new();
        let mut events_open = true;

        loop {
            if !events_open && fetches.is_empty() {
                break;
            }

            tokio::select! {
                () = cancel.cancelled() => {
                    info!("[Session] Received shutdown signal");
                    break;
                }
                event = events.recv(), if events_open => {
                    let Some(event) = event else {
                        debug!("[Session] Event channel closed, draining fetches");
                        events_open = false;
                        continue;
                    };
                    if let Some(request) = self.machine.handle(event) {
                        let gateway = Arc::clone(&self.gateway);
                        let policy = self.term_policy;
                        fetches.spawn(async move { request.run(gateway.as_ref(), policy).await });
                    }
                    views.send_replace(self.machine.view());
                }
                Some(joined) = fetches.join_next(), if !fetches.is_empty() => {
                    match joined {
                        Ok(outcome) => {
                            if self.machine.complete(outcome) {
                                views.send_replace(self.machine.view());
                            }
                        }
                        Err(e) => warn!("[Session] Fetch task failed: {}", e),
                    }
                }
            }
        }

        // Remaining fetches are dropped (aborted) with the JoinSet.
        info!(phase = %self.machine.phase(), "[Session] Task stopped");
        self.machine
    }
}

/// Handle to a running [`Session`].
pub struct SessionHandle {
    events: mpsc::Sender<SelectionEvent>,
    views: watch::Receiver<SelectionView>,
    cancel: CancellationToken,
    task: JoinHandle<SelectionMachine>,
}

impl SessionHandle {
    /// Queue an event for the session.
    pub async fn send(&self, event: SelectionEvent) -> Result<(), SessionError> {
        self.events
            .send(event)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Latest published view.
    pub fn view(&self) -> SelectionView {
        self.views.borrow().clone()
    }

    /// Subscribe to view updates.
    pub fn subscribe(&self) -> watch::Receiver<SelectionView> {
        self.views.clone()
    }

    /// Wait until a published view satisfies `predicate`.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&SelectionView) -> bool,
    ) -> Result<SelectionView, SessionError> {
        let view = self
            .views
            .wait_for(|v| predicate(v))
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(view.clone())
    }

    /// Stop accepting events, let in-flight fetches finish, and return the
    /// final machine.
    pub async fn close(self) -> Result<SelectionMachine, SessionError> {
        drop(self.events);
        Ok(self.task.await?)
    }

    /// Stop immediately, dropping in-flight fetches.
    pub async fn shutdown(self) -> Result<SelectionMachine, SessionError> {
        self.cancel.cancel();
        Ok(self.task.await?)
    }
}
