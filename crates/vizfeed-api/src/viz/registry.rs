use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use vizfeed_types::viz::{VizPhase, VizSessionSnapshot, VizSignal};

use super::lifecycle::{IllegalTransition, transition};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown viz session {0}")]
    UnknownSession(Uuid),
    #[error(transparent)]
    Illegal(#[from] IllegalTransition),
}

struct Session {
    post_id: Uuid,
    phase: VizPhase,
    last_error: Option<String>,
    mounted_at: DateTime<Utc>,
    last_signal_at: DateTime<Utc>,
    cancel: CancellationToken,
}

impl Session {
    fn snapshot(&self, session_id: Uuid) -> VizSessionSnapshot {
        VizSessionSnapshot {
            session_id,
            post_id: self.post_id,
            phase: self.phase,
            last_error: self.last_error.clone(),
            mounted_at: self.mounted_at,
            last_signal_at: self.last_signal_at,
        }
    }

    fn apply(&mut self, signal: &VizSignal) -> Result<(), IllegalTransition> {
        self.phase = transition(self.phase, signal)?;
        self.last_signal_at = Utc::now();
        if let VizSignal::Failed { message } = signal {
            self.last_error = Some(message.clone());
        }
        if matches!(signal, VizSignal::Teardown) {
            self.cancel.cancel();
        }
        Ok(())
    }
}

pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Tracks every mounted visualization by session id.
///
/// At capacity, mounting evicts the session with the oldest signal.
#[derive(Clone)]
pub struct VizRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    max_sessions: usize,
}

impl Default for VizRegistry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_SESSIONS)
    }
}

impl VizRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_sessions: usize) -> Self {
        Self {
            sessions: Arc::default(),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Registers a session for `post_id` and starts library loading.
    /// The token is cancelled when the session is torn down or swept.
    pub async fn mount(&self, post_id: Uuid) -> (Uuid, CancellationToken) {
        let session_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let now = Utc::now();
        let mut session = Session {
            post_id,
            phase: VizPhase::Idle,
            last_error: None,
            mounted_at: now,
            last_signal_at: now,
            cancel: cancel.clone(),
        };
        // Idle always accepts Load.
        if let Err(e) = session.apply(&VizSignal::Load) {
            debug!("Viz session {} could not start loading: {}", session_id, e);
        }

        let mut sessions = self.sessions.write().await;
        while sessions.len() >= self.max_sessions {
            let Some(stalest) = sessions
                .iter()
                .min_by_key(|(_, s)| s.last_signal_at)
                .map(|(id, _)| *id)
            else {
                break;
            };
            if let Some(evicted) = sessions.remove(&stalest) {
                evicted.cancel.cancel();
                debug!("Viz session {} evicted at capacity", stalest);
            }
        }
        sessions.insert(session_id, session);
        drop(sessions);
        debug!("Viz session {} mounted for post {}", session_id, post_id);
        (session_id, cancel)
    }

    pub async fn report(
        &self,
        session_id: Uuid,
        signal: &VizSignal,
    ) -> Result<VizSessionSnapshot, RegistryError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(RegistryError::UnknownSession(session_id))?;
        session.apply(signal)?;
        debug!("Viz session {} -> {:?}", session_id, session.phase);
        Ok(session.snapshot(session_id))
    }

    /// Cancels the session, walks it back to idle and forgets it.
    pub async fn unmount(&self, session_id: Uuid) -> Result<VizSessionSnapshot, RegistryError> {
        let mut session = self
            .sessions
            .write()
            .await
            .remove(&session_id)
            .ok_or(RegistryError::UnknownSession(session_id))?;

        session.cancel.cancel();
        if session.phase != VizPhase::Idle && session.phase != VizPhase::TearingDown {
            session.apply(&VizSignal::Teardown)?;
        }
        if session.phase == VizPhase::TearingDown {
            session.apply(&VizSignal::Disposed)?;
        }
        debug!("Viz session {} unmounted", session_id);
        Ok(session.snapshot(session_id))
    }

    pub async fn snapshot(&self, session_id: Uuid) -> Option<VizSessionSnapshot> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .map(|session| session.snapshot(session_id))
    }

    /// Removes sessions with no signal for longer than `ttl`. Returns how many.
    pub async fn sweep_stale(&self, ttl: Duration) -> usize {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now().checked_sub_signed(ttl).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| {
            let keep = session.last_signal_at > cutoff;
            if !keep {
                session.cancel.cancel();
                debug!("Viz session {} swept in phase {:?}", id, session.phase);
            }
            keep
        });
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
