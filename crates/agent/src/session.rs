use std::collections::HashMap;
use std::sync::Arc;

use agendum_core::domain::session::{ChatMessage, SessionId, SessionStatus};
use agendum_core::domain::slots::Slots;
use agendum_core::errors::TurnError;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tokio::sync::{Mutex, RwLock};

use crate::guardrails::ConfirmationGate;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// One conversation. Owned by the orchestrator for the duration of a turn.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: SessionId,
    pub slots: Slots,
    pub gate: ConfirmationGate,
    pub turn_count: u32,
    pub status: SessionStatus,
    pub skip_email: bool,
    pub history: Vec<ChatMessage>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId, default_zone: Tz, now: DateTime<Utc>) -> Self {
        Self {
            id,
            slots: Slots::with_timezone(default_zone),
            gate: ConfirmationGate::default(),
            turn_count: 0,
            status: SessionStatus::Active,
            skip_email: false,
            history: Vec::new(),
            last_active: now,
        }
    }

    pub fn ensure_active(&self) -> Result<(), TurnError> {
        match self.status {
            SessionStatus::Active => Ok(()),
            SessionStatus::Ended => Err(TurnError::SessionEnded { session_id: self.id.clone() }),
        }
    }

    pub fn begin_turn(&mut self, message: &str, now: DateTime<Utc>) {
        self.turn_count = self.turn_count.saturating_add(1);
        self.last_active = now;
        self.history.push(ChatMessage::user(message));
    }

    pub fn record_reply(&mut self, reply: &str) {
        self.history.push(ChatMessage::assistant(reply));
    }

    pub fn end(&mut self) {
        self.status = SessionStatus::Ended;
        self.gate.reset();
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

/// Sessions keyed by id.
///
/// The map lock is held only to look a session up; each session has its own
/// mutex, so turns of one session run one at a time while different sessions
/// proceed independently. Ended sessions stay as tombstones until they idle out.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    idle_ttl: Duration,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), idle_ttl }
    }

    pub async fn create(&self, default_zone: Tz, now: DateTime<Utc>) -> SessionId {
        let id = SessionId::generate();
        let session = Session::new(id.clone(), default_zone, now);
        self.sessions.write().await.insert(id.clone(), Arc::new(Mutex::new(session)));
        id
    }

    pub async fn get(&self, id: &SessionId) -> Result<SessionHandle, TurnError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| TurnError::UnknownSession { session_id: id.clone() })
    }

    /// Drops sessions idle for longer than the ttl. Sessions mid-turn are skipped.
    pub async fn reap_idle(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => now - session.last_active <= self.idle_ttl,
            Err(_) => true,
        });
        before - sessions.len()
    }

    pub async fn active_count(&self) -> usize {
        let handles = self.sessions.read().await.values().cloned().collect::<Vec<_>>();
        let mut active = 0;
        for handle in handles {
            if handle.lock().await.status == SessionStatus::Active {
                active += 1;
            }
        }
        active
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
