//! Cache of known sessions and the current selection

use crate::model::{Session, SessionId};

/// Result of folding a server session list into the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub previous: Option<SessionId>,
    pub current: Option<SessionId>,
}

impl Reconciliation {
    /// Whether the selection moved and the displayed history is now stale
    pub fn selection_changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Sessions as last reported by the service, plus which one is current
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Vec<Session>,
    current: Option<SessionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn current(&self) -> Option<&SessionId> {
        self.current.as_ref()
    }

    pub fn is_current(&self, id: &SessionId) -> bool {
        self.current.as_ref() == Some(id)
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.session_id == id)
    }

    /// Select a session locally; `None` marks the selection as pending
    pub fn set_current(&mut self, id: Option<SessionId>) {
        for session in &mut self.sessions {
            session.is_current = id.as_ref() == Some(&session.session_id);
        }
        self.current = id;
    }

    /// Insert or overwrite one session without a round trip
    pub fn upsert_local(&mut self, session: Session) {
        let make_current = session.is_current;
        let id = session.session_id.clone();
        match self.sessions.iter_mut().find(|s| s.session_id == id) {
            Some(existing) => *existing = session,
            None => self.sessions.push(session),
        }
        if make_current {
            self.set_current(Some(id));
        }
    }

    /// Drop one session from the cache
    ///
    /// If it was current the first remaining session takes over, so a
    /// non-empty list always has a selection. Returns whether the selection
    /// moved.
    pub fn remove(&mut self, id: &SessionId) -> bool {
        self.sessions.retain(|s| &s.session_id != id);
        if !self.is_current(id) {
            return false;
        }
        let fallback = self.sessions.first().map(|s| s.session_id.clone());
        tracing::debug!(
            removed = %id,
            fallback = ?fallback.as_ref().map(SessionId::as_str),
            "Current session removed locally"
        );
        self.set_current(fallback);
        true
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
        self.current = None;
    }

    /// Replace the cache with the server's list and resolve the selection
    ///
    /// Preference order: the session the server flags as current, the
    /// previous local selection if it still exists, the first listed.
    pub fn reconcile(&mut self, sessions: Vec<Session>) -> Reconciliation {
        let previous = self.current.take();

        let flagged: Vec<&SessionId> = sessions
            .iter()
            .filter(|s| s.is_current)
            .map(|s| &s.session_id)
            .collect();
        let listed = |id: &SessionId| sessions.iter().any(|s| &s.session_id == id);

        let current = match (&previous, flagged.first()) {
            (Some(prev), Some(_)) if flagged.contains(&prev) => Some(prev.clone()),
            (_, Some(first_flagged)) => Some((*first_flagged).clone()),
            (Some(prev), None) if listed(prev) => Some(prev.clone()),
            _ => sessions.first().map(|s| s.session_id.clone()),
        };

        self.sessions = sessions;
        self.set_current(current.clone());

        if previous != current {
            tracing::debug!(
                previous = ?previous.as_ref().map(SessionId::as_str),
                current = ?current.as_ref().map(SessionId::as_str),
                "Session selection changed during reconcile"
            );
        }

        Reconciliation { previous, current }
    }
}
