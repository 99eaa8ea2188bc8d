//! In-memory registry of open collection sessions.
//!
//! Access goes through closures so a guard can never live across an `.await`.

use intake_core::{CollectionSession, IntakeResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, CollectionSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session and return its id.
    pub fn create(&self) -> Uuid {
        let session = CollectionSession::new();
        let id = session.id();
        self.sessions.write().insert(id, session);
        id
    }

    /// Run `f` against the session, or `None` if `id` is not registered.
    pub fn read<R>(&self, id: Uuid, f: impl FnOnce(&CollectionSession) -> R) -> Option<R> {
        self.sessions.read().get(&id).map(f)
    }

    /// Run `f` against the session mutably, or `None` if `id` is not registered.
    pub fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut CollectionSession) -> R) -> Option<R> {
        self.sessions.write().get_mut(&id).map(f)
    }

    pub fn remove(&self, id: Uuid) -> Option<CollectionSession> {
        self.sessions.write().remove(&id)
    }

    /// Run `f` and remove the session only if it succeeds, under one write lock.
    pub fn remove_with(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut CollectionSession) -> IntakeResult<()>,
    ) -> Option<IntakeResult<CollectionSession>> {
        let mut sessions = self.sessions.write();
        if let Err(err) = f(sessions.get_mut(&id)?) {
            return Some(Err(err));
        }
        sessions.remove(&id).map(Ok)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::{DuplicateSignal, RecordField};

    #[test]
    fn create_read_update_remove() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty());

        let id = registry.create();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.read(id, |s| s.id()), Some(id));

        let signal = registry
            .update(id, |s| s.record_value(RecordField::City, "Austin"))
            .expect("registered")
            .expect("valid value");
        assert_eq!(signal, DuplicateSignal::FirstTime);
        assert_eq!(
            registry.read(id, |s| s.entry(RecordField::City).current_value().map(str::to_owned)),
            Some(Some("Austin".to_owned()))
        );

        assert!(registry.remove(id).is_some());
        assert!(registry.read(id, |_| ()).is_none());
        assert!(registry.update(id, |_| ()).is_none());
    }

    #[test]
    fn remove_with_keeps_session_when_refused() {
        let registry = SessionRegistry::new();
        let id = registry.create();

        let refused = registry
            .remove_with(id, |_| Err(intake_core::IntakeError::SubmissionInProgress(id)))
            .expect("registered");
        assert!(refused.is_err());
        assert_eq!(registry.len(), 1);

        let removed = registry
            .remove_with(id, CollectionSession::abandon)
            .expect("registered")
            .expect("open session can be abandoned");
        assert_eq!(removed.state(), intake_core::SessionState::Abandoned);
        assert!(registry.is_empty());
        assert!(registry.remove_with(id, CollectionSession::abandon).is_none());
    }

    #[test]
    fn clones_share_sessions() {
        let registry = SessionRegistry::new();
        let other = registry.clone();
        let id = registry.create();
        assert!(other.read(id, |_| ()).is_some());
    }
}
