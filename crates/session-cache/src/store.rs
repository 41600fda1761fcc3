//! Session registry

use crate::{SessionError, SessionResult, SessionResultCache};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Session identifier
pub type SessionId = Uuid;

/// Default maximum number of live sessions
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// Process-wide registry of per-session caches
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, SessionResultCache>>,
    max_sessions: usize,
}

impl SessionStore {
    /// Create a new store
    pub fn new(max_sessions: usize) -> Self {
        info!("Creating session store: max_sessions={}", max_sessions);
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<SessionId, SessionResultCache>>, SessionError> {
        self.sessions
            .lock()
            .map_err(|e| SessionError::Lock(e.to_string()))
    }

    /// Open a new session, evicting the least recently active idle one when full.
    ///
    /// Sessions with a prediction in flight are never evicted; when every
    /// session is computing the store is full and creation fails.
    pub fn create(&self) -> Result<SessionId, SessionError> {
        let mut sessions = self.lock()?;

        if sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .filter(|(_, cache)| !cache.is_computing())
                .min_by_key(|(_, cache)| cache.last_active())
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    warn!("Session limit reached, evicting idle session {}", id);
                    sessions.remove(&id);
                }
                None => {
                    warn!("Session limit reached with every session computing");
                    return Err(SessionError::Full(self.max_sessions));
                }
            }
        }

        let id = Uuid::new_v4();
        sessions.insert(id, SessionResultCache::new());
        debug!("Created session {}", id);
        Ok(id)
    }

    /// End a session; returns whether it existed
    pub fn remove(&self, id: SessionId) -> Result<bool, SessionError> {
        let removed = self.lock()?.remove(&id).is_some();
        if removed {
            debug!("Removed session {}", id);
        }
        Ok(removed)
    }

    pub fn contains(&self, id: SessionId) -> Result<bool, SessionError> {
        Ok(self.lock()?.contains_key(&id))
    }

    /// Number of live sessions
    pub fn len(&self) -> Result<usize, SessionError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, SessionError> {
        Ok(self.lock()?.is_empty())
    }

    /// Run `f` against one session's cache
    pub fn with_session<R>(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut SessionResultCache) -> R,
    ) -> Result<R, SessionError> {
        let mut sessions = self.lock()?;
        let cache = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        Ok(f(cache))
    }

    /// Result currently displayed for a session
    pub fn current(&self, id: SessionId) -> Result<Option<SessionResult>, SessionError> {
        self.with_session(id, |cache| cache.current().cloned())
    }

    /// Store a result for a session
    pub fn store(&self, id: SessionId, result: SessionResult) -> Result<(), SessionError> {
        self.with_session(id, |cache| cache.store(result))
    }

    /// Clear a session's result
    pub fn clear(&self, id: SessionId) -> Result<(), SessionError> {
        self.with_session(id, |cache| cache.clear())
    }

    /// Whether the model-load notice should still be shown to this session
    pub fn take_load_notice(&self, id: SessionId) -> Result<bool, SessionError> {
        self.with_session(id, |cache| cache.take_load_notice())
    }

    /// Start a submission. Dropping the guard without completing it rolls
    /// the session back to its last good result.
    pub fn begin_submission(
        self: &Arc<Self>,
        id: SessionId,
    ) -> Result<SubmissionGuard, SessionError> {
        self.with_session(id, |cache| cache.begin_submission(id))??;
        Ok(SubmissionGuard {
            store: Arc::clone(self),
            id,
            finished: false,
        })
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS)
    }
}

/// In-flight submission of one session
pub struct SubmissionGuard {
    store: Arc<SessionStore>,
    id: SessionId,
    finished: bool,
}

impl SubmissionGuard {
    pub fn session_id(&self) -> SessionId {
        self.id
    }

    /// Store the successful result and finish the submission
    pub fn complete(mut self, result: SessionResult) -> Result<(), SessionError> {
        self.finished = true;
        self.store.store(self.id, result)
    }

    /// Finish the submission as failed, keeping the last good result
    pub fn fail(mut self) {
        self.finished = true;
        self.rollback();
    }

    fn rollback(&self) {
        // session may have ended meanwhile
        if let Err(e) = self.store.with_session(self.id, |cache| cache.fail_submission()) {
            debug!("Rollback skipped for session {}: {}", self.id, e);
        }
    }
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Submission for session {} abandoned", self.id);
            self.rollback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::result;
    use crate::SessionState;
    use inference_engine::ClassLabel;

    #[test]
    fn test_sessions_are_isolated() {
        let store = SessionStore::default();
        let a = store.create().unwrap();
        let b = store.create().unwrap();

        store.store(a, result(ClassLabel::Benign, 98.0)).unwrap();
        assert!(store.current(a).unwrap().is_some());
        assert!(store.current(b).unwrap().is_none());
        assert_eq!(store.len(), Ok(2));
    }

    #[test]
    fn test_unknown_session() {
        let store = SessionStore::default();
        let id = Uuid::new_v4();
        assert_eq!(store.current(id), Err(SessionError::NotFound(id)));
        assert!(!store.remove(id).unwrap());
    }

    #[test]
    fn test_guard_complete() {
        let store = Arc::new(SessionStore::default());
        let id = store.create().unwrap();

        let guard = store.begin_submission(id).unwrap();
        assert!(matches!(store.begin_submission(id), Err(SessionError::Busy(_))));

        let stored = result(ClassLabel::Adenocarcinoma, 90.0);
        guard.complete(stored.clone()).unwrap();
        assert_eq!(store.current(id).unwrap(), Some(stored));
    }

    #[test]
    fn test_guard_drop_rolls_back() {
        let store = Arc::new(SessionStore::default());
        let id = store.create().unwrap();
        let good = result(ClassLabel::Benign, 99.0);
        store.store(id, good.clone()).unwrap();

        {
            let _guard = store.begin_submission(id).unwrap();
        }

        store
            .with_session(id, |cache| {
                assert_eq!(cache.state(), &SessionState::HasResult(good.clone()));
            })
            .unwrap();
        assert!(store.begin_submission(id).is_ok());
    }

    #[test]
    fn test_guard_fail_after_session_removed() {
        let store = Arc::new(SessionStore::default());
        let id = store.create().unwrap();
        let guard = store.begin_submission(id).unwrap();

        assert!(store.remove(id).unwrap());
        guard.fail();
        assert!(!store.contains(id).unwrap());
    }

    #[test]
    fn test_eviction_skips_computing_sessions() {
        let store = Arc::new(SessionStore::new(2));
        let busy = store.create().unwrap();
        let idle = store.create().unwrap();
        let _guard = store.begin_submission(busy).unwrap();

        let fresh = store.create().unwrap();
        assert!(store.contains(busy).unwrap());
        assert!(!store.contains(idle).unwrap());
        assert!(store.contains(fresh).unwrap());
    }

    #[test]
    fn test_full_when_every_session_computing() {
        let store = Arc::new(SessionStore::new(2));
        let a = store.create().unwrap();
        let b = store.create().unwrap();
        let _guard_a = store.begin_submission(a).unwrap();
        let _guard_b = store.begin_submission(b).unwrap();

        assert_eq!(store.create(), Err(SessionError::Full(2)));
        assert_eq!(store.len(), Ok(2));
    }

    #[test]
    fn test_poisoned_lock_is_reported() {
        let store = Arc::new(SessionStore::default());
        let id = store.create().unwrap();

        let poisoner = Arc::clone(&store);
        let joined = std::thread::spawn(move || {
            let _ = poisoner.with_session(id, |_| panic!("poison the store"));
        })
        .join();
        assert!(joined.is_err());

        assert!(matches!(store.contains(id), Err(SessionError::Lock(_))));
        assert!(matches!(store.len(), Err(SessionError::Lock(_))));
    }

    #[test]
    fn test_load_notice_per_session() {
        let store = SessionStore::default();
        let a = store.create().unwrap();
        let b = store.create().unwrap();

        assert!(store.take_load_notice(a).unwrap());
        assert!(!store.take_load_notice(a).unwrap());
        assert!(store.take_load_notice(b).unwrap());
    }
}
