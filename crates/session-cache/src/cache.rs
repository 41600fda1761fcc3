//! Per-session state machine

use crate::SessionError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use inference_engine::PredictionRecord;
use std::time::Instant;
use uuid::Uuid;

/// Cached prediction plus the upload it was made for
#[derive(Debug, Clone, PartialEq)]
pub struct SessionResult {
    pub record: PredictionRecord,
    /// Raw upload bytes, kept for redisplay
    pub image: Bytes,
}

/// Session state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// Nothing submitted yet (or cleared)
    #[default]
    Empty,
    /// Inference running; `previous` is still what gets displayed
    Computing { previous: Option<SessionResult> },
    /// Last submission succeeded
    HasResult(SessionResult),
}

/// Latest-result cache of one session
#[derive(Debug)]
pub struct SessionResultCache {
    state: SessionState,
    load_notice_shown: bool,
    created_at: DateTime<Utc>,
    last_active: Instant,
}

impl SessionResultCache {
    pub fn new() -> Self {
        Self {
            state: SessionState::Empty,
            load_notice_shown: false,
            created_at: Utc::now(),
            last_active: Instant::now(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_computing(&self) -> bool {
        matches!(self.state, SessionState::Computing { .. })
    }

    /// Result to display: the last stored one, also while a new one computes
    pub fn current(&self) -> Option<&SessionResult> {
        match &self.state {
            SessionState::Empty => None,
            SessionState::Computing { previous } => previous.as_ref(),
            SessionState::HasResult(result) => Some(result),
        }
    }

    /// Store a result, overwriting whatever was there
    pub fn store(&mut self, result: SessionResult) {
        self.touch();
        self.state = SessionState::HasResult(result);
    }

    /// Drop any result (including the one kept during a computation)
    pub fn clear(&mut self) {
        self.touch();
        self.state = match self.state {
            SessionState::Computing { .. } => SessionState::Computing { previous: None },
            _ => SessionState::Empty,
        };
    }

    /// Enter `Computing`; only one submission may run at a time
    pub fn begin_submission(&mut self, id: Uuid) -> Result<(), SessionError> {
        self.touch();
        let previous = match std::mem::take(&mut self.state) {
            SessionState::Empty => None,
            SessionState::HasResult(result) => Some(result),
            busy @ SessionState::Computing { .. } => {
                self.state = busy;
                return Err(SessionError::Busy(id));
            }
        };
        self.state = SessionState::Computing { previous };
        Ok(())
    }

    /// Leave `Computing` after a failure, restoring the last good result
    pub fn fail_submission(&mut self) {
        self.touch();
        if let SessionState::Computing { previous } = &mut self.state {
            let restored = previous.take();
            self.state = match restored {
                Some(result) => SessionState::HasResult(result),
                None => SessionState::Empty,
            };
        }
    }

    /// Returns `true` exactly once per session
    pub fn take_load_notice(&mut self) -> bool {
        !std::mem::replace(&mut self.load_notice_shown, true)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_active(&self) -> Instant {
        self.last_active
    }

    fn touch(&mut self) {
        self.last_active = Instant::now();
    }
}

impl Default for SessionResultCache {
    fn default() -> Self {
        Self::new()
    }
}
