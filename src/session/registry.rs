//! In-memory session registry.
//!
//! All mutation goes through one `RwLock`, so a completed revoke is visible
//! to every subsequent list call, including concurrent requests for the same
//! user. Expiry is the outer session mechanism's business; reads here simply
//! honor the configured TTL.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;
use uuid::Uuid;

use super::models::{NetworkInfo, Session, SessionView};
use crate::clock::Clock;
use crate::device::DeviceFingerprint;
use crate::error::AuthError;

pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Session>>,
    ttl_ms: u64,
    clock: Arc<dyn Clock>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(ttl_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl_ms,
            clock,
        }
    }

    /// Insert an active session for a freshly authenticated login.
    pub fn create(
        &self,
        user_id: Uuid,
        fingerprint: &DeviceFingerprint,
        network: NetworkInfo,
        token_hash: Vec<u8>,
    ) -> Session {
        let now_ms = self.clock.now_ms();
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            token_hash,
            device_type: fingerprint.device_type,
            browser: fingerprint.browser.clone(),
            os: fingerprint.os.clone(),
            ip: network.ip,
            country: network.country,
            city: network.city,
            created_at_ms: now_ms,
            last_active_at_ms: now_ms,
            revoked_at_ms: None,
        };

        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Opportunistic sweep: revoked and expired records can never
        // authenticate again, so new logins garbage-collect them.
        sessions.retain(|_, existing| existing.is_active(now_ms, self.ttl_ms));
        sessions.insert(session.id, session.clone());
        info!(user_id = %user_id, session_id = %session.id, "session created");
        session
    }

    /// Resolve an active session from a presented token hash.
    #[must_use]
    pub fn find_active_by_token_hash(&self, token_hash: &[u8]) -> Option<Session> {
        let now_ms = self.clock.now_ms();
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .values()
            .find(|session| {
                session.token_hash == token_hash && session.is_active(now_ms, self.ttl_ms)
            })
            .cloned()
    }

    /// All active sessions for a user, newest activity first, annotated with
    /// `is_current` relative to the caller.
    #[must_use]
    pub fn list(&self, user_id: Uuid, caller_session_id: Option<Uuid>) -> Vec<SessionView> {
        let now_ms = self.clock.now_ms();
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let mut views: Vec<SessionView> = sessions
            .values()
            .filter(|session| {
                session.user_id == user_id && session.is_active(now_ms, self.ttl_ms)
            })
            .map(|session| {
                SessionView::from_session(session, caller_session_id == Some(session.id))
            })
            .collect();
        views.sort_by(|a, b| {
            b.last_active_at_ms
                .cmp(&a.last_active_at_ms)
                .then(b.created_at_ms.cmp(&a.created_at_ms))
        });
        views
    }

    /// Revoke one session. The caller's own session is refused here: ending
    /// the current session is a logout, not a revoke.
    pub fn revoke(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        caller_session_id: Uuid,
    ) -> Result<(), AuthError> {
        let now_ms = self.clock.now_ms();
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(session) = sessions.get_mut(&session_id) else {
            return Err(AuthError::SessionNotFound);
        };
        if session.user_id != user_id || !session.is_active(now_ms, self.ttl_ms) {
            return Err(AuthError::SessionNotFound);
        }
        if session_id == caller_session_id {
            return Err(AuthError::CannotRevokeCurrentSession);
        }

        session.revoked_at_ms = Some(now_ms);
        info!(user_id = %user_id, session_id = %session_id, "session revoked");
        Ok(())
    }

    /// Revoke every active session except the one excluded. Returns how many
    /// were revoked.
    pub fn revoke_all_others(&self, user_id: Uuid, except_session_id: Uuid) -> usize {
        let now_ms = self.clock.now_ms();
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let mut revoked = 0;
        for session in sessions.values_mut() {
            if session.user_id == user_id
                && session.id != except_session_id
                && session.is_active(now_ms, self.ttl_ms)
            {
                session.revoked_at_ms = Some(now_ms);
                revoked += 1;
            }
        }
        if revoked > 0 {
            info!(user_id = %user_id, revoked, "other sessions revoked");
        }
        revoked
    }

    /// End the caller's own session (logout path; no current-session guard).
    pub fn end_session(&self, session_id: Uuid) {
        let now_ms = self.clock.now_ms();
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = sessions.get_mut(&session_id) {
            if session.revoked_at_ms.is_none() {
                session.revoked_at_ms = Some(now_ms);
            }
        }
    }

    /// Best-effort bump of `last_active_at`; silently ignores unknown ids.
    pub fn touch(&self, session_id: Uuid) {
        let now_ms = self.clock.now_ms();
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = sessions.get_mut(&session_id) {
            if session.is_active(now_ms, self.ttl_ms) {
                session.last_active_at_ms = now_ms;
            }
        }
    }
}
