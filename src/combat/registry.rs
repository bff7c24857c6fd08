//! Session registry and manager
//!
//! The registry is the only cross-session state: which session each
//! facilitator runs and which session each player is fighting in. It is a
//! single-writer structure behind one lock, so "one active session per
//! player" is an atomic check-and-insert.
//!
//! Lock order is session first, then registry. The registry never locks a
//! session while holding its own lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::dice::DieRoller;
use super::ids::{PlayerId, SessionId};
use super::observer::SessionObserver;
use super::session::{CombatSession, SessionContext, SharedSession};
use super::stats::CharacterProvider;
use crate::config::EngineConfig;

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<SessionId, SharedSession>,
    facilitators: HashMap<PlayerId, SessionId>,
    participants: HashMap<PlayerId, SessionId>,
}

/// Process-wide lookup of active sessions
#[derive(Default)]
pub struct SessionRegistry {
    state: Mutex<RegistryState>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SessionRegistry")
            .field("sessions", &state.sessions.len())
            .field("participants", &state.participants.len())
            .finish()
    }
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its facilitator. False if they already run one.
    pub(crate) fn register_session(
        &self,
        facilitator: PlayerId,
        id: SessionId,
        session: SharedSession,
    ) -> bool {
        let mut state = self.state.lock();
        if state.facilitators.contains_key(&facilitator) {
            return false;
        }
        state.facilitators.insert(facilitator, id);
        state.sessions.insert(id, session);
        true
    }

    pub(crate) fn unregister_session(&self, facilitator: PlayerId, id: SessionId) {
        let mut state = self.state.lock();
        if state.facilitators.get(&facilitator) == Some(&id) {
            state.facilitators.remove(&facilitator);
        }
        state.sessions.remove(&id);
        state.participants.retain(|_, session| *session != id);
    }

    /// Claim a player for a session. True if the player was free or already
    /// belongs to this session.
    pub(crate) fn claim_participant(&self, player: PlayerId, id: SessionId) -> bool {
        let mut state = self.state.lock();
        match state.participants.get(&player) {
            Some(existing) => *existing == id,
            None => {
                state.participants.insert(player, id);
                true
            }
        }
    }

    /// Release a player, but only from the session that holds them
    pub(crate) fn release_participant(&self, player: PlayerId, id: SessionId) {
        let mut state = self.state.lock();
        if state.participants.get(&player) == Some(&id) {
            state.participants.remove(&player);
        }
    }

    pub fn get(&self, id: SessionId) -> Option<SharedSession> {
        self.state.lock().sessions.get(&id).cloned()
    }

    pub fn session_for_facilitator(&self, facilitator: PlayerId) -> Option<SharedSession> {
        let state = self.state.lock();
        let id = state.facilitators.get(&facilitator)?;
        state.sessions.get(id).cloned()
    }

    /// Session id a player is currently fighting in
    pub fn participant_session_id(&self, player: PlayerId) -> Option<SessionId> {
        self.state.lock().participants.get(&player).copied()
    }

    pub fn session_for_participant(&self, player: PlayerId) -> Option<SharedSession> {
        let state = self.state.lock();
        let id = state.participants.get(&player)?;
        state.sessions.get(id).cloned()
    }

    pub fn is_in_combat(&self, player: PlayerId) -> bool {
        self.state.lock().participants.contains_key(&player)
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }

    pub fn participant_count(&self) -> usize {
        self.state.lock().participants.len()
    }

    pub fn active_sessions(&self) -> Vec<SharedSession> {
        self.state.lock().sessions.values().cloned().collect()
    }
}

/// Owns the registry and the collaborators sessions are built with.
///
/// Create one at process start; call `clear` at shutdown or test teardown.
/// Dropping the manager clears it as well.
pub struct SessionManager {
    ctx: SessionContext,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("registry", &self.ctx.registry)
            .field("config", &self.ctx.config)
            .finish()
    }
}

impl SessionManager {
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn CharacterProvider>,
        roller: Arc<dyn DieRoller>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            ctx: SessionContext {
                registry: Arc::new(SessionRegistry::new()),
                provider,
                roller,
                observer,
                config: Arc::new(config),
            },
        }
    }

    /// Create a shared instance
    pub fn shared(
        config: EngineConfig,
        provider: Arc<dyn CharacterProvider>,
        roller: Arc<dyn DieRoller>,
        observer: Arc<dyn SessionObserver>,
    ) -> Arc<Self> {
        Arc::new(Self::new(config, provider, roller, observer))
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.ctx.registry
    }

    pub fn provider(&self) -> &Arc<dyn CharacterProvider> {
        &self.ctx.provider
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    /// Start a session for a facilitator; `None` if they already run one
    pub fn start_session(&self, facilitator: PlayerId) -> Option<SharedSession> {
        CombatSession::start(facilitator, self.ctx.clone())
    }

    pub fn session_for_facilitator(&self, facilitator: PlayerId) -> Option<SharedSession> {
        self.ctx.registry.session_for_facilitator(facilitator)
    }

    pub fn session_for_participant(&self, player: PlayerId) -> Option<SharedSession> {
        self.ctx.registry.session_for_participant(player)
    }

    pub fn active_sessions(&self) -> Vec<SharedSession> {
        self.ctx.registry.active_sessions()
    }

    /// End the facilitator's session, if any
    pub fn end_session(&self, facilitator: PlayerId) -> bool {
        let Some(session) = self.session_for_facilitator(facilitator) else {
            return false;
        };
        session.lock().end_combat();
        true
    }

    /// End every active session
    pub fn clear(&self) {
        // Collect first: ending a session takes the registry lock again
        let sessions = self.ctx.registry.active_sessions();
        let count = sessions.len();
        for session in sessions {
            session.lock().end_combat();
        }
        if count > 0 {
            info!("Cleared {} combat sessions", count);
        } else {
            debug!("No combat sessions to clear");
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        // Sessions hold the registry that holds them
        self.clear();
    }
}
