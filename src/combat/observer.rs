//! Presentation hook and read-only projections
//!
//! The session fires a `SessionEvent` after every state change. Observers
//! (scoreboards, chat relays) pull whatever they need from the session they
//! are handed; the engine never looks at what they do with it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::ids::{CombatantId, SessionId};
use super::session::{CombatSession, Phase};

/// Something changed in a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    CombatantAdded(CombatantId),
    CombatantRemoved(CombatantId),
    SurpriseMarked(CombatantId),
    /// Hidden/unconscious/dead or death-save state changed
    StatusChanged(CombatantId),
    /// Initiative rolled for everyone and combat began
    CombatStarted,
    /// Roster re-sorted after an initiative change
    OrderChanged,
    TurnChanged {
        round: u32,
        current: Option<CombatantId>,
    },
    CombatEnded,
}

/// Receiver of session change notifications
pub trait SessionObserver: Send + Sync {
    fn on_event(&self, session: &CombatSession, event: &SessionEvent);
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SessionObserver for NullObserver {
    fn on_event(&self, _session: &CombatSession, _event: &SessionEvent) {}
}

/// Observer that writes each event to the debug log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_event(&self, session: &CombatSession, event: &SessionEvent) {
        debug!(
            session = %session.id(),
            round = session.round(),
            "combat event: {:?}",
            event
        );
    }
}

/// One roster row as a given viewer may see it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombatantView {
    pub id: CombatantId,
    pub name: String,
    pub initiative: i32,
    pub is_current: bool,
    pub surprised: bool,
    pub unconscious: bool,
    pub dead: bool,
    pub death_save_successes: u8,
    pub death_save_failures: u8,
}

/// Serializable view of a whole session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub phase: Phase,
    pub round: u32,
    pub current_turn_index: Option<usize>,
    pub started_at: DateTime<Utc>,
    pub combatants: Vec<CombatantView>,
}
