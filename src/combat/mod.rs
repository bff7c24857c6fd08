//! Combat orchestration
//!
//! Tracks who is fighting, in what order, and whose turn it is:
//! - Combatants (players and NPC entities) with status and death saves
//! - Initiative rolls and ordering
//! - The turn state machine, including surprise and round rollover
//! - Per-turn action economy and movement budget
//! - A registry keeping each player in at most one active session

mod combatant;
mod dice;
mod ids;
mod observer;
mod registry;
mod session;
mod stats;
mod turn;

pub use combatant::{
    Combatant, CombatantKind, DeathSaveOutcome, DeathSaves, DEATH_SAVE_LIMIT, REDACTED_NAME,
};
pub use dice::{DiceRoll, DieRoller, RandomRoller, ScriptedRoller};
pub use ids::{CombatantId, EntityId, PlayerId, SessionId};
pub use observer::{
    CombatantView, NullObserver, SessionEvent, SessionObserver, SessionSnapshot, TracingObserver,
};
pub use registry::{SessionManager, SessionRegistry};
pub use session::{CombatSession, Phase, SessionContext, SharedSession};
pub use stats::{
    ability_modifier, Ability, AbilityScores, CharacterProvider, CharacterSheet, DerivedStats,
    EntityInstance, Feature, NpcTemplate, StaticProvider,
};
pub use turn::{Location, MovementUpdate, TurnState};
