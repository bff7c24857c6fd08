//! combatd - tabletop combat orchestration engine
//!
//! Tracks combat sessions for a multiplayer game: the roster, initiative
//! order, whose turn it is, and what each combatant has spent this turn.

pub mod combat;
pub mod config;
pub mod error;
pub mod roster;

pub use config::EngineConfig;
pub use error::CombatError;
