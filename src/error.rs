//! Error types

use thiserror::Error;

use crate::combat::PlayerId;

/// Failures surfaced to callers as explicit values.
///
/// Duplicate adds, stale references, and phase misuse are not errors; those
/// operations return `bool`/`Option` and leave the session untouched.
#[derive(Debug, Error)]
pub enum CombatError {
    #[error("{0} has no active character")]
    NoActiveCharacter(PlayerId),

    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("invalid roster: {0}")]
    Roster(String),
}

impl From<figment::Error> for CombatError {
    fn from(e: figment::Error) -> Self {
        CombatError::Config(Box::new(e))
    }
}
