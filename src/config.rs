//! Engine configuration
//!
//! Layered with figment: built-in defaults, then an optional TOML file, then
//! `COMBATD_*` environment variables.

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::CombatError;

/// Environment variable prefix for overrides (e.g. `COMBATD_FEET_PER_UNIT=1.0`)
pub const ENV_PREFIX: &str = "COMBATD_";

/// Tunables for the combat engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// World length units to feet, for movement tracking
    pub feet_per_unit: f64,
    /// Speed used when a combatant's stats cannot be resolved
    pub default_speed: u32,
    /// Armor class used when a combatant's stats cannot be resolved
    pub default_armor_class: i32,
    /// Largest roster a single session accepts
    pub max_combatants: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            feet_per_unit: 5.0,
            default_speed: 30,
            default_armor_class: 10,
            max_combatants: 64,
        }
    }
}

impl EngineConfig {
    /// Build the layered figment without extracting it
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load configuration from defaults, an optional file, and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, CombatError> {
        Ok(Self::figment(path).extract()?)
    }
}
