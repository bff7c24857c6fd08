//! Character and NPC stat sources
//!
//! The combat engine does not own character sheets. It asks a
//! `CharacterProvider` for the handful of numbers it needs:
//! - Initiative bonus inputs (DEX modifier, proficiency, features)
//! - Speed, for the per-turn movement budget
//! - Armor class

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::ids::{EntityId, PlayerId};

/// The six ability scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ability {
    Str,
    Dex,
    Con,
    Int,
    Wis,
    Cha,
}

impl FromStr for Ability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "str" | "strength" => Ok(Ability::Str),
            "dex" | "dexterity" => Ok(Ability::Dex),
            "con" | "constitution" => Ok(Ability::Con),
            "int" | "intelligence" => Ok(Ability::Int),
            "wis" | "wisdom" => Ok(Ability::Wis),
            "cha" | "charisma" => Ok(Ability::Cha),
            _ => Err(format!("Unknown ability: {}", s)),
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Ability::Str => "str",
            Ability::Dex => "dex",
            Ability::Con => "con",
            Ability::Int => "int",
            Ability::Wis => "wis",
            Ability::Cha => "cha",
        };
        write!(f, "{}", s)
    }
}

/// Raw ability scores keyed by ability
pub type AbilityScores = HashMap<Ability, i32>;

/// Standard modifier for an ability score: `floor((score - 10) / 2)`
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// Passive sources of initiative bonus on a character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Adds half the proficiency bonus (rounded down) to initiative
    JackOfAllTrades,
    /// Flat +5 to initiative
    Alert,
}

impl Feature {
    /// Initiative contribution of this feature for a given proficiency bonus
    pub fn initiative_bonus(&self, proficiency_bonus: i32) -> i32 {
        match self {
            Feature::JackOfAllTrades => proficiency_bonus.div_euclid(2),
            Feature::Alert => 5,
        }
    }
}

/// The active character of a player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSheet {
    /// Character name, used as the combatant's base name
    pub name: String,
    pub dex_modifier: i32,
    pub proficiency_bonus: i32,
    /// Walking speed in feet
    pub speed: u32,
    pub armor_class: i32,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl CharacterSheet {
    /// DEX modifier plus every passive initiative source
    pub fn initiative_bonus(&self) -> i32 {
        self.dex_modifier
            + self
                .features
                .iter()
                .map(|f| f.initiative_bonus(self.proficiency_bonus))
                .sum::<i32>()
    }

    pub fn derived(&self) -> DerivedStats {
        DerivedStats {
            speed: self.speed,
            armor_class: self.armor_class,
        }
    }
}

/// Stat block an NPC is spawned from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcTemplate {
    pub name: String,
    pub speed: u32,
    pub armor_class: i32,
    #[serde(default)]
    pub proficiency_bonus: i32,
    #[serde(default)]
    pub abilities: AbilityScores,
}

impl NpcTemplate {
    /// Modifier for an ability; a missing score counts as 10
    pub fn modifier(&self, ability: Ability) -> i32 {
        ability_modifier(self.abilities.get(&ability).copied().unwrap_or(10))
    }

    /// NPC initiative bonus is the plain DEX modifier
    pub fn initiative_bonus(&self) -> i32 {
        self.modifier(Ability::Dex)
    }

    pub fn derived(&self) -> DerivedStats {
        DerivedStats {
            speed: self.speed,
            armor_class: self.armor_class,
        }
    }
}

/// A spawned NPC: an instance id plus the template it came from
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInstance {
    pub id: EntityId,
    pub template: NpcTemplate,
}

impl EntityInstance {
    pub fn new(template: NpcTemplate) -> Self {
        Self {
            id: EntityId::new(),
            template,
        }
    }
}

/// Stats that are looked up live rather than cached on the combatant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedStats {
    pub speed: u32,
    pub armor_class: i32,
}

/// External source of character data
pub trait CharacterProvider: Send + Sync {
    /// The player's active character, if they have one
    fn active_character(&self, player: PlayerId) -> Option<CharacterSheet>;

    /// Live stats for a spawned entity; `None` once it has despawned
    fn entity_stats(&self, entity: EntityId) -> Option<DerivedStats>;
}

/// In-memory provider, used by the encounter runner and tests
#[derive(Debug, Default)]
pub struct StaticProvider {
    characters: RwLock<HashMap<PlayerId, CharacterSheet>>,
    entities: RwLock<HashMap<EntityId, DerivedStats>>,
}

impl StaticProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) a player's active character
    pub fn set_character(&self, player: PlayerId, sheet: CharacterSheet) {
        self.characters.write().insert(player, sheet);
    }

    /// Clear a player's active character
    pub fn remove_character(&self, player: PlayerId) -> bool {
        self.characters.write().remove(&player).is_some()
    }

    /// Spawn an instance of a template and track its stats
    pub fn spawn(&self, template: NpcTemplate) -> EntityInstance {
        let instance = EntityInstance::new(template);
        self.entities
            .write()
            .insert(instance.id, instance.template.derived());
        instance
    }

    /// Number of spawned entities still tracked
    pub fn entity_count(&self) -> usize {
        self.entities.read().len()
    }

    /// Forget an entity; later lookups fall back to defaults
    pub fn despawn(&self, entity: EntityId) -> bool {
        self.entities.write().remove(&entity).is_some()
    }
}

impl CharacterProvider for StaticProvider {
    fn active_character(&self, player: PlayerId) -> Option<CharacterSheet> {
        self.characters.read().get(&player).cloned()
    }

    fn entity_stats(&self, entity: EntityId) -> Option<DerivedStats> {
        self.entities.read().get(&entity).copied()
    }
}
