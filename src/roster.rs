//! Encounter roster files
//!
//! A roster describes who takes part in an encounter: players with their
//! character sheets and NPC templates with a head count. It is loaded from
//! TOML through figment and used to populate a session.

use std::path::Path;

use figment::providers::{Format, Toml};
use figment::Figment;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::combat::{CharacterSheet, CombatSession, Combatant, NpcTemplate, PlayerId, StaticProvider};
use crate::error::CombatError;

/// A player entry
#[derive(Debug, Clone, Deserialize)]
pub struct RosterPlayer {
    #[serde(flatten)]
    pub sheet: CharacterSheet,
    #[serde(default)]
    pub surprised: bool,
    #[serde(default)]
    pub hidden: bool,
}

/// An NPC entry, spawned `count` times
#[derive(Debug, Clone, Deserialize)]
pub struct RosterNpc {
    #[serde(flatten)]
    pub template: NpcTemplate,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub surprised: bool,
    #[serde(default)]
    pub hidden: bool,
}

fn default_count() -> u32 {
    1
}

/// Everyone in an encounter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Roster {
    #[serde(default)]
    pub players: Vec<RosterPlayer>,
    #[serde(default)]
    pub npcs: Vec<RosterNpc>,
}

impl Roster {
    /// Load a roster from a TOML file
    pub fn load(path: &Path) -> Result<Self, CombatError> {
        if !path.exists() {
            return Err(CombatError::Roster(format!(
                "roster file not found: {}",
                path.display()
            )));
        }
        Ok(Figment::from(Toml::file(path)).extract()?)
    }

    /// Parse a roster from a TOML string
    pub fn from_toml(source: &str) -> Result<Self, CombatError> {
        Ok(Figment::from(Toml::string(source)).extract()?)
    }

    /// Register characters and spawn NPCs in `provider`, then add everyone to
    /// the session with their surprise and hidden flags. Returns how many
    /// combatants were added.
    ///
    /// Stops at the first combatant the session turns away (it is full or
    /// has ended); that combatant is taken back out of `provider`.
    pub fn populate(
        &self,
        provider: &StaticProvider,
        session: &mut CombatSession,
    ) -> Result<usize, CombatError> {
        let mut added = 0;

        for entry in &self.players {
            let player = PlayerId::new();
            provider.set_character(player, entry.sheet.clone());
            let combatant = Combatant::player(player, provider)?;
            if !Self::admit(session, combatant, entry.surprised, entry.hidden) {
                provider.remove_character(player);
                return Ok(Self::turned_away(session, added, &entry.sheet.name));
            }
            added += 1;
        }

        for entry in &self.npcs {
            for _ in 0..entry.count {
                let instance = provider.spawn(entry.template.clone());
                let combatant = Combatant::entity(&instance);
                if !Self::admit(session, combatant, entry.surprised, entry.hidden) {
                    provider.despawn(instance.id);
                    return Ok(Self::turned_away(session, added, &entry.template.name));
                }
                added += 1;
            }
        }

        debug!("Roster populated session {} with {} combatants", session.id(), added);
        Ok(added)
    }

    fn turned_away(session: &CombatSession, added: usize, name: &str) -> usize {
        warn!(
            "Session {} turned away {} after {} combatants; rest of roster skipped",
            session.id(),
            name,
            added
        );
        added
    }

    fn admit(
        session: &mut CombatSession,
        combatant: Combatant,
        surprised: bool,
        hidden: bool,
    ) -> bool {
        let id = combatant.id();
        if !session.add_combatant(combatant) {
            return false;
        }
        if surprised {
            session.mark_surprised(id);
        }
        if hidden {
            session.set_hidden(id, true);
        }
        true
    }
}
