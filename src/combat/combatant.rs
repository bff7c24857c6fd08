//! Combatants
//!
//! A combatant is one participant in one session: a player's active
//! character or a spawned NPC. It carries combat status only. Speed and AC
//! are looked up live through the `CharacterProvider`; the initiative bonus
//! is captured once at construction.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ids::{CombatantId, EntityId, PlayerId};
use super::stats::{CharacterProvider, EntityInstance};
use crate::config::EngineConfig;
use crate::error::CombatError;

/// Name shown to unprivileged viewers for hidden combatants
pub const REDACTED_NAME: &str = "???";

/// Number of successes or failures that settles a death-save sequence
pub const DEATH_SAVE_LIMIT: u8 = 3;

/// What a combatant is backed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatantKind {
    Player(PlayerId),
    Entity(EntityId),
}

/// Death-save counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathSaves {
    pub successes: u8,
    pub failures: u8,
    pub stabilized: bool,
}

/// Result of applying a rolled death save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathSaveOutcome {
    /// Natural 20: counters reset, combatant is conscious again
    Revived,
    Success { successes: u8 },
    Failure { failures: u8 },
    Stabilized,
    Died,
    /// The combatant was already dead; nothing changed
    AlreadyDead,
}

/// A participant in a combat session
#[derive(Debug, Clone)]
pub struct Combatant {
    id: CombatantId,
    kind: CombatantKind,
    base_name: String,
    display_name: String,
    pub(crate) initiative: i32,
    initiative_bonus: i32,
    pub(crate) surprised: bool,
    pub(crate) hidden: bool,
    pub(crate) unconscious: bool,
    pub(crate) dead: bool,
    death_saves: DeathSaves,
}

impl Combatant {
    fn new(kind: CombatantKind, name: String, initiative_bonus: i32) -> Self {
        let id = match kind {
            CombatantKind::Player(p) => CombatantId::from(p),
            CombatantKind::Entity(e) => CombatantId::from(e),
        };
        Self {
            id,
            kind,
            display_name: name.clone(),
            base_name: name,
            initiative: 0,
            initiative_bonus,
            surprised: false,
            hidden: false,
            unconscious: false,
            dead: false,
            death_saves: DeathSaves::default(),
        }
    }

    /// Create a combatant from a player's active character.
    ///
    /// Fails if the player has no active character.
    pub fn player(player: PlayerId, provider: &dyn CharacterProvider) -> Result<Self, CombatError> {
        let sheet = provider
            .active_character(player)
            .ok_or(CombatError::NoActiveCharacter(player))?;
        let bonus = sheet.initiative_bonus();
        debug!("Combatant for {} ({}), initiative bonus {}", player, sheet.name, bonus);
        Ok(Self::new(CombatantKind::Player(player), sheet.name, bonus))
    }

    /// Create a combatant from a spawned entity. Never fails.
    pub fn entity(instance: &EntityInstance) -> Self {
        Self::new(
            CombatantKind::Entity(instance.id),
            instance.template.name.clone(),
            instance.template.initiative_bonus(),
        )
    }

    pub fn id(&self) -> CombatantId {
        self.id
    }

    pub fn kind(&self) -> CombatantKind {
        self.kind
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, CombatantKind::Player(_))
    }

    /// The backing player, if this is a player combatant
    pub fn player_id(&self) -> Option<PlayerId> {
        match self.kind {
            CombatantKind::Player(p) => Some(p),
            CombatantKind::Entity(_) => None,
        }
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Name as seen by a viewer; hidden combatants are redacted unless privileged
    pub fn display_name(&self, privileged: bool) -> &str {
        if self.hidden && !privileged {
            REDACTED_NAME
        } else {
            &self.display_name
        }
    }

    pub(crate) fn set_display_name(&mut self, name: String) {
        self.display_name = name;
    }

    pub fn initiative(&self) -> i32 {
        self.initiative
    }

    pub fn initiative_bonus(&self) -> i32 {
        self.initiative_bonus
    }

    pub fn is_surprised(&self) -> bool {
        self.surprised
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_unconscious(&self) -> bool {
        self.unconscious
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Players can only hide while up; the facilitator may hide entities freely
    pub fn can_hide(&self) -> bool {
        match self.kind {
            CombatantKind::Player(_) => !self.unconscious && !self.dead,
            CombatantKind::Entity(_) => true,
        }
    }

    /// Current walking speed in feet, or the configured default
    pub fn speed(&self, provider: &dyn CharacterProvider, config: &EngineConfig) -> u32 {
        let speed = match self.kind {
            CombatantKind::Player(p) => provider.active_character(p).map(|c| c.speed),
            CombatantKind::Entity(e) => provider.entity_stats(e).map(|s| s.speed),
        };
        speed.unwrap_or(config.default_speed)
    }

    /// Current armor class, or the configured default
    pub fn armor_class(&self, provider: &dyn CharacterProvider, config: &EngineConfig) -> i32 {
        let ac = match self.kind {
            CombatantKind::Player(p) => provider.active_character(p).map(|c| c.armor_class),
            CombatantKind::Entity(e) => provider.entity_stats(e).map(|s| s.armor_class),
        };
        ac.unwrap_or(config.default_armor_class)
    }

    pub fn death_saves(&self) -> DeathSaves {
        self.death_saves
    }

    /// Record a death-save success
    pub fn add_success(&mut self) {
        if self.dead {
            return;
        }
        self.death_saves.successes = (self.death_saves.successes + 1).min(DEATH_SAVE_LIMIT);
        if self.death_saves.successes >= DEATH_SAVE_LIMIT {
            self.death_saves.stabilized = true;
        }
    }

    /// Record `count` death-save failures
    pub fn add_failure(&mut self, count: u8) {
        self.death_saves.failures = self
            .death_saves
            .failures
            .saturating_add(count)
            .min(DEATH_SAVE_LIMIT);
        if self.death_saves.failures >= DEATH_SAVE_LIMIT {
            self.dead = true;
        }
    }

    pub fn reset_death_saves(&mut self) {
        self.death_saves = DeathSaves::default();
    }

    /// Apply a rolled d20 death save
    pub fn apply_death_save_roll(&mut self, roll: u32) -> DeathSaveOutcome {
        if self.dead {
            return DeathSaveOutcome::AlreadyDead;
        }
        match roll {
            20 => {
                self.reset_death_saves();
                self.unconscious = false;
                DeathSaveOutcome::Revived
            }
            1 => {
                self.add_failure(2);
                self.failure_outcome()
            }
            r if r >= 10 => {
                self.add_success();
                if self.death_saves.stabilized {
                    DeathSaveOutcome::Stabilized
                } else {
                    DeathSaveOutcome::Success {
                        successes: self.death_saves.successes,
                    }
                }
            }
            _ => {
                self.add_failure(1);
                self.failure_outcome()
            }
        }
    }

    fn failure_outcome(&self) -> DeathSaveOutcome {
        if self.dead {
            DeathSaveOutcome::Died
        } else {
            DeathSaveOutcome::Failure {
                failures: self.death_saves.failures,
            }
        }
    }
}

impl PartialEq for Combatant {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Combatant {}

impl Hash for Combatant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::stats::{Ability, AbilityScores, CharacterSheet, NpcTemplate, StaticProvider};

    fn wolf_template() -> NpcTemplate {
        let mut abilities = AbilityScores::new();
        abilities.insert(Ability::Dex, 15);
        NpcTemplate {
            name: "Wolf".to_string(),
            speed: 40,
            armor_class: 13,
            proficiency_bonus: 2,
            abilities,
        }
    }

    fn fighter() -> CharacterSheet {
        CharacterSheet {
            name: "Brom".to_string(),
            dex_modifier: 1,
            proficiency_bonus: 2,
            speed: 25,
            armor_class: 18,
            features: vec![],
        }
    }

    #[test]
    fn test_player_without_character_fails() {
        let provider = StaticProvider::new();
        let player = PlayerId::new();

        let result = Combatant::player(player, &provider);
        assert!(matches!(result, Err(CombatError::NoActiveCharacter(p)) if p == player));
    }

    #[test]
    fn test_player_combatant() {
        let provider = StaticProvider::new();
        let player = PlayerId::new();
        provider.set_character(player, fighter());

        let c = Combatant::player(player, &provider).unwrap();
        assert_eq!(c.id(), CombatantId::from(player));
        assert!(c.is_player());
        assert_eq!(c.player_id(), Some(player));
        assert_eq!(c.base_name(), "Brom");
        assert_eq!(c.initiative_bonus(), 1);
        assert_eq!(c.speed(&provider, &EngineConfig::default()), 25);
        assert_eq!(c.armor_class(&provider, &EngineConfig::default()), 18);
    }

    #[test]
    fn test_initiative_bonus_is_cached() {
        let provider = StaticProvider::new();
        let player = PlayerId::new();
        provider.set_character(player, fighter());
        let c = Combatant::player(player, &provider).unwrap();

        let mut faster = fighter();
        faster.dex_modifier = 4;
        provider.set_character(player, faster);

        assert_eq!(c.initiative_bonus(), 1);
    }

    #[test]
    fn test_entity_stats_fall_back_to_defaults() {
        let provider = StaticProvider::new();
        let wolf = provider.spawn(wolf_template());
        let c = Combatant::entity(&wolf);
        let config = EngineConfig::default();

        assert!(!c.is_player());
        assert_eq!(c.initiative_bonus(), 2);
        assert_eq!(c.speed(&provider, &config), 40);

        provider.despawn(wolf.id);
        assert_eq!(c.speed(&provider, &config), 30);
        assert_eq!(c.armor_class(&provider, &config), 10);
    }

    #[test]
    fn test_equality_is_by_id() {
        let provider = StaticProvider::new();
        let wolf = provider.spawn(wolf_template());
        let a = Combatant::entity(&wolf);
        let mut b = Combatant::entity(&wolf);
        b.set_display_name("Wolf #2".to_string());
        b.hidden = true;

        assert_eq!(a, b);

        let other = Combatant::entity(&provider.spawn(wolf_template()));
        assert_ne!(a, other);
    }

    #[test]
    fn test_hidden_name_redaction() {
        let provider = StaticProvider::new();
        let mut c = Combatant::entity(&provider.spawn(wolf_template()));

        assert_eq!(c.display_name(false), "Wolf");
        c.hidden = true;
        assert_eq!(c.display_name(false), REDACTED_NAME);
        assert_eq!(c.display_name(true), "Wolf");
    }

    #[test]
    fn test_can_hide_by_kind() {
        let provider = StaticProvider::new();
        let player = PlayerId::new();
        provider.set_character(player, fighter());
        let mut pc = Combatant::player(player, &provider).unwrap();
        let mut npc = Combatant::entity(&provider.spawn(wolf_template()));

        assert!(pc.can_hide());
        pc.unconscious = true;
        assert!(!pc.can_hide());

        npc.unconscious = true;
        assert!(npc.can_hide());
    }

    #[test]
    fn test_death_saves_stabilize() {
        let provider = StaticProvider::new();
        let mut c = Combatant::entity(&provider.spawn(wolf_template()));

        c.add_success();
        c.add_success();
        assert!(!c.death_saves().stabilized);
        c.add_failure(2);
        c.add_success();
        assert!(c.death_saves().stabilized);
        assert!(!c.is_dead());

        c.reset_death_saves();
        assert_eq!(c.death_saves(), DeathSaves::default());
    }

    #[test]
    fn test_three_failures_kill() {
        let provider = StaticProvider::new();
        let mut c = Combatant::entity(&provider.spawn(wolf_template()));

        c.add_failure(1);
        assert!(!c.is_dead());
        c.add_failure(2);
        assert!(c.is_dead());
        assert_eq!(c.death_saves().failures, 3);

        // Successes no longer count once dead
        c.add_success();
        assert_eq!(c.death_saves().successes, 0);
    }

    #[test]
    fn test_death_save_rolls() {
        let provider = StaticProvider::new();
        let mut c = Combatant::entity(&provider.spawn(wolf_template()));
        c.unconscious = true;

        assert_eq!(
            c.apply_death_save_roll(12),
            DeathSaveOutcome::Success { successes: 1 }
        );
        assert_eq!(
            c.apply_death_save_roll(1),
            DeathSaveOutcome::Failure { failures: 2 }
        );
        assert_eq!(c.apply_death_save_roll(20), DeathSaveOutcome::Revived);
        assert!(!c.is_unconscious());
        assert_eq!(c.death_saves(), DeathSaves::default());

        c.unconscious = true;
        assert_eq!(
            c.apply_death_save_roll(9),
            DeathSaveOutcome::Failure { failures: 1 }
        );
        assert_eq!(c.apply_death_save_roll(1), DeathSaveOutcome::Died);
        assert_eq!(c.apply_death_save_roll(20), DeathSaveOutcome::AlreadyDead);
    }

    #[test]
    fn test_death_save_rolls_stabilize() {
        let provider = StaticProvider::new();
        let mut c = Combatant::entity(&provider.spawn(wolf_template()));

        c.apply_death_save_roll(10);
        c.apply_death_save_roll(15);
        assert_eq!(c.apply_death_save_roll(19), DeathSaveOutcome::Stabilized);
    }
}
