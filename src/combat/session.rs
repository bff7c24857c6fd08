//! Combat sessions
//!
//! A `CombatSession` is one fight run by one facilitator. It owns the roster
//! and drives the turn state machine:
//!
//! ```text
//! Setup --start_combat--> Active --end_combat--> Ended
//! ```
//!
//! Not-found and duplicate conditions are answered with `false`/`None`, never
//! a panic: stale references from a slow UI must not break a running fight.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::combatant::{Combatant, DeathSaveOutcome};
use super::dice::{DiceRoll, DieRoller};
use super::ids::{CombatantId, PlayerId, SessionId};
use super::observer::{CombatantView, SessionEvent, SessionObserver, SessionSnapshot};
use super::registry::SessionRegistry;
use super::stats::CharacterProvider;
use super::turn::{Location, MovementUpdate, TurnState};
use crate::config::EngineConfig;

/// A session behind its own lock
pub type SharedSession = Arc<Mutex<CombatSession>>;

/// Coarse session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Assembling the roster; no turn order yet
    Setup,
    /// Initiative rolled, turns running
    Active,
    Ended,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Setup => "setup",
            Phase::Active => "active",
            Phase::Ended => "ended",
        };
        write!(f, "{}", s)
    }
}

/// Collaborators every session is built with
#[derive(Clone)]
pub struct SessionContext {
    pub registry: Arc<SessionRegistry>,
    pub provider: Arc<dyn CharacterProvider>,
    pub roller: Arc<dyn DieRoller>,
    pub observer: Arc<dyn SessionObserver>,
    pub config: Arc<EngineConfig>,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// One combat encounter
pub struct CombatSession {
    id: SessionId,
    facilitator: PlayerId,
    combatants: Vec<Combatant>,
    current_turn_index: usize,
    round: u32,
    phase: Phase,
    turn: Option<TurnState>,
    started_at: DateTime<Utc>,
    ctx: SessionContext,
}

impl fmt::Debug for CombatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombatSession")
            .field("id", &self.id)
            .field("facilitator", &self.facilitator)
            .field("phase", &self.phase)
            .field("round", &self.round)
            .field("current_turn_index", &self.current_turn_index)
            .field("combatants", &self.combatants.len())
            .finish()
    }
}

impl CombatSession {
    /// Start a new session in `Setup` and register it under the facilitator.
    ///
    /// Returns `None` if the facilitator already runs an active session.
    pub fn start(facilitator: PlayerId, ctx: SessionContext) -> Option<SharedSession> {
        let registry = Arc::clone(&ctx.registry);
        let session = CombatSession {
            id: SessionId::new(),
            facilitator,
            combatants: Vec::new(),
            current_turn_index: 0,
            round: 0,
            phase: Phase::Setup,
            turn: None,
            started_at: Utc::now(),
            ctx,
        };
        let id = session.id;
        let shared = Arc::new(Mutex::new(session));

        if !registry.register_session(facilitator, id, Arc::clone(&shared)) {
            warn!("{} already runs a combat session", facilitator);
            return None;
        }

        info!("Combat session {} started by {}", id, facilitator);
        Some(shared)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn facilitator(&self) -> PlayerId {
        self.facilitator
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_setup(&self) -> bool {
        self.phase == Phase::Setup
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    pub fn is_ended(&self) -> bool {
        self.phase == Phase::Ended
    }

    /// 0 during setup, 1 once combat starts
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    /// The roster, in initiative order once combat is active
    pub fn combatants(&self) -> &[Combatant] {
        &self.combatants
    }

    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combatants.is_empty()
    }

    pub fn position_of(&self, id: CombatantId) -> Option<usize> {
        self.combatants.iter().position(|c| c.id() == id)
    }

    pub fn find(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id() == id)
    }

    /// Case-insensitive lookup by display name, then by base name
    pub fn find_by_name(&self, name: &str) -> Option<&Combatant> {
        self.combatants
            .iter()
            .find(|c| c.display_name(true).eq_ignore_ascii_case(name))
            .or_else(|| {
                self.combatants
                    .iter()
                    .find(|c| c.base_name().eq_ignore_ascii_case(name))
            })
    }

    /// Display name for a viewer, `None` if not in the roster
    pub fn display_name(&self, id: CombatantId, privileged: bool) -> Option<&str> {
        self.find(id).map(|c| c.display_name(privileged))
    }

    /// Index of the current turn; `None` outside the active phase or with no combatants
    pub fn current_turn_index(&self) -> Option<usize> {
        (self.phase == Phase::Active && !self.combatants.is_empty())
            .then_some(self.current_turn_index)
    }

    /// Combatant whose turn it is
    pub fn current(&self) -> Option<&Combatant> {
        if self.phase != Phase::Active {
            return None;
        }
        self.combatants.get(self.current_turn_index)
    }

    fn current_id(&self) -> Option<CombatantId> {
        self.current().map(|c| c.id())
    }

    fn notify(&self, event: SessionEvent) {
        let observer = Arc::clone(&self.ctx.observer);
        observer.on_event(self, &event);
    }

    fn find_mut(&mut self, id: CombatantId) -> Option<&mut Combatant> {
        self.combatants.iter_mut().find(|c| c.id() == id)
    }

    /// Add a combatant.
    ///
    /// Returns false if it is already in the roster, the roster is full, the
    /// session has ended, or it is a player already fighting in another
    /// session. During an active fight the newcomer rolls initiative and
    /// slots into the existing order without restarting the round.
    pub fn add_combatant(&mut self, mut combatant: Combatant) -> bool {
        if self.phase == Phase::Ended {
            warn!("Ignoring add to ended session {}", self.id);
            return false;
        }
        if self.position_of(combatant.id()).is_some() {
            return false;
        }
        if self.combatants.len() >= self.ctx.config.max_combatants {
            warn!(
                "Session {} is full ({} combatants)",
                self.id, self.ctx.config.max_combatants
            );
            return false;
        }
        if let Some(player) = combatant.player_id() {
            if !self.ctx.registry.claim_participant(player, self.id) {
                warn!("{} is already in another combat session", player);
                return false;
            }
        }

        let id = combatant.id();
        if self.phase == Phase::Active {
            let roll = DiceRoll::initiative(combatant.initiative_bonus());
            combatant.initiative = roll.roll_with(self.ctx.roller.as_ref());
            debug!(
                "{} joins mid-combat with initiative {} ({})",
                combatant.base_name(),
                combatant.initiative,
                roll
            );
            self.combatants.push(combatant);
            self.sort_by_initiative();
        } else {
            debug!("{} added to session {}", combatant.base_name(), self.id);
            self.combatants.push(combatant);
        }

        self.renumber();
        self.notify(SessionEvent::CombatantAdded(id));
        true
    }

    /// Remove a combatant. No-op if it is not in the roster.
    ///
    /// Removing someone before the current turn shifts the index down so the
    /// same combatant stays current. Removing the current combatant hands the
    /// turn to whoever was next, wrapping to the top without a new round.
    pub fn remove_combatant(&mut self, id: CombatantId) -> bool {
        let Some(pos) = self.position_of(id) else {
            return false;
        };

        let removed = self.combatants.remove(pos);
        if let Some(player) = removed.player_id() {
            self.ctx.registry.release_participant(player, self.id);
        }

        if pos < self.current_turn_index {
            self.current_turn_index -= 1;
        } else if pos == self.current_turn_index {
            self.turn = None;
            if self.current_turn_index >= self.combatants.len() {
                self.current_turn_index = 0;
            }
        }

        debug!("{} removed from session {}", removed.base_name(), self.id);
        self.renumber();
        self.notify(SessionEvent::CombatantRemoved(id));
        true
    }

    /// Re-derive display names: duplicate entity names become `Name #1..N`
    /// in roster order, unique ones keep the bare name. Players are never
    /// renumbered.
    fn renumber(&mut self) {
        let mut totals: HashMap<String, usize> = HashMap::new();
        for c in self.combatants.iter().filter(|c| !c.is_player()) {
            *totals.entry(c.base_name().to_string()).or_default() += 1;
        }

        let mut seen: HashMap<String, usize> = HashMap::new();
        for c in self.combatants.iter_mut() {
            let base = c.base_name().to_string();
            if c.is_player() || totals.get(&base).copied().unwrap_or(0) <= 1 {
                c.set_display_name(base);
                continue;
            }
            let n = seen.entry(base.clone()).or_default();
            *n += 1;
            c.set_display_name(format!("{} #{}", base, n));
        }
    }

    /// Stable sort by initiative, then bonus, both descending. The current
    /// combatant keeps the turn across the reorder.
    fn sort_by_initiative(&mut self) {
        let current = self.current_id();
        self.combatants.sort_by(|a, b| {
            b.initiative()
                .cmp(&a.initiative())
                .then_with(|| b.initiative_bonus().cmp(&a.initiative_bonus()))
        });
        if let Some(pos) = current.and_then(|id| self.position_of(id)) {
            self.current_turn_index = pos;
        }
    }

    /// Mark a combatant surprised. Meant for the setup phase.
    pub fn mark_surprised(&mut self, id: CombatantId) -> bool {
        let Some(c) = self.find_mut(id) else {
            return false;
        };
        c.surprised = true;
        self.notify(SessionEvent::SurpriseMarked(id));
        true
    }

    /// Hide or reveal a combatant. Hiding fails if the combatant cannot hide.
    pub fn set_hidden(&mut self, id: CombatantId, hidden: bool) -> bool {
        let Some(c) = self.find_mut(id) else {
            return false;
        };
        if hidden && !c.can_hide() {
            return false;
        }
        c.hidden = hidden;
        self.notify(SessionEvent::StatusChanged(id));
        true
    }

    pub fn set_unconscious(&mut self, id: CombatantId, unconscious: bool) -> bool {
        let Some(c) = self.find_mut(id) else {
            return false;
        };
        c.unconscious = unconscious;
        if !unconscious {
            c.reset_death_saves();
        }
        self.notify(SessionEvent::StatusChanged(id));
        true
    }

    pub fn set_dead(&mut self, id: CombatantId, dead: bool) -> bool {
        let Some(c) = self.find_mut(id) else {
            return false;
        };
        c.dead = dead;
        self.notify(SessionEvent::StatusChanged(id));
        true
    }

    /// Apply an externally rolled death save
    pub fn record_death_save(&mut self, id: CombatantId, roll: u32) -> Option<DeathSaveOutcome> {
        let outcome = self.find_mut(id)?.apply_death_save_roll(roll);
        self.notify(SessionEvent::StatusChanged(id));
        Some(outcome)
    }

    /// Roll a d20 death save for a combatant
    pub fn roll_death_save(&mut self, id: CombatantId) -> Option<(u32, DeathSaveOutcome)> {
        self.position_of(id)?;
        let roll = self.ctx.roller.roll(20);
        let outcome = self.record_death_save(id, roll)?;
        debug!("Death save for {}: rolled {} -> {:?}", id, roll, outcome);
        Some((roll, outcome))
    }

    /// Roll initiative for everyone and begin round 1. Same as `start_combat`.
    pub fn roll_all_initiative(&mut self) -> bool {
        self.start_combat()
    }

    /// Roll `1d20 + bonus` for every combatant and sort the roster
    fn roll_initiative(&mut self) -> bool {
        if self.phase == Phase::Ended {
            return false;
        }
        let roller = Arc::clone(&self.ctx.roller);
        for c in self.combatants.iter_mut() {
            c.initiative = DiceRoll::initiative(c.initiative_bonus()).roll_with(roller.as_ref());
            debug!("{} rolls initiative {}", c.display_name(true), c.initiative);
        }
        self.sort_by_initiative();
        self.notify(SessionEvent::OrderChanged);
        true
    }

    /// Roll initiative for everyone and begin round 1
    pub fn start_combat(&mut self) -> bool {
        if !self.roll_initiative() {
            return false;
        }
        self.phase = Phase::Active;
        self.round = 1;
        self.current_turn_index = 0;
        self.turn = None;

        info!(
            "Combat begins in session {} with {} combatants",
            self.id,
            self.combatants.len()
        );
        self.notify(SessionEvent::CombatStarted);
        true
    }

    /// Override a combatant's initiative and re-sort
    pub fn set_initiative(&mut self, id: CombatantId, value: i32) -> bool {
        if self.phase == Phase::Ended {
            return false;
        }
        let Some(c) = self.find_mut(id) else {
            return false;
        };
        c.initiative = value;
        self.sort_by_initiative();
        self.notify(SessionEvent::OrderChanged);
        true
    }

    /// Advance to the next turn, wrapping into a new round at the end of the
    /// order. Entering round 2 clears every surprise flag.
    pub fn next_turn(&mut self) -> Option<&Combatant> {
        if self.phase != Phase::Active || self.combatants.is_empty() {
            return None;
        }

        self.turn = None;
        self.current_turn_index += 1;
        if self.current_turn_index >= self.combatants.len() {
            self.current_turn_index = 0;
            self.round += 1;
            debug!("Session {} enters round {}", self.id, self.round);
            if self.round == 2 {
                for c in self.combatants.iter_mut() {
                    c.surprised = false;
                }
            }
        }

        self.notify(SessionEvent::TurnChanged {
            round: self.round,
            current: self.current_id(),
        });
        self.current()
    }

    /// Make a specific combatant current. No round change.
    pub fn jump_to_turn(&mut self, id: CombatantId) -> bool {
        if self.phase == Phase::Ended {
            return false;
        }
        let Some(pos) = self.position_of(id) else {
            return false;
        };
        if pos != self.current_turn_index {
            self.turn = None;
        }
        self.current_turn_index = pos;
        self.notify(SessionEvent::TurnChanged {
            round: self.round,
            current: Some(id),
        });
        true
    }

    /// End `id`'s turn. Only advances if `id` is actually current; otherwise
    /// returns the unchanged current combatant.
    pub fn end_turn(&mut self, id: CombatantId) -> Option<&Combatant> {
        if self.current_id() == Some(id) {
            return self.next_turn();
        }
        self.current()
    }

    /// Advance past surprised combatants.
    ///
    /// Runs at most one full cycle of the roster. In round 1 a full cycle
    /// wraps into round 2, which clears surprise, so a roster where everyone
    /// is surprised simply takes no round-1 turns. Returns `None` only if no
    /// eligible combatant turns up within the bound.
    pub fn skip_surprised(&mut self) -> Option<&Combatant> {
        if self.phase != Phase::Active {
            return None;
        }
        for _ in 0..self.combatants.len() {
            let Some((name, surprised)) = self
                .current()
                .map(|c| (c.display_name(true).to_string(), c.is_surprised()))
            else {
                break;
            };
            if !surprised {
                break;
            }
            debug!("{} is surprised and loses the turn", name);
            self.next_turn();
        }
        self.current().filter(|c| !c.is_surprised())
    }

    /// Begin the current combatant's turn at a position, with a movement
    /// budget equal to their speed
    pub fn begin_turn(&mut self, start: Location) -> Option<&mut TurnState> {
        let speed = self
            .current()?
            .speed(self.ctx.provider.as_ref(), &self.ctx.config);
        self.turn = Some(TurnState::new(speed, start));
        self.turn.as_mut()
    }

    /// Resources of the turn in progress, if one has begun
    pub fn turn_state(&self) -> Option<&TurnState> {
        self.turn.as_ref()
    }

    pub fn turn_state_mut(&mut self) -> Option<&mut TurnState> {
        self.turn.as_mut()
    }

    /// Feed the current combatant's position into the movement tracker
    pub fn track_movement(&mut self, position: &Location) -> Option<MovementUpdate> {
        let feet_per_unit = self.ctx.config.feet_per_unit;
        self.turn.as_mut()?.track_position(position, feet_per_unit)
    }

    /// Reset movement for this turn, returning where the avatar should go back to
    pub fn undo_movement(&mut self) -> Option<Location> {
        let turn = self.turn.as_mut()?;
        turn.undo_movement();
        Some(turn.turn_start_location().clone())
    }

    /// End the fight: release every participant and unregister the session
    pub fn end_combat(&mut self) {
        if self.phase == Phase::Ended {
            return;
        }
        for player in self.combatants.iter().filter_map(|c| c.player_id()) {
            self.ctx.registry.release_participant(player, self.id);
        }
        self.combatants.clear();
        self.turn = None;
        self.current_turn_index = 0;
        self.phase = Phase::Ended;
        self.ctx.registry.unregister_session(self.facilitator, self.id);

        info!("Combat session {} ended after round {}", self.id, self.round);
        self.notify(SessionEvent::CombatEnded);
    }

    /// Serializable view of the session for a viewer
    pub fn snapshot(&self, privileged: bool) -> SessionSnapshot {
        let current = self.current_turn_index();
        let combatants = self
            .combatants
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let saves = c.death_saves();
                CombatantView {
                    id: c.id(),
                    name: c.display_name(privileged).to_string(),
                    initiative: c.initiative(),
                    is_current: current == Some(i),
                    surprised: c.is_surprised(),
                    unconscious: c.is_unconscious(),
                    dead: c.is_dead(),
                    death_save_successes: saves.successes,
                    death_save_failures: saves.failures,
                }
            })
            .collect();

        SessionSnapshot {
            session_id: self.id,
            phase: self.phase,
            round: self.round,
            current_turn_index: current,
            started_at: self.started_at,
            combatants,
        }
    }
}
