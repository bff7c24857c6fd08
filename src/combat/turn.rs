//! Per-turn resource tracking
//!
//! A `TurnState` lives for exactly one combatant turn. It tracks the action
//! economy and a movement budget. Movement is the straight-line distance from
//! where the turn started, not the path walked, so stepping back toward the
//! start gives movement back.

use serde::{Deserialize, Serialize};

/// A position snapshot in some world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// Euclidean distance in world units, or `None` across worlds
    pub fn distance_to(&self, other: &Location) -> Option<f64> {
        if self.world != other.world {
            return None;
        }
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        Some((dx * dx + dy * dy + dz * dz).sqrt())
    }
}

/// Result of feeding a new position into the tracker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementUpdate {
    /// Feet used so far this turn
    pub used: f64,
    /// Feet left in the budget (never negative)
    pub remaining: f64,
    /// True only on the update that first crosses the budget
    pub newly_over: bool,
}

/// Action economy and movement for the current turn
#[derive(Debug, Clone)]
pub struct TurnState {
    pub action_used: bool,
    pub bonus_action_used: bool,
    pub reaction_used: bool,
    movement_used: f64,
    movement_budget: f64,
    movement_warned: bool,
    turn_start_location: Location,
}

impl TurnState {
    /// Start a turn with a movement budget in feet
    pub fn new(movement_budget: u32, turn_start_location: Location) -> Self {
        Self {
            action_used: false,
            bonus_action_used: false,
            reaction_used: false,
            movement_used: 0.0,
            movement_budget: f64::from(movement_budget),
            movement_warned: false,
            turn_start_location,
        }
    }

    pub fn movement_used(&self) -> f64 {
        self.movement_used
    }

    pub fn movement_budget(&self) -> f64 {
        self.movement_budget
    }

    pub fn movement_remaining(&self) -> f64 {
        (self.movement_budget - self.movement_used).max(0.0)
    }

    pub fn movement_warned(&self) -> bool {
        self.movement_warned
    }

    /// Where the combatant stood when the turn began
    pub fn turn_start_location(&self) -> &Location {
        &self.turn_start_location
    }

    /// Strictly over budget
    pub fn is_over_budget(&self) -> bool {
        self.movement_used > self.movement_budget
    }

    /// Set movement used (feet). Dropping back within budget re-arms the warning.
    pub fn set_movement_used(&mut self, feet: f64) {
        self.movement_used = feet.max(0.0);
        if !self.is_over_budget() {
            self.movement_warned = false;
        }
    }

    /// Mark that the over-budget warning has been shown
    pub fn mark_warned(&mut self) {
        self.movement_warned = true;
    }

    /// Reset movement to zero. Moving the avatar back is the caller's job.
    pub fn undo_movement(&mut self) {
        self.movement_used = 0.0;
        self.movement_warned = false;
    }

    /// Recompute movement from a new position.
    ///
    /// Returns `None` when the position is in another world than the turn
    /// start (a teleport); movement is left unchanged in that case.
    pub fn track_position(&mut self, current: &Location, feet_per_unit: f64) -> Option<MovementUpdate> {
        let units = self.turn_start_location.distance_to(current)?;
        self.set_movement_used(units * feet_per_unit);

        let newly_over = self.is_over_budget() && !self.movement_warned;
        if newly_over {
            self.mark_warned();
        }

        Some(MovementUpdate {
            used: self.movement_used,
            remaining: self.movement_remaining(),
            newly_over,
        })
    }
}
