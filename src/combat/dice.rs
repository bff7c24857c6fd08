//! Dice rolling
//!
//! The engine only ever rolls a d20 for initiative, but the roller is a seam:
//! production uses `RandomRoller`, tests and replays use `ScriptedRoller`.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;
use rand::Rng;

/// Source of die results
pub trait DieRoller: Send + Sync {
    /// Roll one die with the given number of sides, returning `1..=sides`
    fn roll(&self, sides: u32) -> u32;
}

/// Roller backed by the thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomRoller;

impl DieRoller for RandomRoller {
    fn roll(&self, sides: u32) -> u32 {
        rand::rng().random_range(1..=sides.max(1))
    }
}

/// Roller that replays a fixed sequence of results.
///
/// Once the script runs out it starts over from the beginning. Values are
/// clamped into `1..=sides` so a script written for d20s stays valid for
/// smaller dice.
#[derive(Debug)]
pub struct ScriptedRoller {
    script: Vec<u32>,
    pending: Mutex<VecDeque<u32>>,
}

impl ScriptedRoller {
    /// Create a roller from a sequence of results
    pub fn new(script: impl Into<Vec<u32>>) -> Self {
        let script = script.into();
        let pending = Mutex::new(script.iter().copied().collect());
        Self { script, pending }
    }

    /// Number of scripted results not yet consumed in the current pass
    pub fn remaining(&self) -> usize {
        self.pending.lock().len()
    }
}

impl DieRoller for ScriptedRoller {
    fn roll(&self, sides: u32) -> u32 {
        let sides = sides.max(1);
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            pending.extend(self.script.iter().copied());
        }
        pending.pop_front().unwrap_or(1).clamp(1, sides)
    }
}

/// A dice expression such as `1d20+3`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceRoll {
    /// Number of dice to roll
    pub count: u32,
    /// Number of sides per die
    pub sides: u32,
    /// Modifier to add/subtract
    pub modifier: i32,
}

impl DiceRoll {
    /// Create a new dice roll
    pub fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self {
            count,
            sides,
            modifier,
        }
    }

    /// The initiative roll for a given bonus: `1d20 + bonus`
    pub fn initiative(bonus: i32) -> Self {
        Self::new(1, 20, bonus)
    }

    /// Roll the dice with the given roller and return the total
    pub fn roll_with(&self, roller: &dyn DieRoller) -> i32 {
        let sum: i32 = (0..self.count).map(|_| roller.roll(self.sides) as i32).sum();
        sum + self.modifier
    }

    /// Get the minimum possible result
    pub fn min(&self) -> i32 {
        self.count as i32 + self.modifier
    }

    /// Get the maximum possible result
    pub fn max(&self) -> i32 {
        (self.count * self.sides) as i32 + self.modifier
    }
}

impl fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifier > 0 {
            write!(f, "{}d{}+{}", self.count, self.sides, self.modifier)
        } else if self.modifier < 0 {
            write!(f, "{}d{}{}", self.count, self.sides, self.modifier)
        } else {
            write!(f, "{}d{}", self.count, self.sides)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_roller_bounds() {
        let roller = RandomRoller;
        for _ in 0..200 {
            let roll = roller.roll(20);
            assert!((1..=20).contains(&roll), "d20 rolled {}", roll);
        }
    }

    #[test]
    fn test_scripted_roller_replays_and_wraps() {
        let roller = ScriptedRoller::new(vec![12, 7]);
        assert_eq!(roller.roll(20), 12);
        assert_eq!(roller.roll(20), 7);
        assert_eq!(roller.remaining(), 0);

        // Starts over
        assert_eq!(roller.roll(20), 12);
    }

    #[test]
    fn test_scripted_roller_clamps() {
        let roller = ScriptedRoller::new(vec![25, 0]);
        assert_eq!(roller.roll(20), 20);
        assert_eq!(roller.roll(20), 1);
    }

    #[test]
    fn test_initiative_roll_adds_bonus() {
        let roller = ScriptedRoller::new(vec![11]);
        let roll = DiceRoll::initiative(3);
        assert_eq!(roll.roll_with(&roller), 14);
        assert_eq!(roll.min(), 4);
        assert_eq!(roll.max(), 23);
    }

    #[test]
    fn test_display() {
        assert_eq!(DiceRoll::initiative(0).to_string(), "1d20");
        assert_eq!(DiceRoll::initiative(5).to_string(), "1d20+5");
        assert_eq!(DiceRoll::initiative(-2).to_string(), "1d20-2");
    }
}
