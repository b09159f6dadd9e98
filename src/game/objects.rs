//! Collectible and area objects: treasures, power-ups, scripts and
//! bermuda zones.

use crate::game::location::Location;
use crate::game::pirate::Pirate;
use crate::game::PlayerId;

/// Unique identifier of a treasure.
pub type TreasureId = usize;

/// A collectible scoring object. Carried by at most one pirate at a time;
/// never destroyed, only cycled between available and carried.
#[derive(Debug, Clone)]
pub struct Treasure {
    /// Treasure identifier.
    pub id: TreasureId,
    /// Spawn square; treasures are always picked up and banked from here.
    pub location: Location,
    /// Points scored for banking it.
    pub value: i32,
    /// Whether the treasure currently sits unowned on its spawn square.
    pub is_available: bool,
    /// Countdown until a banked treasure reappears; -1 when idle.
    pub spawn_turns: i32,
    /// Per-turn availability, for the replay.
    pub available_history: Vec<bool>,
}

impl Treasure {
    /// Create an available treasure at its spawn square.
    #[must_use]
    pub fn new(id: TreasureId, location: Location, value: i32) -> Self {
        Self {
            id,
            location,
            value,
            is_available: true,
            spawn_turns: -1,
            available_history: Vec::new(),
        }
    }
}

/// The effect a power-up grants to the pirate that picks it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerupEffect {
    /// Larger squared attack radius and no reload while active.
    Attack {
        /// The boosted squared attack radius.
        attack_radius: i32,
    },
    /// Stolen treasures transfer to the attacker instead of dropping.
    Rob,
    /// Raised step cap while carrying a treasure.
    Speed {
        /// The boosted carry-treasure step cap.
        carry_treasure_speed: i32,
    },
}

/// A timed buff placed on the map for a window of turns.
///
/// Picking one up collapses its window to the current turn, so it
/// disappears from the map without being removed from the collection.
#[derive(Debug, Clone, Copy)]
pub struct Powerup {
    /// Power-up identifier.
    pub id: usize,
    /// Square the power-up appears on.
    pub location: Location,
    /// First turn it is on the map.
    pub start_turn: u32,
    /// First turn it is no longer on the map.
    pub end_turn: u32,
    /// Duration of the effect once picked up.
    pub active_turns: u32,
    /// The effect variant.
    pub effect: PowerupEffect,
}

impl Powerup {
    /// Name used on the wire and in the replay.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self.effect {
            PowerupEffect::Attack { .. } => "attack",
            PowerupEffect::Rob => "rob",
            PowerupEffect::Speed { .. } => "speed",
        }
    }

    /// The type-specific magnitude, if the variant has one.
    #[must_use]
    pub const fn value(&self) -> Option<i32> {
        match self.effect {
            PowerupEffect::Attack { attack_radius } => Some(attack_radius),
            PowerupEffect::Rob => None,
            PowerupEffect::Speed { carry_treasure_speed } => Some(carry_treasure_speed),
        }
    }

    /// Whether the power-up sits on the map on `turn`.
    #[must_use]
    pub const fn is_on_map(&self, turn: u32) -> bool {
        self.start_turn <= turn && turn < self.end_turn
    }

    /// Apply the effect to the pirate that picked this power-up up.
    pub fn activate(&self, pirate: &mut Pirate) {
        match self.effect {
            PowerupEffect::Attack { attack_radius } => {
                pirate.attack_radius = attack_radius;
                pirate.reload_turns = 0;
                pirate.attack_powerup_active_turns = self.active_turns;
            }
            PowerupEffect::Rob => {
                pirate.rob_powerup_active_turns = self.active_turns;
            }
            PowerupEffect::Speed { carry_treasure_speed } => {
                pirate.carry_treasure_speed = carry_treasure_speed;
                pirate.speed_powerup_active_turns = self.active_turns;
            }
        }
        let name = self.kind_name().to_string();
        if !pirate.powerups.contains(&name) {
            pirate.powerups.push(name);
        }
    }
}

/// A script (or anti-script) pickup, placed for a window of turns.
///
/// Scripts raise the owning player's script counter; anti-scripts lower
/// it. Consumption collapses the window like power-ups.
#[derive(Debug, Clone, Copy)]
pub struct Script {
    /// Script identifier.
    pub id: usize,
    /// Square the script appears on.
    pub location: Location,
    /// First turn it is on the map.
    pub start_turn: u32,
    /// First turn it is no longer on the map.
    pub end_turn: u32,
}

impl Script {
    /// Whether the script sits on the map on `turn`.
    #[must_use]
    pub const fn is_on_map(&self, turn: u32) -> bool {
        self.start_turn <= turn && turn < self.end_turn
    }
}

/// An area-effect kill zone summoned by spending scripts.
///
/// Kills enemy pirates inside its radius every turn until the countdown
/// runs out.
#[derive(Debug, Clone, Copy)]
pub struct BermudaZone {
    /// The summoning player.
    pub owner: PlayerId,
    /// Remaining active turns.
    pub active_turns: u32,
    /// Turn the zone was summoned on.
    pub start_turn: u32,
    /// Center square.
    pub center: Location,
    /// Squared radius.
    pub radius: i32,
}
