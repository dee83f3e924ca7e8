//! State shared by every structure and unit.

use serde::{Deserialize, Serialize};

use super::ObjectId;
use crate::coord::Coord;
use crate::data::{HouseId, ItemId, ObjectData};
use crate::math::{ratio, Fixed, Vec2Fixed};

/// Behavioural state governing automatic targeting and movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum AttackMode {
    /// Attack only what comes into weapon range, never chase.
    Guard = 0,
    /// Chase targets within twice the weapon range of the guard point.
    #[default]
    AreaGuard = 1,
    /// Seek out enemies anywhere on the map.
    Hunt = 2,
    /// Wait until an enemy is in sight, then hunt.
    Ambush = 3,
    /// Do nothing on its own.
    Stop = 4,
    /// Fall back to the retreat point without engaging.
    Retreat = 5,
    /// Waiting for a free carryall; retried every tick.
    CarryallRequested = 6,
    /// Infantry moving in to capture a structure.
    Capture = 7,
    /// Harvester gathering spice.
    Harvest = 8,
}

impl AttackMode {
    /// Every mode in tag order.
    pub const ALL: [Self; 9] = [
        Self::Guard,
        Self::AreaGuard,
        Self::Hunt,
        Self::Ambush,
        Self::Stop,
        Self::Retreat,
        Self::CarryallRequested,
        Self::Capture,
        Self::Harvest,
    ];

    /// Decode the tag used in commands and saves.
    #[must_use]
    pub fn from_u32(raw: u32) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    /// Tag used in commands and saves.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Whether units in this mode look for targets on their own.
    #[must_use]
    pub const fn searches_targets(self) -> bool {
        matches!(self, Self::Guard | Self::AreaGuard | Self::Hunt | Self::Ambush)
    }
}

/// Who dealt a hit, for kill attribution and AI bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Damager {
    /// Attacking object.
    pub id: ObjectId,
    /// House that owned the attacker when it fired.
    pub owner: HouseId,
    /// Attacker type.
    pub item: ItemId,
}

/// Fields common to every simulation object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectBase {
    /// Registry identity.
    pub id: ObjectId,
    /// Type tag.
    pub item: ItemId,
    /// Current owner.
    pub owner: HouseId,
    /// Owner at creation; differs from `owner` for captured or deviated objects.
    pub original_owner: HouseId,
    /// Current health, `0..=max`.
    pub health: Fixed,
    /// Tile coordinate; the top-left footprint tile for structures.
    pub location: Coord,
    /// Authoritative pixel position.
    pub real: Vec2Fixed,
    /// Where the object is heading, or [`Coord::INVALID`].
    pub destination: Coord,
    /// Weak target reference, revalidated on every use.
    pub target: Option<ObjectId>,
    /// Whether `target` belonged to the same team when it was set.
    pub target_friendly: bool,
    /// Position ordered to attack when there is no target object.
    pub attack_pos: Coord,
    /// Facing in angle units.
    pub angle: Fixed,
    /// Facing rounded to one of eight drawn directions.
    pub drawn_angle: u8,
    /// Per-team visibility bitset, refreshed every tick.
    pub visible: u8,
    /// Behavioural state.
    pub attack_mode: AttackMode,
    /// Set by explicit move orders; suppresses automatic targeting.
    pub forced_move: bool,
    /// Set by explicit attack orders; the target is kept even out of range.
    pub forced_target: bool,
    /// Takes part in the simulation.
    pub active: bool,
    /// Accepts orders and carryall requests.
    pub respondable: bool,
    /// Below the badly damaged threshold.
    pub badly_damaged: bool,
    /// Home position for area guard and idle carryalls.
    pub guard_point: Coord,
    /// Last object that damaged this one, for retaliation.
    pub last_attacker: Option<ObjectId>,
    /// Left the map or entered a structure; removed without a death.
    pub departed: bool,
}

impl ObjectBase {
    /// Fresh state for a newly created object.
    #[must_use]
    pub fn new(id: ObjectId, item: ItemId, owner: HouseId, location: Coord, data: &ObjectData) -> Self {
        Self {
            id,
            item,
            owner,
            original_owner: owner,
            health: data.max_health(),
            location,
            real: location.tile_center(),
            destination: Coord::INVALID,
            target: None,
            target_friendly: false,
            attack_pos: Coord::INVALID,
            angle: Fixed::ZERO,
            drawn_angle: 0,
            visible: 0,
            attack_mode: AttackMode::default(),
            forced_move: false,
            forced_target: false,
            active: true,
            respondable: true,
            badly_damaged: false,
            guard_point: location,
            last_attacker: None,
            departed: false,
        }
    }

    /// Whether the object is at zero health and waiting to be removed.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.health <= Fixed::ZERO
    }

    /// Health as a fraction of `max`.
    #[must_use]
    pub fn health_ratio(&self, max: Fixed) -> Fixed {
        if max <= Fixed::ZERO {
            return Fixed::ZERO;
        }
        self.health / max
    }

    /// Whether health is below `percent` of `max`.
    #[must_use]
    pub fn health_below(&self, max: Fixed, percent: i32) -> bool {
        self.health < max * ratio(percent, 100)
    }

    /// Drop the current target and any forced attack.
    pub fn clear_target(&mut self) {
        self.target = None;
        self.target_friendly = false;
        self.forced_target = false;
        self.attack_pos = Coord::INVALID;
    }
}
