//! Item and house identifiers.
//!
//! Item IDs are the numeric type tags that appear in commands and save
//! games, so their discriminants are fixed and must never be reordered.

use serde::{Deserialize, Serialize};

/// Type tag of every structure and unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u32)]
pub enum ItemId {
    /// Trains soldiers.
    Barracks = 1,
    /// Builds all other structures.
    ConstructionYard = 2,
    /// Ground-only defensive turret.
    GunTurret = 3,
    /// Tanks, harvesters and MCVs.
    HeavyFactory = 4,
    /// Carryalls and ornithopters.
    HighTechFactory = 5,
    /// Research centre, unlocks house special tanks.
    Ix = 6,
    /// Trikes and quads.
    LightFactory = 7,
    /// House palace.
    Palace = 8,
    /// Radar outpost.
    Radar = 9,
    /// Unloads harvesters into credits.
    Refinery = 10,
    /// Repairs units.
    RepairYard = 11,
    /// Anti-air capable turret.
    RocketTurret = 12,
    /// Spice storage.
    Silo = 13,
    /// Single concrete slab.
    Slab1 = 14,
    /// 2x2 concrete slab.
    Slab4 = 15,
    /// Orders units from off-map.
    StarPort = 16,
    /// Wall segment.
    Wall = 17,
    /// Produces power.
    WindTrap = 18,
    /// Trains troopers.
    Wor = 19,

    /// Air transport.
    Carryall = 20,
    /// Heavy tank that can self-destruct.
    Devastator = 21,
    /// Gas launcher that converts enemy units.
    Deviator = 22,
    /// Off-map delivery ship.
    Frigate = 23,
    /// Spice harvester.
    Harvester = 24,
    /// Light infantry.
    Soldier = 25,
    /// Rocket launcher.
    Launcher = 26,
    /// Mobile construction vehicle.
    Mcv = 27,
    /// Attack aircraft.
    Ornithopter = 28,
    /// Light armoured vehicle.
    Quad = 29,
    /// Demolition infantry.
    Saboteur = 30,
    /// The desert's neutral predator.
    Sandworm = 31,
    /// Siege tank.
    SiegeTank = 32,
    /// Sonic tank.
    SonicTank = 33,
    /// Combat tank.
    Tank = 34,
    /// Fast scout vehicle.
    Trike = 35,
    /// Faster trike variant.
    RaiderTrike = 36,
    /// Rocket infantry.
    Trooper = 37,
}

impl ItemId {
    /// Every item, in discriminant order.
    pub const ALL: [Self; 37] = [
        Self::Barracks,
        Self::ConstructionYard,
        Self::GunTurret,
        Self::HeavyFactory,
        Self::HighTechFactory,
        Self::Ix,
        Self::LightFactory,
        Self::Palace,
        Self::Radar,
        Self::Refinery,
        Self::RepairYard,
        Self::RocketTurret,
        Self::Silo,
        Self::Slab1,
        Self::Slab4,
        Self::StarPort,
        Self::Wall,
        Self::WindTrap,
        Self::Wor,
        Self::Carryall,
        Self::Devastator,
        Self::Deviator,
        Self::Frigate,
        Self::Harvester,
        Self::Soldier,
        Self::Launcher,
        Self::Mcv,
        Self::Ornithopter,
        Self::Quad,
        Self::Saboteur,
        Self::Sandworm,
        Self::SiegeTank,
        Self::SonicTank,
        Self::Tank,
        Self::Trike,
        Self::RaiderTrike,
        Self::Trooper,
    ];

    /// Decode a numeric item ID.
    #[must_use]
    pub fn from_u32(raw: u32) -> Option<Self> {
        let index = raw.checked_sub(1)? as usize;
        Self::ALL.get(index).copied()
    }

    /// The numeric item ID used on the wire and in saves.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Dense index for per-item tables.
    #[must_use]
    pub const fn index(self) -> usize {
        (self as u32 - 1) as usize
    }

    /// Whether this item is a structure (including slabs).
    #[must_use]
    pub const fn is_structure(self) -> bool {
        (self as u32) <= (Self::Wor as u32)
    }

    /// Whether this item is a unit.
    #[must_use]
    pub const fn is_unit(self) -> bool {
        !self.is_structure()
    }

    /// Slabs change terrain and never become objects.
    #[must_use]
    pub const fn is_slab(self) -> bool {
        matches!(self, Self::Slab1 | Self::Slab4)
    }

    /// Whether this unit flies.
    #[must_use]
    pub const fn is_air(self) -> bool {
        matches!(self, Self::Carryall | Self::Ornithopter | Self::Frigate)
    }

    /// Whether this unit is infantry and shares tiles in sub-tile slots.
    #[must_use]
    pub const fn is_infantry(self) -> bool {
        matches!(self, Self::Soldier | Self::Trooper | Self::Saboteur)
    }

    /// Whether this is a ground unit.
    #[must_use]
    pub const fn is_ground_unit(self) -> bool {
        self.is_unit() && !self.is_air()
    }

    /// Tracked vehicles crush enemy infantry and leave sand tracks.
    #[must_use]
    pub const fn is_tracked(self) -> bool {
        matches!(
            self,
            Self::Tank
                | Self::SiegeTank
                | Self::SonicTank
                | Self::Devastator
                | Self::Deviator
                | Self::Launcher
                | Self::Harvester
                | Self::Mcv
        )
    }

    /// Structures with a production queue.
    #[must_use]
    pub const fn is_builder(self) -> bool {
        matches!(
            self,
            Self::Barracks
                | Self::ConstructionYard
                | Self::HeavyFactory
                | Self::HighTechFactory
                | Self::LightFactory
                | Self::StarPort
                | Self::Wor
        )
    }

    /// Defensive structures that attack on their own.
    #[must_use]
    pub const fn is_turret(self) -> bool {
        matches!(self, Self::GunTurret | Self::RocketTurret)
    }

    /// Non-combat units that the AI never sends into battle.
    #[must_use]
    pub const fn is_civilian(self) -> bool {
        matches!(
            self,
            Self::Harvester | Self::Mcv | Self::Carryall | Self::Frigate | Self::Sandworm
        )
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Barracks => "Barracks",
            Self::ConstructionYard => "Construction Yard",
            Self::GunTurret => "Gun Turret",
            Self::HeavyFactory => "Heavy Factory",
            Self::HighTechFactory => "High-Tech Factory",
            Self::Ix => "IX",
            Self::LightFactory => "Light Factory",
            Self::Palace => "Palace",
            Self::Radar => "Radar",
            Self::Refinery => "Refinery",
            Self::RepairYard => "Repair Yard",
            Self::RocketTurret => "Rocket Turret",
            Self::Silo => "Silo",
            Self::Slab1 => "Concrete Slab",
            Self::Slab4 => "Large Concrete Slab",
            Self::StarPort => "Starport",
            Self::Wall => "Wall",
            Self::WindTrap => "Wind Trap",
            Self::Wor => "WOR",
            Self::Carryall => "Carryall",
            Self::Devastator => "Devastator",
            Self::Deviator => "Deviator",
            Self::Frigate => "Frigate",
            Self::Harvester => "Harvester",
            Self::Soldier => "Soldier",
            Self::Launcher => "Launcher",
            Self::Mcv => "MCV",
            Self::Ornithopter => "Ornithopter",
            Self::Quad => "Quad",
            Self::Saboteur => "Saboteur",
            Self::Sandworm => "Sandworm",
            Self::SiegeTank => "Siege Tank",
            Self::SonicTank => "Sonic Tank",
            Self::Tank => "Tank",
            Self::Trike => "Trike",
            Self::RaiderTrike => "Raider Trike",
            Self::Trooper => "Trooper",
        }
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of houses.
pub const NUM_HOUSES: usize = 6;

/// The great houses and minor factions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HouseId {
    /// House Harkonnen.
    Harkonnen,
    /// House Atreides.
    Atreides,
    /// House Ordos.
    Ordos,
    /// The Fremen.
    Fremen,
    /// The Emperor's Sardaukar.
    Sardaukar,
    /// Mercenaries.
    Mercenary,
}

impl HouseId {
    /// Every house in index order.
    pub const ALL: [Self; NUM_HOUSES] = [
        Self::Harkonnen,
        Self::Atreides,
        Self::Ordos,
        Self::Fremen,
        Self::Sardaukar,
        Self::Mercenary,
    ];

    /// Dense index, also the player ID used in commands.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Decode a house index.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The special heavy-factory unit of this house.
    #[must_use]
    pub const fn special_tank(self) -> ItemId {
        match self {
            Self::Harkonnen | Self::Sardaukar => ItemId::Devastator,
            Self::Atreides | Self::Fremen => ItemId::SonicTank,
            Self::Ordos | Self::Mercenary => ItemId::Deviator,
        }
    }

    /// The light-factory scout of this house.
    #[must_use]
    pub const fn trike(self) -> ItemId {
        match self {
            Self::Ordos => ItemId::RaiderTrike,
            _ => ItemId::Trike,
        }
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Harkonnen => "Harkonnen",
            Self::Atreides => "Atreides",
            Self::Ordos => "Ordos",
            Self::Fremen => "Fremen",
            Self::Sardaukar => "Sardaukar",
            Self::Mercenary => "Mercenary",
        }
    }
}
