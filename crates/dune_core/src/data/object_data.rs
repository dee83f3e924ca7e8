//! Per-item game rules loaded from RON.
//!
//! Every fractional quantity is stored as integer hundredths so the data
//! file never contains floating point. Accessors convert to [`Fixed`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::items::ItemId;
use crate::error::{GameError, Result};
use crate::math::{ratio, Fixed};

/// Path reported in parse errors for the embedded table.
const STANDARD_PATH: &str = "data/object_data.ron";

/// The rules table compiled into the crate.
const STANDARD_RON: &str = include_str!("../../data/object_data.ron");

/// Weapon statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeaponData {
    /// Damage per shot.
    pub damage: u32,

    /// Range in tiles.
    pub range: u32,

    /// Ticks between shots.
    pub reload: u32,

    /// Whether the weapon can hit flying units.
    #[serde(default)]
    pub anti_air: bool,
}

/// Data-driven definition of one structure or unit type.
///
/// # Example RON
///
/// ```ron
/// (
///     item: Trike,
///     hitpoints: 100,
///     price: 150,
///     speed: 400,         // 4.00 pixels per tick
///     turn_speed: 25,     // 0.25 angle units per tick
///     view_range: 4,
///     build_time: 300,
///     weapon: Some((damage: 8, range: 3, reload: 15)),
///     built_by: Some(LightFactory),
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectData {
    /// Which item this entry describes.
    pub item: ItemId,

    /// Maximum health.
    pub hitpoints: u32,

    /// Production cost in credits.
    pub price: u32,

    /// Power drawn; negative values produce power.
    #[serde(default)]
    pub power: i32,

    /// Movement speed in hundredths of a pixel per tick.
    #[serde(default)]
    pub speed: u32,

    /// Turn speed in hundredths of an angle unit per tick.
    #[serde(default)]
    pub turn_speed: u32,

    /// Sight radius in tiles.
    pub view_range: u32,

    /// Production time in ticks at full power.
    pub build_time: u32,

    /// Footprint in tiles (structures only).
    #[serde(default = "default_size")]
    pub size: (i32, i32),

    /// Weapon, if the item can attack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon: Option<WeaponData>,

    /// The builder type that produces this item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_by: Option<ItemId>,

    /// Structures the owner must have before this item can be produced.
    #[serde(default)]
    pub requires: Vec<ItemId>,

    /// Upgrade level of the builder needed to produce this item.
    #[serde(default)]
    pub upgrade_level: u8,

    /// Highest upgrade level, for builders.
    #[serde(default)]
    pub max_upgrade: u8,

    /// Spice storage provided, for refineries and silos.
    #[serde(default)]
    pub storage: u32,
}

const fn default_size() -> (i32, i32) {
    (1, 1)
}

impl ObjectData {
    /// Maximum health as fixed point.
    #[must_use]
    pub fn max_health(&self) -> Fixed {
        Fixed::from_num(self.hitpoints)
    }

    /// Top speed in pixels per tick.
    #[must_use]
    pub fn max_speed(&self) -> Fixed {
        hundredths(self.speed)
    }

    /// Turn rate in angle units per tick.
    #[must_use]
    pub fn turn_rate(&self) -> Fixed {
        hundredths(self.turn_speed)
    }

    /// Weapon range in tiles, zero for unarmed items.
    #[must_use]
    pub fn weapon_range(&self) -> i32 {
        self.weapon.as_ref().map_or(0, |w| w.range as i32)
    }

    /// Upgrade cost for builders.
    #[must_use]
    pub const fn upgrade_cost(&self) -> u32 {
        self.price / 2
    }
}

/// Global tuning constants that are not tied to a single item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameConstants {
    /// Spice a harvester holds when full.
    pub harvester_capacity: u32,
    /// Spice harvested per tick, in hundredths.
    pub harvest_rate: u32,
    /// Spice unloaded per tick at a refinery, in hundredths.
    pub unload_rate: u32,
    /// Spice on a fresh Spice tile.
    pub spice_per_tile: u32,
    /// Spice on a fresh ThickSpice tile.
    pub thick_spice_per_tile: u32,
    /// Health restored per tick at a repair yard, in hundredths.
    pub repair_rate: u32,
    /// Ticks a deviated unit stays converted.
    pub deviation_ticks: u32,
    /// Ticks from the self-destruct order to a devastator's explosion.
    pub devastate_ticks: u32,
    /// Damage dealt around a detonating devastator.
    pub devastate_damage: u32,
    /// Damage a saboteur deals to a structure.
    pub sabotage_damage: u32,
    /// Damage dealt to the unit that triggers a spice bloom.
    pub bloom_damage: u32,
    /// Radius in tiles over which a bloom spreads spice.
    pub bloom_radius: i32,
    /// Credits granted by a special bloom.
    pub special_bloom_credits: u32,
    /// Ticks a tile keeps reporting its last contents after leaving sight.
    pub fog_timeout: u32,
    /// Percent of max health below which an object is badly damaged.
    pub badly_damaged_percent: u32,
    /// Percent of max health below which infantry may capture a structure.
    pub capture_percent: u32,
    /// Slowest carryall speed near its goal, in hundredths of a pixel per tick.
    pub carryall_min_speed: u32,
    /// Ticks a sand track stays visible.
    pub sand_track_ticks: u32,
    /// Units a sandworm eats before it is sated.
    pub sandworm_appetite: u32,
    /// Credits each house starts with in a custom game.
    pub starting_credits: u32,
}

/// The complete rules table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rules {
    /// Global constants.
    pub constants: GameConstants,
    /// One entry per item, ordered by item ID once validated.
    pub objects: Vec<ObjectData>,
}

impl Rules {
    /// The standard rules embedded in the crate.
    pub fn standard() -> Result<Self> {
        Self::parse(STANDARD_RON, STANDARD_PATH)
    }

    /// Parse a rules table from a RON document, for modded rule sets.
    pub fn from_ron(source: &str) -> Result<Self> {
        Self::parse(source, "<inline>")
    }

    fn parse(source: &str, path: &str) -> Result<Self> {
        let mut rules: Self = ron::from_str(source).map_err(|e| GameError::DataParseError {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        rules.validate(path)?;
        Ok(rules)
    }

    /// Check that every item appears exactly once and sort by item ID.
    fn validate(&mut self, path: &str) -> Result<()> {
        let mut seen = BTreeSet::new();
        for entry in &self.objects {
            if !seen.insert(entry.item) {
                return Err(GameError::DataParseError {
                    path: path.to_string(),
                    message: format!("duplicate entry for {}", entry.item),
                });
            }
            if entry.size.0 < 1 || entry.size.1 < 1 {
                return Err(GameError::DataParseError {
                    path: path.to_string(),
                    message: format!("{} has an empty footprint", entry.item),
                });
            }
        }
        if let Some(missing) = ItemId::ALL.iter().find(|item| !seen.contains(item)) {
            return Err(GameError::DataParseError {
                path: path.to_string(),
                message: format!("missing entry for {missing}"),
            });
        }
        self.objects.sort_by_key(|entry| entry.item);
        Ok(())
    }

    /// Data for one item.
    #[must_use]
    pub fn get(&self, item: ItemId) -> &ObjectData {
        &self.objects[item.index()]
    }

    /// Footprint of an item in tiles.
    #[must_use]
    pub fn size(&self, item: ItemId) -> (i32, i32) {
        self.get(item).size
    }

    /// Percent threshold as a fraction of `max`.
    #[must_use]
    pub fn percent_of(max: Fixed, percent: u32) -> Fixed {
        max * ratio(percent as i32, 100)
    }
}

/// Convert an integer count of hundredths into fixed point.
#[must_use]
pub fn hundredths(value: u32) -> Fixed {
    ratio(value as i32, 100)
}
