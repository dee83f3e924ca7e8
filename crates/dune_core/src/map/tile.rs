//! A single map cell: terrain, spice, occupancy and per-team fog.

use serde::{Deserialize, Serialize};

use crate::math::Fixed;
use crate::objects::ObjectId;

/// Number of teams tracked in exploration bitsets.
pub const NUM_TEAMS: usize = 6;

/// Number of infantry slots per tile: the centre and four quadrants.
pub const NUM_INFANTRY_SLOTS: usize = 5;

/// Terrain of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum TerrainType {
    /// Open sand, sandworm territory.
    #[default]
    Sand = 0,
    /// Sand dunes.
    Dunes = 1,
    /// Buildable rock.
    Rock = 2,
    /// Mountains, only infantry can climb them.
    Mountain = 3,
    /// Harvestable spice.
    Spice = 4,
    /// Dense harvestable spice.
    ThickSpice = 5,
    /// Spice bloom, erupts when a unit stops on it.
    SpiceBloom = 6,
    /// Special bloom, grants credits when a unit stops on it.
    SpecialBloom = 7,
    /// Concrete slab.
    Slab = 8,
}

impl TerrainType {
    /// Decode the byte written to save streams.
    #[must_use]
    pub const fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Sand,
            1 => Self::Dunes,
            2 => Self::Rock,
            3 => Self::Mountain,
            4 => Self::Spice,
            5 => Self::ThickSpice,
            6 => Self::SpiceBloom,
            7 => Self::SpecialBloom,
            8 => Self::Slab,
            _ => return None,
        })
    }

    /// Rock-like ground where structures can stand and sandworms cannot go.
    #[must_use]
    pub const fn is_rock(self) -> bool {
        matches!(self, Self::Rock | Self::Mountain | Self::Slab)
    }

    /// Sand-like ground, including spice fields and blooms.
    #[must_use]
    pub const fn is_sand(self) -> bool {
        !self.is_rock()
    }

    /// Whether a harvester can collect spice here.
    #[must_use]
    pub const fn is_spice(self) -> bool {
        matches!(self, Self::Spice | Self::ThickSpice)
    }

    /// Whether this is a bloom that triggers on arrival.
    #[must_use]
    pub const fn is_bloom(self) -> bool {
        matches!(self, Self::SpiceBloom | Self::SpecialBloom)
    }

    /// Terrain that jolts vehicles driving over it.
    #[must_use]
    pub const fn is_bumpy(self) -> bool {
        matches!(self, Self::Rock | Self::Mountain)
    }

    /// Whether structures may be placed here.
    #[must_use]
    pub const fn is_buildable(self) -> bool {
        matches!(self, Self::Rock | Self::Slab)
    }
}

/// How a unit interacts with terrain and occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveClass {
    /// Foot soldiers, share tiles in slots and climb mountains.
    Infantry,
    /// Wheeled and tracked vehicles.
    Vehicle,
    /// Sandworms, bound to sand.
    Sandworm,
    /// Flying units, ignore terrain and ground occupancy.
    Air,
}

impl MoveClass {
    /// Whether the terrain alone allows this class to enter.
    #[must_use]
    pub const fn allows_terrain(self, terrain: TerrainType) -> bool {
        match self {
            Self::Infantry | Self::Air => true,
            Self::Vehicle => !matches!(terrain, TerrainType::Mountain),
            Self::Sandworm => terrain.is_sand(),
        }
    }
}

/// A sand track left by a tracked vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandTrack {
    /// Tick the track was laid.
    pub tick: u32,
    /// Drawn facing of the vehicle that laid it.
    pub angle: u8,
}

/// One cell of the map grid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tile {
    terrain: TerrainType,
    spice: Fixed,
    ground: Option<ObjectId>,
    air: Vec<ObjectId>,
    infantry: [Option<ObjectId>; NUM_INFANTRY_SLOTS],
    explored: u8,
    last_seen: [u32; NUM_TEAMS],
    sand_track: Option<SandTrack>,
}

impl Tile {
    /// Create a tile of the given terrain with no spice.
    #[must_use]
    pub fn new(terrain: TerrainType) -> Self {
        Self {
            terrain,
            ..Self::default()
        }
    }

    /// Terrain type.
    #[must_use]
    pub const fn terrain(&self) -> TerrainType {
        self.terrain
    }

    /// Replace the terrain. Spice is cleared unless the new terrain holds it.
    pub fn set_terrain(&mut self, terrain: TerrainType) {
        self.terrain = terrain;
        if !terrain.is_spice() {
            self.spice = Fixed::ZERO;
        }
    }

    /// Spice left on this tile.
    #[must_use]
    pub const fn spice(&self) -> Fixed {
        self.spice
    }

    /// Set the spice amount.
    pub fn set_spice(&mut self, amount: Fixed) {
        self.spice = amount.max(Fixed::ZERO);
    }

    /// The non-infantry ground object (unit or structure) on this tile.
    #[must_use]
    pub const fn ground(&self) -> Option<ObjectId> {
        self.ground
    }

    /// Flying units over this tile.
    #[must_use]
    pub fn air(&self) -> &[ObjectId] {
        &self.air
    }

    /// Infantry slot contents.
    #[must_use]
    pub const fn infantry(&self) -> &[Option<ObjectId>; NUM_INFANTRY_SLOTS] {
        &self.infantry
    }

    /// Whether any infantry stands here.
    #[must_use]
    pub fn has_infantry(&self) -> bool {
        self.infantry.iter().any(Option::is_some)
    }

    /// Whether any ground object, infantry included, stands here.
    #[must_use]
    pub fn has_any_ground(&self) -> bool {
        self.ground.is_some() || self.has_infantry()
    }

    /// Ground objects on this tile: the non-infantry object first, then infantry
    /// in slot order.
    pub fn ground_objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.ground.into_iter().chain(self.infantry.iter().flatten().copied())
    }

    /// Every object on or over this tile.
    pub fn all_objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.ground_objects().chain(self.air.iter().copied())
    }

    /// Index of the first empty infantry slot.
    #[must_use]
    pub fn free_infantry_slot(&self) -> Option<usize> {
        self.infantry.iter().position(Option::is_none)
    }

    pub(crate) fn set_ground(&mut self, id: ObjectId) {
        debug_assert!(
            self.ground.is_none() || self.ground == Some(id),
            "tile already holds ground object {:?}",
            self.ground
        );
        self.ground = Some(id);
    }

    pub(crate) fn clear_ground(&mut self, id: ObjectId) {
        if self.ground == Some(id) {
            self.ground = None;
        }
    }

    pub(crate) fn set_infantry(&mut self, slot: usize, id: ObjectId) {
        debug_assert!(slot < NUM_INFANTRY_SLOTS, "infantry slot {slot} out of range");
        if let Some(entry) = self.infantry.get_mut(slot) {
            debug_assert!(entry.is_none() || *entry == Some(id), "infantry slot {slot} taken");
            *entry = Some(id);
        }
    }

    pub(crate) fn clear_infantry(&mut self, id: ObjectId) {
        for entry in &mut self.infantry {
            if *entry == Some(id) {
                *entry = None;
            }
        }
    }

    pub(crate) fn add_air(&mut self, id: ObjectId) {
        if !self.air.contains(&id) {
            self.air.push(id);
        }
    }

    pub(crate) fn remove_air(&mut self, id: ObjectId) {
        self.air.retain(|&a| a != id);
    }

    /// Whether `team` has ever seen this tile.
    #[must_use]
    pub const fn is_explored(&self, team: usize) -> bool {
        team < NUM_TEAMS && self.explored & (1 << team) != 0
    }

    /// Whether `team` no longer has current sight of this tile.
    ///
    /// Unexplored tiles are always fogged. Explored tiles fog over once
    /// `timeout` ticks pass without the team seeing them.
    #[must_use]
    pub fn is_fogged(&self, team: usize, tick: u32, timeout: u32) -> bool {
        if !self.is_explored(team) {
            return true;
        }
        tick.saturating_sub(self.last_seen[team]) > timeout
    }

    /// Tick at which `team` last saw this tile.
    #[must_use]
    pub fn last_seen(&self, team: usize) -> u32 {
        self.last_seen.get(team).copied().unwrap_or(0)
    }

    pub(crate) fn mark_seen(&mut self, team: usize, tick: u32) {
        if team < NUM_TEAMS {
            self.explored |= 1 << team;
            self.last_seen[team] = tick;
        }
    }

    /// Exploration bitset, one bit per team.
    #[must_use]
    pub const fn explored_bits(&self) -> u8 {
        self.explored
    }

    pub(crate) fn restore_fog(&mut self, explored: u8, last_seen: [u32; NUM_TEAMS]) {
        self.explored = explored;
        self.last_seen = last_seen;
    }

    /// Sand track decoration, if any.
    #[must_use]
    pub const fn sand_track(&self) -> Option<SandTrack> {
        self.sand_track
    }

    pub(crate) fn set_sand_track(&mut self, track: Option<SandTrack>) {
        self.sand_track = track;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terrain_classes() {
        assert!(TerrainType::Slab.is_buildable());
        assert!(!TerrainType::Mountain.is_buildable());
        assert!(TerrainType::ThickSpice.is_sand());
        assert!(!MoveClass::Vehicle.allows_terrain(TerrainType::Mountain));
        assert!(MoveClass::Infantry.allows_terrain(TerrainType::Mountain));
        assert!(!MoveClass::Sandworm.allows_terrain(TerrainType::Rock));
        for raw in 0..=8 {
            let terrain = TerrainType::from_u8(raw).expect("valid terrain byte");
            assert_eq!(terrain as u8, raw);
        }
        assert_eq!(TerrainType::from_u8(9), None);
    }

    #[test]
    fn test_infantry_slots() {
        let mut tile = Tile::new(TerrainType::Sand);
        let a = ObjectId::from_raw(0x0010_0001);
        let b = ObjectId::from_raw(0x0010_0002);
        assert_eq!(tile.free_infantry_slot(), Some(0));
        tile.set_infantry(0, a);
        tile.set_infantry(3, b);
        assert_eq!(tile.free_infantry_slot(), Some(1));
        assert!(tile.has_any_ground());
        tile.clear_infantry(a);
        tile.clear_infantry(b);
        assert!(!tile.has_any_ground());
    }

    #[test]
    fn test_fog_decays_but_exploration_stays() {
        let mut tile = Tile::new(TerrainType::Rock);
        assert!(tile.is_fogged(1, 0, 10));
        tile.mark_seen(1, 100);
        assert!(!tile.is_fogged(1, 105, 10));
        assert!(tile.is_fogged(1, 200, 10));
        assert!(tile.is_explored(1));
        assert!(!tile.is_explored(2));
    }

    #[test]
    fn test_set_terrain_clears_spice() {
        let mut tile = Tile::new(TerrainType::Spice);
        tile.set_spice(Fixed::from_num(200));
        tile.set_terrain(TerrainType::Sand);
        assert_eq!(tile.spice(), Fixed::ZERO);
    }
}
