//! The tile grid and its spatial queries.
//!
//! Every mutating call checks [`Map::tile_exists`] first. An out-of-bounds
//! write is a programming error: it trips a `debug_assert!` in debug
//! builds and is ignored in release builds.

pub mod pathfinding;
mod tile;

pub use tile::{MoveClass, SandTrack, TerrainType, Tile, NUM_INFANTRY_SLOTS, NUM_TEAMS};

use rand::Rng;
use tracing::trace;

use crate::coord::Coord;
use crate::data::{HouseId, ItemId, Rules};
use crate::math::Fixed;
use crate::objects::{ObjectId, ObjectRegistry};

/// Largest ring radius searched by [`Map::find_deploy_spot`].
pub const MAX_DEPLOY_RADIUS: i32 = 16;

/// Pixel offsets of the five infantry slots inside a tile.
pub const INFANTRY_SLOT_OFFSETS: [(i32, i32); NUM_INFANTRY_SLOTS] =
    [(32, 32), (16, 16), (48, 16), (16, 48), (48, 48)];

/// The rectangular tile grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Map {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
}

impl Map {
    /// Create a map of plain sand.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            tiles: vec![Tile::new(TerrainType::Sand); (width * height) as usize],
        }
    }

    /// Width in tiles.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Height in tiles.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Number of tiles.
    #[must_use]
    pub const fn tile_count(&self) -> i32 {
        self.width * self.height
    }

    /// Whether `(x, y)` lies on the map.
    #[must_use]
    pub const fn tile_exists(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    /// Whether `pos` lies on the map.
    #[must_use]
    pub const fn contains(&self, pos: Coord) -> bool {
        self.tile_exists(pos.x, pos.y)
    }

    fn index(&self, pos: Coord) -> Option<usize> {
        self.contains(pos)
            .then(|| (pos.y * self.width + pos.x) as usize)
    }

    /// Read a tile.
    #[must_use]
    pub fn tile(&self, pos: Coord) -> Option<&Tile> {
        self.index(pos).and_then(|i| self.tiles.get(i))
    }

    /// Tile for a mutating call. Asserts in debug builds that it exists.
    fn tile_for_write(&mut self, pos: Coord) -> Option<&mut Tile> {
        debug_assert!(self.contains(pos), "write to tile {pos} outside the map");
        let index = self.index(pos)?;
        self.tiles.get_mut(index)
    }

    /// Terrain at `pos`, `None` off the map.
    #[must_use]
    pub fn terrain(&self, pos: Coord) -> Option<TerrainType> {
        self.tile(pos).map(Tile::terrain)
    }

    /// Change the terrain of a tile, filling spice tiles from the rules.
    pub fn set_terrain(&mut self, pos: Coord, terrain: TerrainType, rules: &Rules) {
        if let Some(tile) = self.tile_for_write(pos) {
            tile.set_terrain(terrain);
            match terrain {
                TerrainType::Spice => {
                    tile.set_spice(Fixed::from_num(rules.constants.spice_per_tile));
                }
                TerrainType::ThickSpice => {
                    tile.set_spice(Fixed::from_num(rules.constants.thick_spice_per_tile));
                }
                _ => {}
            }
        }
    }

    /// Fill a rectangle with one terrain type.
    pub fn fill_terrain(&mut self, from: Coord, to: Coord, terrain: TerrainType, rules: &Rules) {
        for y in from.y.min(to.y)..=from.y.max(to.y) {
            for x in from.x.min(to.x)..=from.x.max(to.x) {
                if self.tile_exists(x, y) {
                    self.set_terrain(Coord::new(x, y), terrain, rules);
                }
            }
        }
    }

    // ===== Occupancy =====

    /// Put a non-infantry ground object on a tile.
    pub fn set_ground(&mut self, pos: Coord, id: ObjectId) {
        if let Some(tile) = self.tile_for_write(pos) {
            tile.set_ground(id);
        }
    }

    /// Remove a non-infantry ground object from a tile, if it is there.
    pub fn clear_ground(&mut self, pos: Coord, id: ObjectId) {
        if let Some(tile) = self.tile_for_write(pos) {
            tile.clear_ground(id);
        }
    }

    /// Put an infantry unit into a slot.
    pub fn set_infantry(&mut self, pos: Coord, slot: usize, id: ObjectId) {
        if let Some(tile) = self.tile_for_write(pos) {
            tile.set_infantry(slot, id);
        }
    }

    /// Remove an infantry unit from whichever slot holds it.
    pub fn clear_infantry(&mut self, pos: Coord, id: ObjectId) {
        if let Some(tile) = self.tile_for_write(pos) {
            tile.clear_infantry(id);
        }
    }

    /// Register a flying unit over a tile.
    pub fn add_air(&mut self, pos: Coord, id: ObjectId) {
        if let Some(tile) = self.tile_for_write(pos) {
            tile.add_air(id);
        }
    }

    /// Remove a flying unit from a tile.
    pub fn remove_air(&mut self, pos: Coord, id: ObjectId) {
        if let Some(tile) = self.tile_for_write(pos) {
            tile.remove_air(id);
        }
    }

    /// Free infantry slot closest to a pixel position, or `None` if the tile
    /// is full or holds a non-infantry object.
    #[must_use]
    pub fn closest_free_slot(&self, pos: Coord, from_x: Fixed, from_y: Fixed) -> Option<usize> {
        let tile = self.tile(pos)?;
        if tile.ground().is_some() {
            return None;
        }
        let origin = pos.tile_origin();
        tile.infantry()
            .iter()
            .enumerate()
            .filter(|(_, occupant)| occupant.is_none())
            .min_by_key(|(slot, _)| {
                let (ox, oy) = INFANTRY_SLOT_OFFSETS[*slot];
                let dx = origin.x + Fixed::from_num(ox) - from_x;
                let dy = origin.y + Fixed::from_num(oy) - from_y;
                dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
            })
            .map(|(slot, _)| slot)
    }

    /// Whether a unit of `class` could stand on `pos` right now.
    #[must_use]
    pub fn is_free_for(&self, pos: Coord, class: MoveClass) -> bool {
        let Some(tile) = self.tile(pos) else {
            return false;
        };
        if !class.allows_terrain(tile.terrain()) {
            return false;
        }
        match class {
            MoveClass::Infantry => tile.ground().is_none() && tile.free_infantry_slot().is_some(),
            MoveClass::Vehicle | MoveClass::Sandworm => !tile.has_any_ground(),
            MoveClass::Air => true,
        }
    }

    // ===== Spatial queries =====

    /// Search outward from the rectangle `origin .. origin + size` for a tile
    /// a unit of `class` can occupy.
    ///
    /// Rings are searched in order of distance from the rectangle. Within a
    /// ring the tile closest to `prefer` wins when `prefer` is valid.
    /// `avoid` is never returned. Returns [`Coord::INVALID`] when no tile
    /// within [`MAX_DEPLOY_RADIUS`] fits.
    #[must_use]
    pub fn find_deploy_spot(
        &self,
        class: MoveClass,
        origin: Coord,
        size: (i32, i32),
        prefer: Coord,
        avoid: Coord,
    ) -> Coord {
        for radius in 1..=MAX_DEPLOY_RADIUS {
            let min = Coord::new(origin.x - radius, origin.y - radius);
            let max = Coord::new(origin.x + size.0 - 1 + radius, origin.y + size.1 - 1 + radius);
            let mut best: Option<(i64, Coord)> = None;

            for y in min.y..=max.y {
                for x in min.x..=max.x {
                    let on_ring = x == min.x || x == max.x || y == min.y || y == max.y;
                    let pos = Coord::new(x, y);
                    if !on_ring || pos == avoid || !self.is_free_for(pos, class) {
                        continue;
                    }
                    let score = if prefer.is_valid() {
                        pos.distance_squared(prefer)
                    } else {
                        0
                    };
                    if best.map_or(true, |(s, _)| score < s) {
                        best = Some((score, pos));
                    }
                }
            }

            if let Some((_, pos)) = best {
                return pos;
            }
        }
        trace!(%origin, "no deploy spot found");
        Coord::INVALID
    }

    /// Closest free tile within `radius` of `center`, randomised among
    /// tiles at equal ring distance, starting at `min_radius`.
    pub fn find_random_free_spot<R: Rng>(
        &self,
        class: MoveClass,
        center: Coord,
        min_radius: i32,
        max_radius: i32,
        rng: &mut R,
    ) -> Coord {
        for radius in min_radius.max(0)..=max_radius {
            let mut ring = Vec::new();
            for y in center.y - radius..=center.y + radius {
                for x in center.x - radius..=center.x + radius {
                    let pos = Coord::new(x, y);
                    if pos.chebyshev_distance(center) == radius && self.is_free_for(pos, class) {
                        ring.push(pos);
                    }
                }
            }
            if !ring.is_empty() {
                return ring[rng.gen_range(0..ring.len())];
            }
        }
        Coord::INVALID
    }

    /// Mark every tile within `radius` of `center` as seen by `team` at `tick`.
    pub fn view_map(&mut self, team: usize, center: Coord, radius: i32, tick: u32) {
        let r2 = i64::from(radius) * i64::from(radius) + i64::from(radius);
        for y in center.y - radius..=center.y + radius {
            for x in center.x - radius..=center.x + radius {
                let pos = Coord::new(x, y);
                if pos.distance_squared(center) > r2 || !self.contains(pos) {
                    continue;
                }
                if let Some(tile) = self.tile_for_write(pos) {
                    tile.mark_seen(team, tick);
                }
            }
        }
    }

    /// Whether `team` currently sees `pos`.
    #[must_use]
    pub fn is_visible(&self, pos: Coord, team: usize, tick: u32, timeout: u32) -> bool {
        self.tile(pos).is_some_and(|t| !t.is_fogged(team, tick, timeout))
    }

    /// Tiles within Euclidean `radius` of `center`, nearest first.
    ///
    /// Ties keep row-major order so the result is deterministic.
    #[must_use]
    pub fn tiles_in_radius(&self, center: Coord, radius: i32) -> Vec<Coord> {
        let r2 = i64::from(radius) * i64::from(radius);
        let mut tiles = Vec::new();
        for y in center.y - radius..=center.y + radius {
            for x in center.x - radius..=center.x + radius {
                let pos = Coord::new(x, y);
                if self.contains(pos) && pos.distance_squared(center) <= r2 {
                    tiles.push(pos);
                }
            }
        }
        tiles.sort_by_key(|pos| pos.distance_squared(center));
        tiles
    }

    // ===== Spice =====

    /// Remove up to `amount` spice from a tile, returning what was taken.
    ///
    /// Thick spice thins to normal spice, and an emptied tile turns to sand.
    pub fn harvest_spice(&mut self, pos: Coord, amount: Fixed, rules: &Rules) -> Fixed {
        let thin_limit = Fixed::from_num(rules.constants.spice_per_tile);
        let Some(tile) = self.tile_for_write(pos) else {
            return Fixed::ZERO;
        };
        if !tile.terrain().is_spice() {
            return Fixed::ZERO;
        }
        let taken = amount.min(tile.spice());
        let left = tile.spice() - taken;
        tile.set_spice(left);
        if left <= Fixed::ZERO {
            tile.set_terrain(TerrainType::Sand);
        } else if tile.terrain() == TerrainType::ThickSpice && left < thin_limit {
            tile.set_terrain(TerrainType::Spice);
            tile.set_spice(left);
        }
        taken
    }

    /// Scatter spice around a bloom that has erupted.
    pub fn spread_spice<R: Rng>(&mut self, center: Coord, radius: i32, rules: &Rules, rng: &mut R) {
        for pos in self.tiles_in_radius(center, radius) {
            let Some(terrain) = self.terrain(pos) else {
                continue;
            };
            if !terrain.is_sand() || terrain.is_bloom() {
                continue;
            }
            // Closer tiles are more likely to get spice.
            let distance = pos.chebyshev_distance(center);
            if rng.gen_range(0..=radius) < radius - distance + 1 {
                let next = if terrain.is_spice() {
                    TerrainType::ThickSpice
                } else {
                    TerrainType::Spice
                };
                self.set_terrain(pos, next, rules);
            }
        }
        self.set_terrain(center, TerrainType::Spice, rules);
    }

    /// Lay a sand track on a sand tile.
    pub fn set_sand_track(&mut self, pos: Coord, tick: u32, angle: u8) {
        if let Some(tile) = self.tile_for_write(pos) {
            if tile.terrain().is_sand() && !tile.terrain().is_spice() {
                tile.set_sand_track(Some(SandTrack { tick, angle }));
            }
        }
    }

    /// Drop sand tracks older than `lifetime` ticks.
    pub fn expire_sand_tracks(&mut self, tick: u32, lifetime: u32) {
        for tile in &mut self.tiles {
            if tile
                .sand_track()
                .is_some_and(|t| tick.saturating_sub(t.tick) > lifetime)
            {
                tile.set_sand_track(None);
            }
        }
    }

    /// All tiles in row-major order, for save games.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub(crate) fn tiles_mut(&mut self) -> &mut [Tile] {
        &mut self.tiles
    }

    // ===== Placement =====

    /// Whether `item` may be placed with its top-left corner at `pos` for
    /// `owner`, checked against the current map and objects.
    ///
    /// Every footprint tile must be buildable rock and empty, and the
    /// footprint must touch a structure of the same owner.
    #[must_use]
    pub fn okay_to_place_structure(
        &self,
        objects: &ObjectRegistry,
        rules: &Rules,
        item: ItemId,
        pos: Coord,
        owner: HouseId,
    ) -> bool {
        if !item.is_structure() {
            return false;
        }
        let (w, h) = rules.size(item);
        for y in pos.y..pos.y + h {
            for x in pos.x..pos.x + w {
                let Some(tile) = self.tile(Coord::new(x, y)) else {
                    return false;
                };
                if !tile.terrain().is_buildable() || tile.has_any_ground() {
                    return false;
                }
                if item.is_slab() && tile.terrain() == TerrainType::Slab {
                    return false;
                }
            }
        }

        for y in pos.y - 1..=pos.y + h {
            for x in pos.x - 1..=pos.x + w {
                let Some(id) = self.tile(Coord::new(x, y)).and_then(Tile::ground) else {
                    continue;
                };
                if objects
                    .get(id)
                    .is_some_and(|o| o.is_structure() && o.base.owner == owner)
                {
                    return true;
                }
            }
        }
        false
    }

    /// Whether a footprint is clear rock, ignoring adjacency. Used for MCV
    /// deployment, which founds a new base.
    #[must_use]
    pub fn footprint_is_clear(&self, pos: Coord, size: (i32, i32), ignore: Option<ObjectId>) -> bool {
        for y in pos.y..pos.y + size.1 {
            for x in pos.x..pos.x + size.0 {
                let Some(tile) = self.tile(Coord::new(x, y)) else {
                    return false;
                };
                if !tile.terrain().is_buildable() || tile.has_infantry() {
                    return false;
                }
                if tile.ground().is_some() && tile.ground() != ignore {
                    return false;
                }
            }
        }
        true
    }
}
