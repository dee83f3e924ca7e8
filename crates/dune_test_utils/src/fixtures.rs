//! Test fixtures and helpers.
//!
//! Pre-built maps and games, and spawn helpers that panic with a useful
//! message instead of returning `Option`, for consistent testing.

use dune_core::ai::Difficulty;
use dune_core::coord::Coord;
use dune_core::data::{HouseId, ItemId, Rules};
use dune_core::game::{Game, GameMode, GameSettings};
use dune_core::map::{Map, TerrainType};
use dune_core::objects::ObjectId;
use fixed::types::I32F32;

/// Seed used by fixtures unless a test picks its own.
pub const DEFAULT_SEED: u64 = 0x00D0_7E5E;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// The standard rules table.
///
/// # Panics
///
/// Panics if the embedded table fails to parse.
#[must_use]
pub fn rules() -> Rules {
    Rules::standard().expect("embedded rules parse")
}

/// Custom-game settings with `seed`.
#[must_use]
pub const fn settings(seed: u64) -> GameSettings {
    GameSettings {
        mode: GameMode::Custom,
        seed,
    }
}

/// A sand map with a rock plateau covering `from..=to`.
#[must_use]
pub fn plateau_map(width: i32, height: i32, from: Coord, to: Coord) -> Map {
    let mut map = Map::new(width, height);
    map.fill_terrain(from, to, TerrainType::Rock, &rules());
    map
}

/// A map that is rock from edge to edge.
#[must_use]
pub fn rock_map(width: i32, height: i32) -> Map {
    plateau_map(width, height, Coord::new(0, 0), Coord::new(width - 1, height - 1))
}

/// An empty game on `map` with one active house per entry of `houses`,
/// each on its own team with `credits`.
#[must_use]
pub fn game_with_houses(map: Map, seed: u64, houses: &[HouseId], credits: u32) -> Game {
    let mut game = Game::with_rules(map, rules(), settings(seed));
    for (team, &house) in houses.iter().enumerate() {
        game.add_house(house, team as u8, credits);
    }
    game
}

/// The 64x64 skirmish layout: two rock bases in opposite corners with a
/// spice field between them and a construction yard in each base.
///
/// Atreides holds the north-west base at (8, 8), Harkonnen the
/// south-east one at (50, 50).
///
/// # Panics
///
/// Panics if a construction yard cannot be placed.
#[must_use]
pub fn skirmish(seed: u64) -> Game {
    let rules = rules();
    let mut map = Map::new(64, 64);
    map.fill_terrain(Coord::new(2, 2), Coord::new(20, 20), TerrainType::Rock, &rules);
    map.fill_terrain(Coord::new(42, 42), Coord::new(60, 60), TerrainType::Rock, &rules);
    map.fill_terrain(Coord::new(24, 24), Coord::new(38, 38), TerrainType::Spice, &rules);
    let mut game = Game::with_rules(map, rules, settings(seed));
    game.add_house(HouseId::Atreides, 0, 3000);
    game.add_house(HouseId::Harkonnen, 1, 3000);
    spawn_structure(&mut game, ItemId::ConstructionYard, HouseId::Atreides, Coord::new(8, 8));
    spawn_structure(&mut game, ItemId::ConstructionYard, HouseId::Harkonnen, Coord::new(50, 50));
    game
}

/// [`skirmish`] with both houses handed to QuantBots.
#[must_use]
pub fn ai_skirmish(seed: u64, difficulty: Difficulty) -> Game {
    let mut game = skirmish(seed);
    game.add_ai_player(HouseId::Atreides, difficulty);
    game.add_ai_player(HouseId::Harkonnen, difficulty);
    game
}

/// Spawn a unit.
///
/// # Panics
///
/// Panics if the unit cannot be placed at `pos`.
pub fn spawn_unit(game: &mut Game, item: ItemId, owner: HouseId, pos: Coord) -> ObjectId {
    game.context_mut()
        .spawn_unit(item, owner, pos)
        .unwrap_or_else(|| panic!("cannot spawn {item} for {owner:?} at {pos:?}"))
}

/// Spawn a structure with its top-left corner at `pos`.
///
/// # Panics
///
/// Panics if the footprint is not free.
pub fn spawn_structure(game: &mut Game, item: ItemId, owner: HouseId, pos: Coord) -> ObjectId {
    game.context_mut()
        .spawn_structure(item, owner, pos)
        .unwrap_or_else(|| panic!("cannot place {item} for {owner:?} at {pos:?}"))
}

/// Run `game` until `done` holds or `limit` ticks have passed. Returns the
/// number of ticks run when `done` first held.
pub fn run_until(game: &mut Game, limit: u32, mut done: impl FnMut(&Game) -> bool) -> Option<u32> {
    for ticks in 0..limit {
        if done(game) {
            return Some(ticks);
        }
        game.advance_tick();
    }
    done(game).then_some(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skirmish_layout() {
        let game = skirmish(DEFAULT_SEED);
        let ctx = game.context();
        assert_eq!(ctx.objects.len(), 2);
        assert!(ctx.house(HouseId::Atreides).active);
        assert!(!ctx.same_team(HouseId::Atreides, HouseId::Harkonnen));
        assert_eq!(ctx.map.terrain(Coord::new(30, 30)), Some(TerrainType::Spice));
    }

    #[test]
    fn test_run_until_counts_ticks() {
        let mut game = game_with_houses(rock_map(16, 16), 1, &[HouseId::Ordos], 0);
        assert_eq!(run_until(&mut game, 100, |g| g.tick() >= 7), Some(7));
        assert_eq!(run_until(&mut game, 5, |_| false), None);
    }
}
