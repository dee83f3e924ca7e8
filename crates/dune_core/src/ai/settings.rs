//! QuantBot tuning tables.
//!
//! Ratios are integer percentages so the tables stay float-free.

use crate::data::{HouseId, ItemId};
use crate::game::GameMode;

use super::Difficulty;

/// Ticks between two AI updates of one house.
pub const AI_UPDATE_INTERVAL: u32 = 50;

/// Tile count the custom-game limits are normalised to (a 64x64 map).
pub const REFERENCE_MAP_TILES: u64 = 4096;

/// Total damage a house must have dealt before its own battle statistics
/// steer production instead of the fixed ratios.
pub const ADAPTIVE_DAMAGE_THRESHOLD: u64 = 3000;

/// Units below this percentage of max health stay home when an attack
/// wave launches.
pub const ATTACK_HEALTH_PERCENT: i32 = 60;

/// Units below this percentage are sent to a repair yard, if there is one.
pub const REPAIR_HEALTH_PERCENT: i32 = 50;

/// Credits kept back when deciding whether a structure repair or a
/// builder upgrade is affordable.
pub const CREDIT_RESERVE: u32 = 500;

/// Ticks the attack timer moves per enemy object destroyed.
pub const ATTACK_TIMER_KILL_BONUS: u32 = 150;

/// Ticks the attack timer moves per own object lost.
pub const ATTACK_TIMER_LOSS_PENALTY: u32 = 300;

/// Ticks a wave may fight before the retreat check runs.
pub const RETREAT_DELAY: u32 = 3000;

/// Idle units further than this from the rally point are pulled back.
pub const RALLY_LEASH_TILES: i32 = 6;

/// AI updates between rally point recomputations.
pub const RALLY_REFRESH_UPDATES: u32 = 10;

/// Tick offset of a house's AI update inside the update interval.
#[must_use]
pub const fn update_offset(house: HouseId) -> u32 {
    (house.index() as u32 * 8) % AI_UPDATE_INTERVAL
}

/// Percentage of [`REFERENCE_MAP_TILES`] times fifty that a custom-game
/// AI keeps as harvesters.
#[must_use]
pub const fn harvester_ratio_percent(difficulty: Difficulty) -> u64 {
    match difficulty {
        Difficulty::Defend => 10,
        Difficulty::Easy => 20,
        Difficulty::Medium => 30,
        Difficulty::Hard => 40,
        Difficulty::Brutal => 50,
    }
}

/// Harvester ceiling.
///
/// Custom games scale `ratio * 50` harvesters per 4096 tiles; campaign
/// missions use a fixed count.
#[must_use]
pub fn harvester_limit(difficulty: Difficulty, mode: GameMode, map_tiles: u64) -> u32 {
    match mode {
        GameMode::Custom => {
            let limit = harvester_ratio_percent(difficulty) * 50 * map_tiles / (REFERENCE_MAP_TILES * 100);
            u32::try_from(limit).unwrap_or(u32::MAX).max(1)
        }
        GameMode::Campaign => match difficulty {
            Difficulty::Defend | Difficulty::Easy => 2,
            Difficulty::Medium => 3,
            Difficulty::Hard => 4,
            Difficulty::Brutal => 6,
        },
    }
}

/// Military value ceiling.
///
/// Custom games scale a per-difficulty base with map size; campaign
/// missions grow the value of the starting army.
#[must_use]
pub fn military_value_limit(difficulty: Difficulty, mode: GameMode, map_tiles: u64, initial_value: u32) -> u32 {
    match mode {
        GameMode::Custom => {
            let base: u64 = match difficulty {
                Difficulty::Defend => 3000,
                Difficulty::Easy => 4000,
                Difficulty::Medium => 8000,
                Difficulty::Hard => 16000,
                Difficulty::Brutal => 60000,
            };
            u32::try_from(base * map_tiles / REFERENCE_MAP_TILES)
                .unwrap_or(u32::MAX)
                .max(2000)
        }
        GameMode::Campaign => {
            let percent: u64 = match difficulty {
                Difficulty::Defend => 100,
                Difficulty::Easy => 125,
                Difficulty::Medium => 150,
                Difficulty::Hard => 200,
                Difficulty::Brutal => 300,
            };
            u32::try_from(u64::from(initial_value) * percent / 100)
                .unwrap_or(u32::MAX)
                .max(1500)
        }
    }
}

/// How many idle units answer one intruder. `None` means all of them.
#[must_use]
pub const fn scramble_cap(difficulty: Difficulty) -> Option<usize> {
    match difficulty {
        Difficulty::Defend => Some(4),
        Difficulty::Easy => Some(6),
        Difficulty::Medium => Some(10),
        Difficulty::Hard => Some(20),
        Difficulty::Brutal => None,
    }
}

/// Base ticks between build decisions and the random jitter added on top.
#[must_use]
pub const fn build_delay(difficulty: Difficulty) -> (u32, u32) {
    match difficulty {
        Difficulty::Defend | Difficulty::Easy => (400, 300),
        Difficulty::Medium => (250, 200),
        Difficulty::Hard => (150, 150),
        Difficulty::Brutal => (50, 100),
    }
}

/// Base ticks between attack waves and the random jitter added on top.
/// `None` for the difficulty that never attacks.
#[must_use]
pub const fn attack_delay(difficulty: Difficulty) -> Option<(u32, u32)> {
    match difficulty {
        Difficulty::Defend => None,
        Difficulty::Easy => Some((12000, 3000)),
        Difficulty::Medium => Some((9000, 3000)),
        Difficulty::Hard => Some((6000, 2000)),
        Difficulty::Brutal => Some((3000, 1500)),
    }
}

/// Fixed production preference in percent, used until a house has
/// enough battle statistics of its own. Items not listed weigh 100.
#[must_use]
pub const fn fallback_ratio(house: HouseId, item: ItemId) -> u32 {
    match (house, item) {
        (_, ItemId::SiegeTank) => 160,
        (HouseId::Harkonnen | HouseId::Sardaukar, ItemId::Devastator) => 200,
        (HouseId::Harkonnen | HouseId::Sardaukar, ItemId::Tank | ItemId::Launcher) => 140,
        (HouseId::Atreides | HouseId::Fremen, ItemId::SonicTank) => 180,
        (HouseId::Atreides | HouseId::Fremen, ItemId::Ornithopter) => 120,
        (HouseId::Atreides | HouseId::Fremen, ItemId::Quad) => 110,
        (HouseId::Ordos | HouseId::Mercenary, ItemId::Deviator) => 90,
        (HouseId::Ordos | HouseId::Mercenary, ItemId::RaiderTrike) => 130,
        (_, ItemId::Launcher) => 120,
        (_, ItemId::Tank) => 120,
        (_, ItemId::Trike | ItemId::RaiderTrike) => 60,
        (_, ItemId::Soldier | ItemId::Trooper) => 50,
        (_, ItemId::Saboteur) => 20,
        _ => 100,
    }
}

/// Structure build order for custom games: each item with the count the
/// AI aims for, in priority order.
pub const BUILD_ORDER: [(ItemId, u32); 16] = [
    (ItemId::WindTrap, 1),
    (ItemId::Refinery, 1),
    (ItemId::LightFactory, 1),
    (ItemId::WindTrap, 2),
    (ItemId::Radar, 1),
    (ItemId::Refinery, 2),
    (ItemId::HeavyFactory, 1),
    (ItemId::Barracks, 1),
    (ItemId::WindTrap, 3),
    (ItemId::RepairYard, 1),
    (ItemId::HighTechFactory, 1),
    (ItemId::RocketTurret, 2),
    (ItemId::Ix, 1),
    (ItemId::WindTrap, 4),
    (ItemId::GunTurret, 2),
    (ItemId::Palace, 1),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brutal_harvesters_on_reference_map() {
        assert_eq!(harvester_limit(Difficulty::Brutal, GameMode::Custom, 4096), 25);
    }

    #[test]
    fn test_harvester_limit_scales_with_map() {
        assert_eq!(harvester_limit(Difficulty::Medium, GameMode::Custom, 4096), 15);
        assert_eq!(harvester_limit(Difficulty::Medium, GameMode::Custom, 16384), 60);
        assert_eq!(harvester_limit(Difficulty::Defend, GameMode::Custom, 100), 1);
        assert_eq!(harvester_limit(Difficulty::Hard, GameMode::Campaign, 16384), 4);
    }

    #[test]
    fn test_military_limits() {
        assert_eq!(military_value_limit(Difficulty::Hard, GameMode::Custom, 4096, 0), 16000);
        assert_eq!(military_value_limit(Difficulty::Easy, GameMode::Custom, 1024, 0), 2000);
        assert_eq!(military_value_limit(Difficulty::Medium, GameMode::Campaign, 0, 2000), 3000);
        assert_eq!(military_value_limit(Difficulty::Defend, GameMode::Campaign, 0, 100), 1500);
    }

    #[test]
    fn test_scramble_caps() {
        assert_eq!(scramble_cap(Difficulty::Defend), Some(4));
        assert_eq!(scramble_cap(Difficulty::Hard), Some(20));
        assert_eq!(scramble_cap(Difficulty::Brutal), None);
    }

    #[test]
    fn test_update_offsets_spread_houses() {
        let offsets: Vec<u32> = HouseId::ALL.iter().map(|&h| update_offset(h)).collect();
        let mut unique = offsets.clone();
        unique.dedup();
        assert_eq!(unique.len(), offsets.len());
        assert!(offsets.iter().all(|&o| o < AI_UPDATE_INTERVAL));
    }
}
