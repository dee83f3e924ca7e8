//! Structure placement search.

use tracing::trace;

use crate::coord::Coord;
use crate::data::{HouseId, ItemId};
use crate::game::GameContext;

/// Penalty per footprint tile within [`EDGE_MARGIN`] of the map border.
const EDGE_PENALTY: i32 = 6;
const EDGE_MARGIN: i32 = 2;
/// Bonus per own structure tile touching the footprint.
const OWN_ADJACENT_BONUS: i32 = 3;
/// Penalty per foreign object tile near the footprint.
const FOREIGN_PENALTY: i32 = 50;
/// How far around the footprint foreign objects count.
const FOREIGN_RADIUS: i32 = 3;
/// Bonus for sharing a row or column edge with an own structure.
const ALIGNMENT_BONUS: i32 = 4;

/// Occupancy grids over the whole map, one cell per tile.
struct Grids {
    width: i32,
    height: i32,
    own: Vec<bool>,
    foreign: Vec<bool>,
    own_origins: Vec<Coord>,
}

impl Grids {
    fn build(ctx: &GameContext, house: HouseId) -> Self {
        let width = ctx.map.width();
        let height = ctx.map.height();
        let cells = (width * height) as usize;
        let mut grids = Self {
            width,
            height,
            own: vec![false; cells],
            foreign: vec![false; cells],
            own_origins: Vec::new(),
        };
        for (_, object) in ctx.objects.iter() {
            if object.base.departed || object.is_off_map() {
                continue;
            }
            let own = object.owner() == house;
            if !own && ctx.same_team(object.owner(), house) {
                continue;
            }
            if object.is_structure() {
                if own {
                    grids.own_origins.push(object.base.location);
                }
                let (w, h) = object.size();
                let origin = object.base.location;
                for y in origin.y..origin.y + h {
                    for x in origin.x..origin.x + w {
                        grids.mark(Coord::new(x, y), own);
                    }
                }
            } else if !own {
                grids.mark(object.base.location, false);
            }
        }
        grids
    }

    fn index(&self, pos: Coord) -> Option<usize> {
        (pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height)
            .then(|| (pos.y * self.width + pos.x) as usize)
    }

    fn mark(&mut self, pos: Coord, own: bool) {
        if let Some(i) = self.index(pos) {
            if own {
                self.own[i] = true;
            } else {
                self.foreign[i] = true;
            }
        }
    }

    fn own_at(&self, pos: Coord) -> bool {
        self.index(pos).is_some_and(|i| self.own[i])
    }

    fn foreign_at(&self, pos: Coord) -> bool {
        self.index(pos).is_some_and(|i| self.foreign[i])
    }
}

/// Best place for `house` to put `item`, or [`Coord::INVALID`] if no
/// legal spot exists.
///
/// Candidates are the top-left corners that touch an own structure. Each
/// legal one is scored: map edges and nearby enemies count against it,
/// contact and alignment with the own base count for it, and turrets and
/// builders lose points with distance from `rally`.
#[must_use]
pub fn find_place_location(ctx: &GameContext, house: HouseId, item: ItemId, rally: Coord) -> Coord {
    if !item.is_structure() {
        return Coord::INVALID;
    }
    let grids = Grids::build(ctx, house);
    let (w, h) = ctx.rules.size(item);
    let weigh_rally = rally.is_valid() && (item.is_turret() || item.is_builder());

    let mut seen = vec![false; grids.own.len()];
    let mut best: Option<(i32, Coord)> = None;
    for origin in &grids.own_origins {
        let span = 4 + w.max(h);
        for y in origin.y - span..=origin.y + span {
            for x in origin.x - span..=origin.x + span {
                let pos = Coord::new(x, y);
                let Some(i) = grids.index(pos) else {
                    continue;
                };
                if std::mem::replace(&mut seen[i], true) {
                    continue;
                }
                if !ctx.map.okay_to_place_structure(&ctx.objects, &ctx.rules, item, pos, house) {
                    continue;
                }
                let mut score = score_footprint(&grids, pos, (w, h));
                if weigh_rally {
                    let center = Coord::new(pos.x + w / 2, pos.y + h / 2);
                    score -= center.chebyshev_distance(rally);
                }
                if best.map_or(true, |(s, _)| score > s) {
                    best = Some((score, pos));
                }
            }
        }
    }

    match best {
        Some((score, pos)) => {
            trace!(?house, %item, ?pos, score, "placement chosen");
            pos
        }
        None => Coord::INVALID,
    }
}

fn score_footprint(grids: &Grids, pos: Coord, (w, h): (i32, i32)) -> i32 {
    let mut score = 0;

    for y in pos.y..pos.y + h {
        for x in pos.x..pos.x + w {
            let near_edge = x < EDGE_MARGIN
                || y < EDGE_MARGIN
                || x >= grids.width - EDGE_MARGIN
                || y >= grids.height - EDGE_MARGIN;
            if near_edge {
                score -= EDGE_PENALTY;
            }
        }
    }

    for y in pos.y - 1..=pos.y + h {
        for x in pos.x - 1..=pos.x + w {
            if grids.own_at(Coord::new(x, y)) {
                score += OWN_ADJACENT_BONUS;
            }
        }
    }

    for y in pos.y - FOREIGN_RADIUS..pos.y + h + FOREIGN_RADIUS {
        for x in pos.x - FOREIGN_RADIUS..pos.x + w + FOREIGN_RADIUS {
            if grids.foreign_at(Coord::new(x, y)) {
                score -= FOREIGN_PENALTY;
            }
        }
    }

    let aligned = grids.own_origins.iter().any(|o| o.x == pos.x || o.y == pos.y);
    if aligned {
        score += ALIGNMENT_BONUS;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Rules;
    use crate::game::GameSettings;
    use crate::map::{Map, TerrainType};

    fn context() -> GameContext {
        let mut ctx = GameContext::new(Map::new(40, 40), Rules::standard().expect("rules"), GameSettings::default());
        let rules = ctx.rules.clone();
        ctx.map.fill_terrain(Coord::new(0, 0), Coord::new(20, 20), TerrainType::Rock, &rules);
        ctx.spawn_structure(ItemId::ConstructionYard, HouseId::Atreides, Coord::new(8, 8))
            .expect("yard");
        ctx
    }

    #[test]
    fn test_found_spot_is_legal() {
        let ctx = context();
        for item in [ItemId::WindTrap, ItemId::Refinery, ItemId::HeavyFactory, ItemId::GunTurret] {
            let pos = find_place_location(&ctx, HouseId::Atreides, item, Coord::INVALID);
            assert!(pos.is_valid(), "{item} found no spot");
            assert!(ctx
                .map
                .okay_to_place_structure(&ctx.objects, &ctx.rules, item, pos, HouseId::Atreides));
        }
    }

    #[test]
    fn test_no_base_means_no_spot() {
        let ctx = context();
        let pos = find_place_location(&ctx, HouseId::Harkonnen, ItemId::WindTrap, Coord::INVALID);
        assert_eq!(pos, Coord::INVALID);
    }

    #[test]
    fn test_units_are_not_placements() {
        let ctx = context();
        assert_eq!(
            find_place_location(&ctx, HouseId::Atreides, ItemId::Tank, Coord::INVALID),
            Coord::INVALID
        );
    }

    #[test]
    fn test_enemy_presence_pushes_placement_away() {
        let mut ctx = context();
        ctx.spawn_unit(ItemId::Tank, HouseId::Harkonnen, Coord::new(11, 8)).expect("tank");
        let pos = find_place_location(&ctx, HouseId::Atreides, ItemId::WindTrap, Coord::INVALID);
        assert!(pos.is_valid());
        assert!(pos.x < 10, "placed next to the enemy at {pos:?}");
    }

    #[test]
    fn test_turret_leans_toward_rally() {
        let ctx = context();
        let east = find_place_location(&ctx, HouseId::Atreides, ItemId::GunTurret, Coord::new(19, 9));
        let west = find_place_location(&ctx, HouseId::Atreides, ItemId::GunTurret, Coord::new(0, 9));
        assert!(east.x > west.x);
    }
}
