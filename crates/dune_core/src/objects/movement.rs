//! Tile-to-tile ground movement, flight and docking approach.
//!
//! A ground unit claims the next tile of its path when the step starts:
//! its `location` jumps ahead and the tile is occupied from then on, while
//! the pixel position `real` glides towards the tile centre (or an infantry
//! slot) over the following ticks.

use tracing::{debug, trace};

use super::carryall;
use super::structures;
use super::{Damager, GameObject, Movable, ObjectId, Targetable};
use crate::coord::Coord;
use crate::data::ItemId;
use crate::game::GameContext;
use crate::map::pathfinding::find_path;
use crate::map::{MoveClass, INFANTRY_SLOT_OFFSETS};
use crate::math::{angle_diff, angle_of, drawn_angle, normalize_angle, ratio, Fixed, Vec2Fixed};

/// Path searches that may fail in a row before the unit gives up.
pub const MAX_FAILED_PATHS: u32 = 5;

/// Ticks between path searches after a failure.
const PATH_RETRY_TICKS: u32 = 10;

/// Ticks a unit waits on an occupied tile before planning a new path.
const BLOCKED_REPATH_TICKS: u32 = 8;

/// Other units only block path planning this close to the start.
const UNIT_BLOCK_RADIUS: i32 = 3;

/// Peak bumpy-terrain jitter in pixels.
const BUMPY_AMPLITUDE: i32 = 2;

impl Movable for GameObject {
    fn move_class(&self) -> MoveClass {
        match self.item() {
            item if item.is_infantry() => MoveClass::Infantry,
            item if item.is_air() => MoveClass::Air,
            ItemId::Sandworm => MoveClass::Sandworm,
            _ => MoveClass::Vehicle,
        }
    }

    fn do_move_to_pos(&mut self, ctx: &mut GameContext, pos: Coord, forced: bool) {
        if !self.is_unit() || !ctx.map.contains(pos) {
            return;
        }
        if forced {
            if self.ground().is_some_and(|g| g.awaiting_pickup) {
                carryall::cancel_booking(self, ctx);
            }
            self.set_target(ctx, None);
            self.base.guard_point = pos;
        }
        self.base.destination = pos;
        self.base.forced_move = forced;
        if let Some(unit) = self.as_unit_mut() {
            unit.motion.path.clear();
            unit.motion.failed_paths = 0;
            unit.motion.no_path_retry = 0;
            unit.motion.blocked_ticks = 0;
        }
    }

    fn do_move_to_object(&mut self, ctx: &mut GameContext, target: ObjectId) {
        let Some(dest) = ctx
            .objects
            .get(target)
            .map(|t| t.closest_point(self.base.location))
        else {
            return;
        };
        self.set_target(ctx, Some(target));
        self.base.destination = dest;
        self.base.forced_move = false;
        if let Some(unit) = self.as_unit_mut() {
            unit.motion.path.clear();
            unit.motion.failed_paths = 0;
        }
    }

    fn stop_moving(&mut self) {
        self.base.destination = Coord::INVALID;
        if let Some(unit) = self.as_unit_mut() {
            unit.motion.path.clear();
        }
    }
}

// ===== Ground movement =====

pub(super) fn update(obj: &mut GameObject, ctx: &mut GameContext) {
    let Some(unit) = obj.as_unit_mut() else {
        return;
    };
    unit.motion.just_stopped = false;
    if unit.motion.moving {
        move_step(obj, ctx);
        return;
    }
    if obj.ground().is_some_and(|g| g.awaiting_pickup) {
        return;
    }
    navigate(obj, ctx);
}

fn navigate(obj: &mut GameObject, ctx: &mut GameContext) {
    let dest = obj.base.destination;
    if !dest.is_valid() {
        return;
    }
    if obj.base.location == dest {
        arrive(obj);
        return;
    }
    let Some(unit) = obj.as_unit_mut() else {
        return;
    };
    if unit.motion.no_path_retry > 0 {
        unit.motion.no_path_retry -= 1;
        return;
    }

    if unit.motion.path.is_empty() {
        match plan_path(ctx, obj) {
            Some(path) => {
                if let Some(unit) = obj.as_unit_mut() {
                    unit.motion.path = path.into();
                }
            }
            None => {
                path_failed(obj);
                return;
            }
        }
    }

    let Some(next) = obj.as_unit().and_then(|u| u.motion.path.front().copied()) else {
        return;
    };
    if next.chebyshev_distance(obj.base.location) != 1 {
        if let Some(unit) = obj.as_unit_mut() {
            unit.motion.path.clear();
        }
        return;
    }

    if start_step(obj, ctx, next) {
        if let Some(unit) = obj.as_unit_mut() {
            unit.motion.blocked_ticks = 0;
        }
        return;
    }

    let Some(unit) = obj.as_unit_mut() else {
        return;
    };
    unit.motion.blocked_ticks += 1;
    if unit.motion.blocked_ticks >= BLOCKED_REPATH_TICKS {
        unit.motion.blocked_ticks = 0;
        unit.motion.path.clear();
        if next == dest {
            // Someone is parked on the destination; being next to it is enough.
            arrive(obj);
        }
    }
}

fn arrive(obj: &mut GameObject) {
    obj.base.destination = Coord::INVALID;
    obj.base.forced_move = false;
    if let Some(unit) = obj.as_unit_mut() {
        unit.motion.path.clear();
        unit.motion.failed_paths = 0;
    }
}

fn path_failed(obj: &mut GameObject) {
    let id = obj.id();
    let Some(unit) = obj.as_unit_mut() else {
        return;
    };
    unit.motion.failed_paths += 1;
    if unit.motion.failed_paths >= MAX_FAILED_PATHS {
        debug!(%id, "no path to destination, giving up");
        arrive(obj);
    } else {
        unit.motion.no_path_retry = PATH_RETRY_TICKS;
    }
}

/// A* from the unit's tile to its destination. Structures block anywhere,
/// other units only near the start since they will have moved on by the
/// time the unit gets further.
fn plan_path(ctx: &GameContext, obj: &GameObject) -> Option<Vec<Coord>> {
    let start = obj.base.location;
    let class = obj.move_class();
    let crushes = obj.item().is_tracked();
    let owner_team = ctx.team_of(obj.owner());
    find_path(&ctx.map, class, start, obj.base.destination, |pos| {
        let Some(tile) = ctx.map.tile(pos) else {
            return true;
        };
        let near = pos.chebyshev_distance(start) <= UNIT_BLOCK_RADIUS;
        if let Some(ground) = tile.ground() {
            let is_structure = ctx.objects.get(ground).is_some_and(GameObject::is_structure);
            if is_structure || near {
                return true;
            }
        }
        if !near {
            return false;
        }
        match class {
            MoveClass::Infantry => tile.free_infantry_slot().is_none(),
            MoveClass::Air => false,
            MoveClass::Vehicle | MoveClass::Sandworm => {
                tile.has_infantry() && !(crushes && only_enemy_infantry(ctx, pos, owner_team))
            }
        }
    })
}

fn only_enemy_infantry(ctx: &GameContext, pos: Coord, team: usize) -> bool {
    let Some(tile) = ctx.map.tile(pos) else {
        return false;
    };
    tile.ground().is_none()
        && tile.infantry().iter().flatten().all(|&id| {
            ctx.objects
                .get(id)
                .is_some_and(|o| ctx.team_of(o.owner()) != team)
        })
}

/// Claim `next` and start gliding into it. Returns false when the tile is
/// taken.
fn start_step(obj: &mut GameObject, ctx: &mut GameContext, next: Coord) -> bool {
    let class = obj.move_class();
    if obj.item().is_tracked() {
        crush_infantry(obj, ctx, next);
    }

    let (slot, target_px) = if class == MoveClass::Infantry {
        let Some(slot) = ctx.map.closest_free_slot(next, obj.base.real.x, obj.base.real.y) else {
            return false;
        };
        let (ox, oy) = INFANTRY_SLOT_OFFSETS[slot];
        let origin = next.tile_origin();
        (
            Some(slot),
            Vec2Fixed::new(origin.x + Fixed::from_num(ox), origin.y + Fixed::from_num(oy)),
        )
    } else {
        if !ctx.map.is_free_for(next, class) {
            return false;
        }
        (None, next.tile_center())
    };

    ctx.remove_from_map(obj);
    let old = obj.base.location;
    obj.base.location = next;
    match slot {
        Some(slot) => {
            ctx.map.set_infantry(next, slot, obj.id());
            if let Some(infantry) = super::InfantryState::of_mut(obj) {
                infantry.slot = slot as u8;
            }
        }
        None => ctx.map.set_ground(next, obj.id()),
    }

    let real = obj.base.real;
    let Some(unit) = obj.as_unit_mut() else {
        return true;
    };
    let delta = target_px - real;
    let motion = &mut unit.motion;
    motion.old_location = old;
    motion.move_target = target_px;
    motion.step_length = delta.length();
    motion.speed = delta.normalize().scale(motion.current_max_speed);
    motion.target_angle = angle_of(delta.x, delta.y);
    motion.moving = true;
    motion.path.pop_front();
    let track_angle = drawn_angle(motion.target_angle);

    if obj.item().is_tracked() {
        ctx.map.set_sand_track(old, ctx.tick, track_angle);
    }
    trace!(id = %obj.id(), from = %old, to = %next, "step");
    true
}

/// Tracked vehicles run over enemy infantry standing on the tile ahead.
fn crush_infantry(obj: &GameObject, ctx: &mut GameContext, next: Coord) {
    let team = ctx.team_of(obj.owner());
    if !only_enemy_infantry(ctx, next, team) {
        return;
    }
    let Some(victims) = ctx
        .map
        .tile(next)
        .map(|t| t.infantry().iter().flatten().copied().collect::<Vec<_>>())
    else {
        return;
    };
    let damager = Some(Damager {
        id: obj.id(),
        owner: obj.owner(),
        item: obj.item(),
    });
    for victim in victims {
        debug!(crusher = %obj.id(), %victim, "infantry crushed");
        ctx.with_object(victim, |infantry, ctx| {
            let health = infantry.base.health;
            infantry.handle_damage(ctx, health, damager);
            ctx.remove_from_map(infantry);
        });
    }
}

fn move_step(obj: &mut GameObject, ctx: &mut GameContext) {
    let data = obj.data(&ctx.rules);
    let max_speed = data.max_speed();
    let turn_rate = data.turn_rate();
    let bumpy = obj.move_class() == MoveClass::Vehicle
        && ctx.map.terrain(obj.base.location).is_some_and(|t| t.is_bumpy());

    let real = obj.base.real;
    let Some(unit) = obj.as_unit_mut() else {
        return;
    };
    let motion = &mut unit.motion;
    motion.current_max_speed = max_speed;
    let to_target = motion.move_target - real;
    let remaining = to_target.length();

    let new_real = if remaining <= max_speed {
        motion.moving = false;
        motion.just_stopped = true;
        motion.speed = Vec2Fixed::ZERO;
        motion.bumpy_offset = Vec2Fixed::ZERO;
        motion.move_target
    } else {
        let dir = to_target.normalize();
        motion.speed = dir.scale(max_speed);
        motion.bumpy_offset = if bumpy && motion.step_length > Fixed::ZERO {
            let progress = Fixed::ONE - (remaining - max_speed) / motion.step_length;
            bumpy_offset(dir, progress)
        } else {
            Vec2Fixed::ZERO
        };
        real + motion.speed
    };
    let target_angle = motion.target_angle;
    obj.base.real = new_real;
    turn_towards(obj, target_angle, turn_rate);
}

/// Perpendicular jitter peaking halfway between tiles.
fn bumpy_offset(dir: Vec2Fixed, progress: Fixed) -> Vec2Fixed {
    let p = progress.max(Fixed::ZERO).min(Fixed::ONE);
    let amplitude = Fixed::from_num(BUMPY_AMPLITUDE * 4) * p * (Fixed::ONE - p);
    dir.perpendicular().scale(amplitude)
}

/// Rotate towards `target` by at most `rate`.
pub(super) fn turn_towards(obj: &mut GameObject, target: Fixed, rate: Fixed) {
    let diff = angle_diff(obj.base.angle, target);
    let step = diff.max(-rate).min(rate);
    obj.base.angle = normalize_angle(obj.base.angle + step);
    obj.base.drawn_angle = drawn_angle(obj.base.angle);
}

// ===== Flight =====

/// Fly one tick towards `point` at the unit's current speed cap, keeping
/// the air occupancy list in step. Returns true on arrival.
pub(super) fn fly_toward(obj: &mut GameObject, ctx: &mut GameContext, point: Vec2Fixed) -> bool {
    let Some(speed) = obj.as_unit().map(|u| u.motion.current_max_speed) else {
        return false;
    };
    let delta = point - obj.base.real;
    let distance = delta.length();
    let arrived = if distance <= speed {
        obj.base.real = point;
        true
    } else {
        obj.base.real += delta.normalize().scale(speed);
        false
    };
    if distance > Fixed::ZERO {
        obj.base.angle = angle_of(delta.x, delta.y);
        obj.base.drawn_angle = drawn_angle(obj.base.angle);
    }

    let mut tile = Coord::from_pixels(obj.base.real);
    tile.x = tile.x.clamp(0, ctx.map.width() - 1);
    tile.y = tile.y.clamp(0, ctx.map.height() - 1);
    if tile != obj.base.location {
        let id = obj.id();
        if ctx.map.contains(obj.base.location) {
            ctx.map.remove_air(obj.base.location, id);
        }
        ctx.map.add_air(tile, id);
        obj.base.location = tile;
    }
    arrived
}

/// Flight for ornithopters and frigates: head for the target while it is
/// out of range, otherwise for the destination tile.
pub(super) fn fly(obj: &mut GameObject, ctx: &mut GameContext) {
    let max_speed = obj.data(&ctx.rules).max_speed();
    if let Some(unit) = obj.as_unit_mut() {
        unit.motion.current_max_speed = max_speed;
    }
    let range = obj.data(&ctx.rules).weapon_range();
    let target_point = obj.base.target.and_then(|t| ctx.objects.get(t)).map(|t| {
        (
            t.closest_point(obj.base.location),
            t.center_pixel(),
        )
    });
    let point = match target_point {
        Some((closest, _)) if closest.chebyshev_distance(obj.base.location) <= range => return,
        Some((_, center)) => center,
        None if obj.base.destination.is_valid() => obj.base.destination.tile_center(),
        None => return,
    };
    if fly_toward(obj, ctx, point) && obj.base.target.is_none() {
        obj.base.destination = Coord::INVALID;
        obj.base.forced_move = false;
    }
}

// ===== Docking =====

/// Whether `structure` takes `unit` into its dock.
#[must_use]
pub(super) fn dock_accepts(structure: &GameObject, unit: &GameObject) -> bool {
    if structure.owner() != unit.owner() {
        return false;
    }
    match structure.item() {
        ItemId::Refinery => unit.item() == ItemId::Harvester,
        ItemId::RepairYard => {
            unit.ground().is_some() && !unit.is_infantry() && unit.item() != ItemId::Sandworm
        }
        _ => false,
    }
}

/// Drive a unit whose target is its own refinery or repair yard up to the
/// structure and dock once the dock is free.
pub(super) fn approach_dock(obj: &mut GameObject, ctx: &mut GameContext) {
    let Some(target) = obj.base.target else {
        return;
    };
    if obj
        .ground()
        .map_or(true, |g| g.awaiting_pickup || g.picked_up || g.docked_at.is_some())
    {
        return;
    }
    let Some(structure) = ctx.objects.get(target) else {
        return;
    };
    if !dock_accepts(structure, obj) {
        return;
    }
    let location = structure.base.location;
    let size = structure.size();
    let free = structure.dock().is_some_and(|d| d.docked.is_none());
    let closest = structure.closest_point(obj.base.location);
    let moving = obj.as_unit().is_some_and(|u| u.motion.moving);

    if obj.base.location.chebyshev_distance(closest) <= 1 {
        if moving {
            return;
        }
        obj.stop_moving();
        if free {
            structures::dock_unit(ctx, target, obj);
        }
        return;
    }

    let dest = obj.base.destination;
    let dest_adjacent = dest.is_valid() && {
        let rect_dist_x = (location.x - dest.x).max(dest.x - (location.x + size.0 - 1)).max(0);
        let rect_dist_y = (location.y - dest.y).max(dest.y - (location.y + size.1 - 1)).max(0);
        rect_dist_x.max(rect_dist_y) == 1
    };
    if dest_adjacent {
        return;
    }
    let spot = ctx
        .map
        .find_deploy_spot(obj.move_class(), location, size, obj.base.location, Coord::INVALID);
    obj.base.destination = if spot.is_valid() { spot } else { closest };
    if let Some(unit) = obj.as_unit_mut() {
        unit.motion.path.clear();
        unit.motion.failed_paths = 0;
    }
}

/// Carryall landing speed: slow near the destination, full speed beyond
/// ten tiles, ramping linearly between. Without a destination the cap
/// creeps back up towards full speed.
pub(super) fn ramp_speed(obj: &mut GameObject, ctx: &GameContext, distance_px: Option<Fixed>) {
    let max = obj.data(&ctx.rules).max_speed();
    let min = crate::data::hundredths(ctx.rules.constants.carryall_min_speed).min(max);
    let Some(unit) = obj.as_unit_mut() else {
        return;
    };
    unit.motion.current_max_speed = match distance_px {
        Some(distance) => {
            let tiles = distance / Fixed::from_num(crate::coord::TILESIZE);
            let fraction = tiles.min(Fixed::from_num(10)) / Fixed::from_num(10);
            min + (max - min) * fraction
        }
        None => (unit.motion.current_max_speed + ratio(1, 5)).min(max),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{HouseId, Rules};
    use crate::game::GameSettings;
    use crate::map::{Map, TerrainType};

    fn context() -> GameContext {
        GameContext::new(Map::new(24, 24), Rules::standard().expect("rules"), GameSettings::default())
    }

    fn run(ctx: &mut GameContext, id: ObjectId, ticks: u32) {
        for _ in 0..ticks {
            ctx.with_object(id, |obj, ctx| obj.update(ctx));
            ctx.reap();
        }
    }

    #[test]
    fn test_unit_reaches_destination() {
        let mut ctx = context();
        let id = ctx.spawn_unit(ItemId::Trike, HouseId::Atreides, Coord::new(2, 2)).expect("spawn");
        ctx.with_object(id, |obj, ctx| obj.do_move_to_pos(ctx, Coord::new(8, 5), true));
        run(&mut ctx, id, 200);
        let obj = ctx.objects.get(id).expect("alive");
        assert_eq!(obj.base.location, Coord::new(8, 5));
        assert_eq!(obj.base.real, Coord::new(8, 5).tile_center());
        assert!(!obj.base.destination.is_valid());
        assert_eq!(ctx.map.tile(Coord::new(8, 5)).and_then(|t| t.ground()), Some(id));
        assert_eq!(ctx.map.tile(Coord::new(2, 2)).and_then(|t| t.ground()), None);
    }

    #[test]
    fn test_step_claims_next_tile_immediately() {
        let mut ctx = context();
        let id = ctx.spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(4, 4)).expect("spawn");
        ctx.with_object(id, |obj, ctx| obj.do_move_to_pos(ctx, Coord::new(5, 4), true));
        run(&mut ctx, id, 1);
        let obj = ctx.objects.get(id).expect("alive");
        assert_eq!(obj.base.location, Coord::new(5, 4));
        assert_ne!(obj.base.real, Coord::new(5, 4).tile_center());
        assert_eq!(ctx.map.tile(Coord::new(5, 4)).and_then(|t| t.ground()), Some(id));
    }

    #[test]
    fn test_bumpy_offset_is_cosmetic() {
        let mut ctx = context();
        let rules = ctx.rules.clone();
        ctx.map.fill_terrain(Coord::new(0, 0), Coord::new(23, 23), TerrainType::Rock, &rules);
        let id = ctx.spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(4, 4)).expect("spawn");
        ctx.with_object(id, |obj, ctx| obj.do_move_to_pos(ctx, Coord::new(6, 4), true));
        run(&mut ctx, id, 10);
        let obj = ctx.objects.get(id).expect("alive");
        let motion = &obj.as_unit().expect("unit").motion;
        assert_ne!(motion.bumpy_offset, Vec2Fixed::ZERO);
        // The authoritative position stays on the straight line.
        assert_eq!(obj.base.real.y, Coord::new(5, 4).tile_center().y);
    }

    #[test]
    fn test_tank_crushes_enemy_infantry() {
        let mut ctx = context();
        let tank = ctx.spawn_unit(ItemId::Tank, HouseId::Harkonnen, Coord::new(4, 4)).expect("spawn");
        let soldier = ctx.spawn_unit(ItemId::Soldier, HouseId::Atreides, Coord::new(5, 4)).expect("spawn");
        ctx.with_object(tank, |obj, ctx| obj.do_move_to_pos(ctx, Coord::new(6, 4), true));
        run(&mut ctx, tank, 2);
        assert!(ctx.objects.get(soldier).is_none());
        assert_eq!(ctx.house(HouseId::Harkonnen).kills, 1);
    }

    #[test]
    fn test_gives_up_after_failed_paths() {
        let mut ctx = context();
        let rules = ctx.rules.clone();
        // Wall the unit in with mountains.
        for pos in Coord::new(5, 5).neighbours() {
            ctx.map.set_terrain(pos, TerrainType::Mountain, &rules);
        }
        let id = ctx.spawn_unit(ItemId::Trike, HouseId::Atreides, Coord::new(5, 5)).expect("spawn");
        ctx.with_object(id, |obj, ctx| obj.do_move_to_pos(ctx, Coord::new(15, 15), true));
        run(&mut ctx, id, (PATH_RETRY_TICKS + 1) * MAX_FAILED_PATHS + 5);
        let obj = ctx.objects.get(id).expect("alive");
        assert!(!obj.base.destination.is_valid());
        assert_eq!(obj.base.location, Coord::new(5, 5));
    }

    #[test]
    fn test_bumpy_offset_peaks_midway() {
        let dir = Vec2Fixed::from_ints(1, 0);
        let mid = bumpy_offset(dir, ratio(1, 2));
        assert_eq!(mid.y, Fixed::from_num(BUMPY_AMPLITUDE));
        assert_eq!(bumpy_offset(dir, Fixed::ZERO), Vec2Fixed::ZERO);
    }
}
