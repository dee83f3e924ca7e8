//! Carryall logistics.
//!
//! A unit or dock asks for a lift with [`request_carryall`], which books
//! the closest idle carryall of the same owner. The booking is recorded on
//! both sides: the carryall targets the requester and the requester holds
//! `booked_carrier`. Either side breaking off releases both.
//!
//! Reinforcement carryalls are not owned by the house they deliver for.
//! They enter at the map edge with cargo already aboard and leave again
//! once it is all on the ground.

use tracing::{debug, info};

use super::movement::{fly_toward, ramp_speed};
use super::units::{is_edge, nearest_edge};
use super::{create_object, structures, AttackMode, GameObject, Movable, ObjectId, Targetable};
use crate::coord::Coord;
use crate::data::{HouseId, ItemId};
use crate::game::{random_nearby_spot, GameContext, GameEvent};
use crate::map::MoveClass;
use crate::math::Fixed;

/// Infantry a carryall can set down at once.
pub const MAX_INFANTRY_DROP: usize = 3;

/// Pixel distance at which a carryall is over its pickup.
pub const PICKUP_EPSILON: i32 = 2;

/// Carryall state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarryallState {
    /// Units aboard, in drop order.
    pub cargo: Vec<ObjectId>,
    /// Belongs to the house rather than delivering reinforcements.
    pub owned: bool,
    /// Structure the cargo is to be docked in, if any.
    pub delivery: Option<ObjectId>,
}

impl CarryallState {
    /// Empty carryall.
    #[must_use]
    pub const fn new(owned: bool) -> Self {
        Self {
            cargo: Vec::new(),
            owned,
            delivery: None,
        }
    }
}

/// Attack mode a unit takes after being set down.
#[must_use]
pub const fn default_mode_after_drop(item: ItemId) -> AttackMode {
    match item {
        ItemId::Saboteur => AttackMode::Hunt,
        ItemId::Harvester => AttackMode::Harvest,
        _ => AttackMode::AreaGuard,
    }
}

// ===== Booking =====

/// Whether `requester` has no carrier booked and is on the map.
fn is_bookable(requester: &GameObject) -> bool {
    if let Some(ground) = requester.ground() {
        return !ground.awaiting_pickup
            && ground.booked_carrier.is_none()
            && !ground.picked_up
            && ground.docked_at.is_none();
    }
    requester.dock().is_some_and(|d| d.booked_carrier.is_none())
}

/// Record a booking on both sides. Fails if `cargo` is already booked.
fn link(carrier: &mut GameObject, cargo: &mut GameObject) -> bool {
    if !is_bookable(cargo) {
        return false;
    }
    if let Some(ground) = cargo.ground_mut() {
        ground.awaiting_pickup = true;
        ground.booked_carrier = Some(carrier.id());
    } else if let Some(dock) = cargo.dock_mut() {
        dock.booked_carrier = Some(carrier.id());
    }
    carrier.base.target = Some(cargo.id());
    carrier.base.target_friendly = true;
    carrier.base.destination = Coord::INVALID;
    true
}

/// Book the closest idle carryall owned by the requester's house.
///
/// Works for ground units and for docks sending a unit back out. Returns
/// false when no carryall is free or the requester is already booked.
pub fn request_carryall(ctx: &mut GameContext, requester: &mut GameObject) -> bool {
    if !requester.base.respondable || !is_bookable(requester) {
        return false;
    }
    let from = requester.base.location;
    let owner = requester.owner();
    let Some(carrier_id) = ctx
        .objects
        .iter()
        .filter(|(_, c)| {
            c.owner() == owner
                && !c.base.is_dead()
                && !c.base.departed
                && c.base.target.is_none()
                && c.carryall().is_some_and(|s| s.owned && s.cargo.is_empty())
        })
        .min_by_key(|(id, c)| (c.base.location.distance_squared(from), *id))
        .map(|(id, _)| id)
    else {
        return false;
    };
    let Some(carrier) = ctx.objects.get_mut(carrier_id) else {
        return false;
    };
    let linked = link(carrier, requester);
    if linked {
        debug!(carrier = %carrier_id, cargo = %requester.id(), "carryall booked");
    }
    linked
}

/// Undo a booking held by `carrier` on `target`, if it is still pending.
pub(crate) fn release_booking_of(ctx: &mut GameContext, target: ObjectId, carrier: ObjectId) {
    let Some(object) = ctx.objects.get_mut(target) else {
        return;
    };
    if let Some(ground) = object.ground_mut() {
        if ground.booked_carrier == Some(carrier) && !ground.picked_up {
            ground.booked_carrier = None;
            ground.awaiting_pickup = false;
        }
    }
    if let Some(dock) = object.dock_mut() {
        if dock.booked_carrier == Some(carrier) {
            dock.booked_carrier = None;
        }
    }
}

/// The booked unit no longer wants its lift.
pub(super) fn cancel_booking(obj: &mut GameObject, ctx: &mut GameContext) {
    let Some(ground) = obj.ground() else {
        return;
    };
    if ground.picked_up {
        return;
    }
    if let Some(carrier) = ground.booked_carrier.and_then(|c| ctx.objects.get_mut(c)) {
        if carrier.base.target == Some(obj.id()) {
            carrier.base.clear_target();
            carrier.base.destination = Coord::INVALID;
        }
    }
    if let Some(ground) = obj.ground_mut() {
        ground.booked_carrier = None;
        ground.awaiting_pickup = false;
    }
}

/// Retarget a carryall, releasing the booking of its old target.
pub(super) fn set_target(obj: &mut GameObject, ctx: &mut GameContext, target: Option<ObjectId>) {
    if obj.base.target == target {
        return;
    }
    if let Some(old) = obj.base.target {
        release_booking_of(ctx, old, obj.id());
    }
    obj.base.clear_target();
    let Some(target) = target else {
        return;
    };
    let linked = ctx
        .objects
        .get_mut(target)
        .filter(|t| t.owner() == obj.owner())
        .is_some_and(|cargo| link(obj, cargo));
    if !linked {
        debug!(carrier = %obj.id(), %target, "carryall target refused");
    }
}

// ===== Update =====

pub(super) fn update(obj: &mut GameObject, ctx: &mut GameContext) {
    let Some(state) = obj.carryall() else {
        return;
    };
    let loaded = !state.cargo.is_empty();
    if let Some(target) = obj.base.target {
        engage(obj, ctx, target);
    } else if loaded {
        deliver(obj, ctx);
    } else {
        idle(obj, ctx);
    }
}

/// Fly to a booked pickup.
fn engage(obj: &mut GameObject, ctx: &mut GameContext, target: ObjectId) {
    let Some(cargo) = ctx.objects.get(target) else {
        obj.base.clear_target();
        return;
    };
    let point = cargo.center_pixel();
    let distance = point.distance(obj.base.real);
    if cargo.base.is_dead() {
        if distance <= Fixed::from_num(PICKUP_EPSILON) {
            // Landed on the wreck.
            let health = obj.base.health;
            obj.handle_damage(ctx, health, None);
        } else {
            obj.base.clear_target();
        }
        return;
    }
    ramp_speed(obj, ctx, Some(distance));
    if fly_toward(obj, ctx, point) {
        pickup(obj, ctx, target);
    }
}

fn pickup(obj: &mut GameObject, ctx: &mut GameContext, target: ObjectId) {
    if ctx.objects.get(target).is_some_and(GameObject::is_structure) {
        structures::deploy_to_carryall(ctx, target, obj);
        return;
    }
    let carrier = obj.id();
    let lifted = ctx.with_object(target, |cargo, ctx| {
        let booked = cargo
            .ground()
            .is_some_and(|g| g.booked_carrier == Some(carrier) && !g.picked_up);
        if !booked {
            return None;
        }
        ctx.remove_from_map(cargo);
        let location = cargo.base.location;
        if let Some(ground) = cargo.ground_mut() {
            ground.picked_up = true;
            ground.awaiting_pickup = false;
        }
        if let Some(unit) = cargo.as_unit_mut() {
            unit.motion.reset(location);
        }
        let delivery = cargo.base.target.filter(|_| cargo.base.target_friendly);
        let destination = if cargo.base.destination.is_valid() {
            cargo.base.destination
        } else {
            cargo.harvester().map_or(Coord::INVALID, |h| h.harvest_spot)
        };
        Some((delivery, destination))
    });

    // The carrier's target is the cargo; clearing it must not release the booking.
    obj.base.clear_target();
    let Some(Some((delivery, destination))) = lifted else {
        return;
    };
    let here = obj.base.location;
    if let Some(state) = obj.carryall_mut() {
        state.cargo.push(target);
        state.delivery = delivery;
    }
    obj.base.destination = if destination.is_valid() { destination } else { here };
    ctx.emit(GameEvent::CarryallPickup {
        carrier,
        cargo: target,
    });
    debug!(%carrier, cargo = %target, ?delivery, "carryall pickup");
}

/// Carry cargo to its dock or drop point.
fn deliver(obj: &mut GameObject, ctx: &mut GameContext) {
    let delivery = obj.carryall().and_then(|s| s.delivery);
    if let Some(structure) = delivery {
        let Some(point) = ctx
            .objects
            .get(structure)
            .filter(|s| s.can_be_targeted())
            .map(GameObject::center_pixel)
        else {
            // Nowhere to dock; set down where we are.
            if let Some(state) = obj.carryall_mut() {
                state.delivery = None;
            }
            obj.base.destination = obj.base.location;
            return;
        };
        ramp_speed(obj, ctx, Some(point.distance(obj.base.real)));
        if fly_toward(obj, ctx, point) {
            dock_cargo(obj, ctx, structure);
        }
        return;
    }

    if !obj.base.destination.is_valid() {
        obj.base.destination = obj.base.location;
    }
    let point = obj.base.destination.tile_center();
    ramp_speed(obj, ctx, Some(point.distance(obj.base.real)));
    if fly_toward(obj, ctx, point) {
        drop_cargo(obj, ctx);
    }
}

/// Hand the first unit straight into a dock, or drop it beside a busy one.
fn dock_cargo(obj: &mut GameObject, ctx: &mut GameContext, structure: ObjectId) {
    if let Some(state) = obj.carryall_mut() {
        state.delivery = None;
    }
    let Some(&cargo_id) = obj.carryall().and_then(|s| s.cargo.first()) else {
        return;
    };
    let free = ctx
        .objects
        .get(structure)
        .and_then(GameObject::dock)
        .is_some_and(|d| d.docked.is_none());
    if !free {
        drop_cargo(obj, ctx);
        return;
    }
    let docked = ctx
        .with_object(cargo_id, |cargo, ctx| {
            if let Some(ground) = cargo.ground_mut() {
                ground.picked_up = false;
                ground.booked_carrier = None;
            }
            structures::dock_unit(ctx, structure, cargo)
        })
        .unwrap_or(false);
    if !docked {
        drop_cargo(obj, ctx);
        return;
    }
    if let Some(state) = obj.carryall_mut() {
        state.cargo.retain(|&c| c != cargo_id);
    }
    ctx.emit(GameEvent::CarryallDrop {
        carrier: obj.id(),
        cargo: cargo_id,
    });
    obj.base.destination = Coord::INVALID;
}

/// Set down as much cargo as one stop allows.
fn drop_cargo(obj: &mut GameObject, ctx: &mut GameContext) {
    let Some(cargo) = obj.carryall().map(|s| s.cargo.clone()) else {
        return;
    };
    let all_infantry = cargo
        .iter()
        .all(|&id| ctx.objects.get(id).is_some_and(GameObject::is_infantry));
    let limit = if all_infantry { MAX_INFANTRY_DROP } else { 1 };
    let here = obj.base.location;
    let carrier = obj.id();

    let mut dropped = Vec::new();
    for &cargo_id in cargo.iter().take(limit) {
        let placed = ctx
            .with_object(cargo_id, |unit, ctx| {
                let class = unit.move_class();
                let spot = if ctx.map.is_free_for(here, class) {
                    here
                } else {
                    ctx.map
                        .find_deploy_spot(class, here, (1, 1), Coord::INVALID, Coord::INVALID)
                };
                if !spot.is_valid() {
                    return false;
                }
                if let Some(ground) = unit.ground_mut() {
                    ground.picked_up = false;
                    ground.awaiting_pickup = false;
                    ground.booked_carrier = None;
                }
                ctx.place_unit(unit, spot);
                unit.base.forced_move = false;
                unit.base.guard_point = spot;
                unit.base.attack_mode = default_mode_after_drop(unit.item());
                true
            })
            .unwrap_or(false);
        if !placed {
            break;
        }
        dropped.push(cargo_id);
        ctx.emit(GameEvent::CarryallDrop {
            carrier,
            cargo: cargo_id,
        });
    }

    let remaining = cargo.len() - dropped.len();
    if let Some(state) = obj.carryall_mut() {
        state.cargo.retain(|c| !dropped.contains(c));
    }
    debug!(%carrier, dropped = dropped.len(), remaining, "carryall drop");
    if remaining == 0 {
        obj.base.destination = Coord::INVALID;
        return;
    }
    let class = if all_infantry {
        MoveClass::Infantry
    } else {
        MoveClass::Vehicle
    };
    let next = random_nearby_spot(ctx, class, here, 3, 9);
    obj.base.destination = if next.is_valid() { next } else { here };
}

/// Empty carryalls go home, or off the map if they only came to deliver.
fn idle(obj: &mut GameObject, ctx: &mut GameContext) {
    let owned = obj.carryall().is_some_and(|s| s.owned);
    if !owned {
        let edge = nearest_edge(ctx, obj.base.location);
        ramp_speed(obj, ctx, None);
        if fly_toward(obj, ctx, edge.tile_center()) && is_edge(ctx, obj.base.location) {
            debug!(id = %obj.id(), "reinforcement carryall leaves");
            obj.base.departed = true;
        }
        return;
    }
    if obj.base.destination.is_valid() {
        let dest = obj.base.destination;
        ramp_speed(obj, ctx, Some(dest.tile_center().distance(obj.base.real)));
        if fly_toward(obj, ctx, dest.tile_center()) {
            obj.base.guard_point = dest;
            obj.base.destination = Coord::INVALID;
        }
        return;
    }
    let home = obj.base.guard_point;
    if home.is_valid() && home != obj.base.location {
        ramp_speed(obj, ctx, Some(home.tile_center().distance(obj.base.real)));
        fly_toward(obj, ctx, home.tile_center());
    } else {
        ramp_speed(obj, ctx, None);
    }
}

// ===== Reinforcements =====

/// Send `items` to `drop_point` aboard a carryall entering from the
/// nearest map edge. Non-ground items are skipped.
pub(crate) fn spawn_reinforcements(
    ctx: &mut GameContext,
    house: HouseId,
    items: &[ItemId],
    drop_point: Coord,
) -> Option<ObjectId> {
    if !ctx.map.contains(drop_point) || !items.iter().any(|i| i.is_ground_unit()) {
        return None;
    }
    let edge = nearest_edge(ctx, drop_point);
    let carrier = ctx.spawn_unit(ItemId::Carryall, house, edge)?;

    let mut cargo = Vec::new();
    for &item in items.iter().filter(|i| i.is_ground_unit()) {
        let id = ctx.objects.allocate();
        let Some(mut unit) = create_object(&ctx.rules, item.as_u32(), id, house, edge) else {
            ctx.objects.release(id);
            continue;
        };
        if let Some(ground) = unit.ground_mut() {
            ground.picked_up = true;
            ground.booked_carrier = Some(carrier);
        }
        ctx.objects.put_back(id, unit);
        cargo.push(id);
    }

    let object = ctx.objects.get_mut(carrier)?;
    object.base.destination = drop_point;
    if let Some(state) = object.carryall_mut() {
        state.owned = false;
        state.cargo = cargo;
    }
    info!(%carrier, ?house, %drop_point, count = items.len(), "reinforcements inbound");
    Some(carrier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Rules;
    use crate::game::GameSettings;
    use crate::map::Map;

    fn context() -> GameContext {
        GameContext::new(Map::new(24, 24), Rules::standard().expect("rules"), GameSettings::default())
    }

    fn run(ctx: &mut GameContext, ticks: u32) {
        for _ in 0..ticks {
            for id in ctx.objects.ids() {
                ctx.with_object(id, |obj, ctx| obj.update(ctx));
            }
            ctx.reap();
            ctx.tick += 1;
        }
    }

    fn request(ctx: &mut GameContext, id: ObjectId) -> bool {
        ctx.with_object(id, |obj, ctx| request_carryall(ctx, obj))
            .unwrap_or(false)
    }

    #[test]
    fn test_request_books_closest_free_carryall() {
        let mut ctx = context();
        let far = ctx.spawn_unit(ItemId::Carryall, HouseId::Atreides, Coord::new(20, 20)).expect("spawn");
        let near = ctx.spawn_unit(ItemId::Carryall, HouseId::Atreides, Coord::new(6, 6)).expect("spawn");
        let enemy = ctx.spawn_unit(ItemId::Carryall, HouseId::Ordos, Coord::new(3, 3)).expect("spawn");
        let tank = ctx.spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(2, 2)).expect("spawn");
        let trike = ctx.spawn_unit(ItemId::Trike, HouseId::Atreides, Coord::new(4, 2)).expect("spawn");

        assert!(request(&mut ctx, tank));
        assert_eq!(ctx.objects.get(near).and_then(|c| c.base.target), Some(tank));
        let ground = ctx.objects.get(tank).and_then(GameObject::ground).expect("ground");
        assert!(ground.awaiting_pickup);
        assert_eq!(ground.booked_carrier, Some(near));

        // Already booked.
        assert!(!request(&mut ctx, tank));

        assert!(request(&mut ctx, trike));
        assert_eq!(ctx.objects.get(far).and_then(|c| c.base.target), Some(trike));
        assert_eq!(ctx.objects.get(enemy).and_then(|c| c.base.target), None);
    }

    #[test]
    fn test_no_free_carryall() {
        let mut ctx = context();
        let tank = ctx.spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(2, 2)).expect("spawn");
        assert!(!request(&mut ctx, tank));
        assert!(ctx.objects.get(tank).and_then(GameObject::ground).is_some_and(|g| !g.awaiting_pickup));
    }

    #[test]
    fn test_forced_move_cancels_booking() {
        let mut ctx = context();
        let carrier = ctx.spawn_unit(ItemId::Carryall, HouseId::Atreides, Coord::new(10, 10)).expect("spawn");
        let tank = ctx.spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(2, 2)).expect("spawn");
        assert!(request(&mut ctx, tank));
        ctx.with_object(tank, |obj, ctx| obj.do_move_to_pos(ctx, Coord::new(5, 2), true));

        assert_eq!(ctx.objects.get(carrier).and_then(|c| c.base.target), None);
        let ground = ctx.objects.get(tank).and_then(GameObject::ground).expect("ground");
        assert!(!ground.awaiting_pickup);
        assert_eq!(ground.booked_carrier, None);
    }

    #[test]
    fn test_carryall_ferries_unit() {
        let mut ctx = context();
        let carrier = ctx.spawn_unit(ItemId::Carryall, HouseId::Atreides, Coord::new(10, 10)).expect("spawn");
        let tank = ctx.spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(2, 2)).expect("spawn");
        ctx.with_object(tank, |obj, _| obj.base.destination = Coord::new(20, 20));
        assert!(request(&mut ctx, tank));

        run(&mut ctx, 1200);

        let unit = ctx.objects.get(tank).expect("alive");
        assert_eq!(unit.base.location, Coord::new(20, 20));
        assert!(!unit.is_off_map());
        assert_eq!(unit.base.attack_mode, AttackMode::AreaGuard);
        assert_eq!(ctx.map.tile(Coord::new(20, 20)).and_then(|t| t.ground()), Some(tank));
        let state = ctx.objects.get(carrier).and_then(GameObject::carryall).expect("carryall");
        assert!(state.cargo.is_empty());

        // Home again, the landing speed cap climbs back to cruising speed.
        run(&mut ctx, 600);
        let carryall = ctx.objects.get(carrier).expect("alive");
        assert_eq!(carryall.base.location, carryall.base.guard_point);
        assert_eq!(speed_cap(&ctx, carrier), cruising_speed(&ctx));
    }

    // ===== Speed ramp =====

    fn speed_cap(ctx: &GameContext, id: ObjectId) -> Fixed {
        ctx.objects
            .get(id)
            .and_then(GameObject::as_unit)
            .map(|u| u.motion.current_max_speed)
            .expect("unit")
    }

    fn cruising_speed(ctx: &GameContext) -> Fixed {
        ctx.rules.get(ItemId::Carryall).max_speed()
    }

    fn landing_speed(ctx: &GameContext) -> Fixed {
        crate::data::hundredths(ctx.rules.constants.carryall_min_speed).min(cruising_speed(ctx))
    }

    #[test]
    fn test_speed_ramps_with_distance() {
        let mut ctx = context();
        let carrier = ctx.spawn_unit(ItemId::Carryall, HouseId::Atreides, Coord::new(5, 5)).expect("spawn");
        let tile = Fixed::from_num(crate::coord::TILESIZE);
        let (min, max) = (landing_speed(&ctx), cruising_speed(&ctx));
        assert!(min < max);

        let mut cap_at = |distance: Fixed| {
            ctx.with_object(carrier, |obj, ctx| ramp_speed(obj, ctx, Some(distance)));
            speed_cap(&ctx, carrier)
        };
        assert_eq!(cap_at(Fixed::ZERO), min);
        assert_eq!(cap_at(tile * Fixed::from_num(5)), min + (max - min) / Fixed::from_num(2));
        assert_eq!(cap_at(tile * Fixed::from_num(10)), max);
        assert_eq!(cap_at(tile * Fixed::from_num(30)), max);
    }

    #[test]
    fn test_idle_carryall_recovers_cruising_speed() {
        let mut ctx = context();
        let carrier = ctx.spawn_unit(ItemId::Carryall, HouseId::Atreides, Coord::new(5, 5)).expect("spawn");
        ctx.with_object(carrier, |obj, ctx| ramp_speed(obj, ctx, Some(Fixed::ZERO)));
        assert_eq!(speed_cap(&ctx, carrier), landing_speed(&ctx));

        run(&mut ctx, 1);
        let after_one = speed_cap(&ctx, carrier);
        assert!(after_one > landing_speed(&ctx));
        assert!(after_one < cruising_speed(&ctx));

        run(&mut ctx, 200);
        assert_eq!(speed_cap(&ctx, carrier), cruising_speed(&ctx));
    }

    // ===== Crushed during pickup =====

    /// A carrier booked to lift a tank whose health has just run out.
    fn booked_on_wreck(carrier_at: Coord) -> (GameContext, ObjectId, ObjectId) {
        let mut ctx = context();
        let carrier = ctx.spawn_unit(ItemId::Carryall, HouseId::Atreides, carrier_at).expect("spawn");
        let tank = ctx.spawn_unit(ItemId::Tank, HouseId::Atreides, Coord::new(4, 4)).expect("spawn");
        assert!(request(&mut ctx, tank));
        if let Some(unit) = ctx.objects.get_mut(tank) {
            unit.base.health = Fixed::ZERO;
        }
        (ctx, carrier, tank)
    }

    #[test]
    fn test_carryall_landing_on_dead_target_is_destroyed() {
        let (mut ctx, carrier, tank) = booked_on_wreck(Coord::new(4, 4));
        let over = ctx.objects.get(tank).map(Targetable::center_pixel).expect("tank");
        ctx.with_object(carrier, |obj, _| obj.base.real = over);

        ctx.with_object(carrier, |obj, ctx| obj.update(ctx));

        let wreck = ctx.objects.get(carrier).expect("not reaped yet");
        assert_eq!(wreck.base.health, Fixed::ZERO);
        ctx.reap();
        assert!(ctx.objects.get(carrier).is_none());
    }

    #[test]
    fn test_carryall_far_from_dead_target_drops_booking() {
        let (mut ctx, carrier, _) = booked_on_wreck(Coord::new(20, 20));

        ctx.with_object(carrier, |obj, ctx| obj.update(ctx));

        let carryall = ctx.objects.get(carrier).expect("alive");
        assert_eq!(carryall.base.target, None);
        assert!(carryall.base.health > Fixed::ZERO);
    }

    #[test]
    fn test_reinforcements_drop_and_leave() {
        let mut ctx = context();
        let drop_point = Coord::new(12, 12);
        let carrier = spawn_reinforcements(
            &mut ctx,
            HouseId::Harkonnen,
            &[ItemId::Soldier, ItemId::Soldier, ItemId::Trooper],
            drop_point,
        )
        .expect("carrier");
        assert_eq!(ctx.objects.len(), 4);

        run(&mut ctx, 2000);

        assert!(ctx.objects.get(carrier).is_none());
        let infantry: Vec<_> = ctx
            .objects
            .iter()
            .filter(|(_, o)| o.is_infantry())
            .map(|(_, o)| o.clone())
            .collect();
        assert_eq!(infantry.len(), 3);
        for unit in infantry {
            assert!(!unit.is_off_map());
            assert_eq!(unit.owner(), HouseId::Harkonnen);
            assert!(unit.base.location.chebyshev_distance(drop_point) <= 1);
        }
        let drops = ctx.events.iter().filter(|e| matches!(e, GameEvent::CarryallDrop { .. })).count();
        assert_eq!(drops, 3);
    }

    #[test]
    fn test_reinforcements_need_ground_units() {
        let mut ctx = context();
        assert!(spawn_reinforcements(&mut ctx, HouseId::Ordos, &[ItemId::Ornithopter], Coord::new(5, 5)).is_none());
        assert!(spawn_reinforcements(&mut ctx, HouseId::Ordos, &[ItemId::Tank], Coord::new(-1, 5)).is_none());
        assert!(ctx.objects.is_empty());
    }

    #[test]
    fn test_mode_after_drop() {
        assert_eq!(default_mode_after_drop(ItemId::Saboteur), AttackMode::Hunt);
        assert_eq!(default_mode_after_drop(ItemId::Harvester), AttackMode::Harvest);
        assert_eq!(default_mode_after_drop(ItemId::Tank), AttackMode::AreaGuard);
    }
}
