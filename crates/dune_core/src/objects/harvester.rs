//! Spice harvesting.

use tracing::debug;

use super::{carryall, AttackMode, GameObject, Movable, ObjectId, Targetable};
use crate::coord::Coord;
use crate::data::{hundredths, ItemId};
use crate::game::GameContext;
use crate::map::MoveClass;
use crate::math::Fixed;

/// Trips longer than this many tiles are flown by carryall when one is free.
pub const CARRYALL_TRIP_TILES: i32 = 10;

/// Radius searched for spice around the last harvest spot.
const SPICE_SEARCH_RADIUS: i32 = 12;

/// Harvester load and bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvesterState {
    /// Spice aboard.
    pub spice: Fixed,
    /// Heading back to unload.
    pub returning: bool,
    /// Where the last spice came from, or [`Coord::INVALID`].
    pub harvest_spot: Coord,
}

impl Default for HarvesterState {
    fn default() -> Self {
        Self {
            spice: Fixed::ZERO,
            returning: false,
            harvest_spot: Coord::INVALID,
        }
    }
}

pub(super) fn update(obj: &mut GameObject, ctx: &mut GameContext) {
    if obj.base.attack_mode != AttackMode::Harvest || obj.base.forced_move {
        return;
    }
    if obj.ground().is_some_and(|g| g.awaiting_pickup) {
        return;
    }
    let capacity = Fixed::from_num(ctx.rules.constants.harvester_capacity);
    let Some(state) = obj.harvester_mut() else {
        return;
    };
    if state.spice >= capacity {
        state.returning = true;
    }
    if state.returning {
        head_home(obj, ctx);
    } else {
        harvest(obj, ctx, capacity);
    }
}

/// Nearest refinery of `owner`, measured to the closest footprint tile.
#[must_use]
pub(crate) fn nearest_refinery(ctx: &GameContext, obj: &GameObject) -> Option<ObjectId> {
    let from = obj.base.location;
    ctx.objects
        .iter()
        .filter(|(_, s)| s.item() == ItemId::Refinery && s.owner() == obj.owner() && s.can_be_targeted())
        .min_by_key(|(id, s)| (s.closest_point(from).distance_squared(from), *id))
        .map(|(id, _)| id)
}

/// Make for a refinery; docking itself happens on arrival.
pub(crate) fn head_home(obj: &mut GameObject, ctx: &mut GameContext) {
    if let Some(state) = obj.harvester_mut() {
        state.returning = true;
    }
    let current = obj
        .base
        .target
        .and_then(|t| ctx.objects.get(t))
        .is_some_and(|t| t.item() == ItemId::Refinery && t.owner() == obj.owner());
    if current {
        return;
    }
    let Some(refinery) = nearest_refinery(ctx, obj) else {
        return;
    };
    obj.set_target(ctx, Some(refinery));
    let far = ctx.objects.get(refinery).is_some_and(|r| {
        r.closest_point(obj.base.location).chebyshev_distance(obj.base.location) > CARRYALL_TRIP_TILES
    });
    if far && carryall::request_carryall(ctx, obj) {
        debug!(id = %obj.id(), %refinery, "harvester flies home");
    }
}

fn harvest(obj: &mut GameObject, ctx: &mut GameContext, capacity: Fixed) {
    let moving = obj.as_unit().is_some_and(|u| u.motion.moving);
    if moving || obj.base.destination.is_valid() {
        return;
    }
    let pos = obj.base.location;
    if ctx.map.terrain(pos).is_some_and(|t| t.is_spice()) {
        let room = obj.harvester().map_or(Fixed::ZERO, |h| capacity - h.spice);
        let rate = hundredths(ctx.rules.constants.harvest_rate).min(room);
        let rules = ctx.rules.clone();
        let taken = ctx.map.harvest_spice(pos, rate, &rules);
        if let Some(state) = obj.harvester_mut() {
            state.spice += taken;
            state.harvest_spot = pos;
        }
        return;
    }

    let center = obj
        .harvester()
        .map(|h| h.harvest_spot)
        .filter(|c| c.is_valid())
        .unwrap_or(pos);
    let Some(spot) = ctx.map.tiles_in_radius(center, SPICE_SEARCH_RADIUS).into_iter().find(|&t| {
        ctx.map.terrain(t).is_some_and(|terrain| terrain.is_spice())
            && ctx.map.is_free_for(t, MoveClass::Vehicle)
    }) else {
        return;
    };
    obj.do_move_to_pos(ctx, spot, false);
    if let Some(state) = obj.harvester_mut() {
        state.harvest_spot = spot;
    }
    if spot.chebyshev_distance(pos) > CARRYALL_TRIP_TILES {
        carryall::request_carryall(ctx, obj);
    }
}
