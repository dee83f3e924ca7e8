//! Infantry: tile slots, capture and sabotage.

use tracing::info;

use super::{AttackMode, Damager, GameObject, GroundKind, ObjectId, Targetable};
use crate::data::{ItemId, Rules};
use crate::game::{GameContext, GameEvent};
use crate::math::Fixed;

/// Infantry-specific state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InfantryState {
    /// Sub-tile slot, `0..NUM_INFANTRY_SLOTS`.
    pub slot: u8,
}

impl InfantryState {
    /// Infantry state of `obj`, if it is infantry.
    #[must_use]
    pub fn of(obj: &GameObject) -> Option<&Self> {
        match &obj.ground()?.kind {
            GroundKind::Infantry(state) => Some(state),
            _ => None,
        }
    }

    /// Mutable infantry state.
    pub fn of_mut(obj: &mut GameObject) -> Option<&mut Self> {
        match &mut obj.ground_mut()?.kind {
            GroundKind::Infantry(state) => Some(state),
            _ => None,
        }
    }
}

pub(super) fn update(obj: &mut GameObject, ctx: &mut GameContext) {
    if obj.item() == ItemId::Saboteur {
        sabotage(obj, ctx);
    } else if obj.base.attack_mode == AttackMode::Capture {
        capture(obj, ctx);
    }
}

/// Enemy structure the unit stands next to and may act on.
fn adjacent_enemy_structure(obj: &GameObject, ctx: &GameContext) -> Option<ObjectId> {
    let target = obj.base.target?;
    let structure = ctx.objects.get(target)?;
    if !structure.is_structure()
        || !structure.can_be_targeted()
        || ctx.same_team(structure.owner(), obj.owner())
    {
        return None;
    }
    let moving = obj.as_unit().is_some_and(|u| u.motion.moving);
    let near = structure.closest_point(obj.base.location).chebyshev_distance(obj.base.location) <= 1;
    (near && !moving).then_some(target)
}

fn damager(obj: &GameObject) -> Option<Damager> {
    Some(Damager {
        id: obj.id(),
        owner: obj.owner(),
        item: obj.item(),
    })
}

fn capture(obj: &mut GameObject, ctx: &mut GameContext) {
    let valid = obj
        .base
        .target
        .and_then(|t| ctx.objects.get(t))
        .is_some_and(|s| s.is_structure() && s.can_be_targeted() && !ctx.same_team(s.owner(), obj.owner()));
    if !valid {
        obj.base.clear_target();
        obj.base.attack_mode = obj.default_attack_mode();
        return;
    }
    let Some(target) = adjacent_enemy_structure(obj, ctx) else {
        return;
    };

    let percent = ctx.rules.constants.capture_percent;
    let weak = ctx.objects.get(target).is_some_and(|s| {
        s.base.health <= Rules::percent_of(s.max_health(&ctx.rules), percent)
    });
    if weak {
        let new_owner = obj.owner();
        ctx.with_object(target, |structure, ctx| capture_structure(structure, ctx, new_owner));
    } else {
        ctx.damage_object(target, obj.base.health, damager(obj));
    }
    // The unit is spent either way: it went inside.
    obj.base.departed = true;
}

/// Hand a structure to `new_owner`.
pub(crate) fn capture_structure(
    structure: &mut GameObject,
    ctx: &mut GameContext,
    new_owner: crate::data::HouseId,
) {
    let from = structure.owner();
    if from == new_owner {
        return;
    }
    structure.base.owner = new_owner;
    structure.base.clear_target();
    if let Some(builder) = structure.builder_mut() {
        builder.queue.clear();
        builder.ready_structure = None;
    }
    ctx.emit(GameEvent::Captured {
        id: structure.id(),
        from,
        to: new_owner,
    });
    info!(id = %structure.id(), item = %structure.item(), ?from, to = ?new_owner, "structure captured");
}

fn sabotage(obj: &mut GameObject, ctx: &mut GameContext) {
    let Some(target) = adjacent_enemy_structure(obj, ctx) else {
        return;
    };
    let damage = Fixed::from_num(ctx.rules.constants.sabotage_damage);
    info!(saboteur = %obj.id(), %target, "saboteur detonates");
    ctx.damage_object(target, damage, damager(obj));
    ctx.emit(GameEvent::Explosion {
        position: obj.base.real,
    });
    let health = obj.base.health;
    obj.handle_damage(ctx, health, None);
}
