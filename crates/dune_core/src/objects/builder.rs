//! Production queues and upgrades.
//!
//! A builder draws credits a little at a time: each tick it may spend
//! `price / build_time`, scaled by the owner's production factor, on the
//! item at the front of its queue. An item is done once its full price
//! has been spent. Units deploy next to the builder; structures wait in
//! the construction yard until a placement command puts them down.

use std::collections::VecDeque;

use tracing::{debug, info};

use super::{Builder, GameObject, Movable};
use crate::coord::Coord;
use crate::data::{HouseId, ItemId};
use crate::error::{GameError, Result};
use crate::game::{GameContext, GameEvent};
use crate::map::MoveClass;
use crate::math::Fixed;

/// Items queued by one "multiple" production order.
pub const MAX_MULTIPLE_ORDER: usize = 5;

/// Longest production queue a builder accepts.
const MAX_QUEUE_LEN: usize = 20;

/// One queued item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionItem {
    /// What is being built.
    pub item: ItemId,
    /// Credits spent on it so far.
    pub spent: Fixed,
}

impl ProductionItem {
    /// Fresh, unpaid entry.
    #[must_use]
    pub const fn new(item: ItemId) -> Self {
        Self {
            item,
            spent: Fixed::ZERO,
        }
    }
}

/// Builder state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuilderState {
    /// Items in production order.
    pub queue: VecDeque<ProductionItem>,
    /// Production paused.
    pub on_hold: bool,
    /// Upgrades completed.
    pub upgrade_level: u8,
    /// Credits spent on an upgrade in progress.
    pub upgrade_progress: Option<Fixed>,
    /// Finished structure waiting to be placed.
    pub ready_structure: Option<ItemId>,
}

impl BuilderState {
    /// Item in production.
    #[must_use]
    pub fn current(&self) -> Option<&ProductionItem> {
        self.queue.front()
    }

    /// Queued copies of `item`.
    #[must_use]
    pub fn count(&self, item: ItemId) -> usize {
        self.queue.iter().filter(|p| p.item == item).count()
    }

    /// Whether an upgrade is under way.
    #[must_use]
    pub const fn is_upgrading(&self) -> bool {
        self.upgrade_progress.is_some()
    }
}

/// Whether `builder` may produce `item` for `house` right now.
///
/// Checks the producing structure type, the builder's upgrade level, the
/// prerequisites the house owns, and house-specific units.
#[must_use]
pub fn can_build(ctx: &GameContext, builder: &GameObject, house: HouseId, item: ItemId) -> bool {
    builder
        .builder()
        .is_some_and(|state| buildable_at(ctx, builder.item(), state.upgrade_level, house, item))
}

/// Whether the next upgrade of `builder` would unlock an item, other than
/// concrete slabs, that `house` could then produce there.
#[must_use]
pub fn upgrade_unlocks(ctx: &GameContext, builder: &GameObject, house: HouseId) -> bool {
    let Some(state) = builder.builder() else {
        return false;
    };
    let next = state.upgrade_level + 1;
    next <= builder.data(&ctx.rules).max_upgrade
        && ItemId::ALL.into_iter().any(|item| {
            !item.is_slab()
                && ctx.rules.get(item).upgrade_level == next
                && buildable_at(ctx, builder.item(), next, house, item)
        })
}

fn buildable_at(ctx: &GameContext, builder: ItemId, level: u8, house: HouseId, item: ItemId) -> bool {
    let data = ctx.rules.get(item);
    if data.built_by != Some(builder) || data.upgrade_level > level {
        return false;
    }
    let owner = ctx.house(house);
    if !data.requires.iter().all(|&r| owner.has(r)) {
        return false;
    }
    match item {
        ItemId::Devastator | ItemId::SonicTank | ItemId::Deviator => item == house.special_tank(),
        ItemId::Trike | ItemId::RaiderTrike => item == house.trike(),
        _ => true,
    }
}

impl Builder for GameObject {
    fn can_produce(&self, ctx: &GameContext, item: ItemId) -> bool {
        self.builder().is_some_and(|b| !b.is_upgrading()) && can_build(ctx, self, self.owner(), item)
    }

    fn produce_item(&mut self, ctx: &mut GameContext, item: ItemId, multiple: bool) -> Result<()> {
        if !self.can_produce(ctx, item) {
            return Err(GameError::InvalidState(format!("{} cannot produce {item}", self.item())));
        }
        let state = self
            .builder_mut()
            .ok_or_else(|| GameError::InvalidState("not a builder".into()))?;
        let copies = if multiple { MAX_MULTIPLE_ORDER } else { 1 };
        let room = MAX_QUEUE_LEN.saturating_sub(state.queue.len());
        state
            .queue
            .extend(std::iter::repeat_with(|| ProductionItem::new(item)).take(copies.min(room)));
        debug!(builder = %self.id(), %item, copies, "production queued");
        Ok(())
    }

    fn cancel_item(&mut self, ctx: &mut GameContext, item: ItemId, all: bool) -> Result<()> {
        let owner = self.owner();
        let price = Fixed::from_num(ctx.rules.get(item).price);
        let state = self
            .builder_mut()
            .ok_or_else(|| GameError::InvalidState("not a builder".into()))?;
        let mut refund = Fixed::ZERO;
        loop {
            // Most recently queued first, so the item in production survives longest.
            let Some(index) = state.queue.iter().rposition(|p| p.item == item) else {
                break;
            };
            if let Some(entry) = state.queue.remove(index) {
                refund += entry.spent;
            }
            if !all {
                break;
            }
        }
        if refund == Fixed::ZERO && state.ready_structure == Some(item) {
            state.ready_structure = None;
            refund = price;
        }
        ctx.house_mut(owner).add_credits(refund);
        debug!(builder = %self.id(), %item, all, refund = %refund, "production cancelled");
        Ok(())
    }

    fn set_on_hold(&mut self, on_hold: bool) -> Result<()> {
        let state = self
            .builder_mut()
            .ok_or_else(|| GameError::InvalidState("not a builder".into()))?;
        state.on_hold = on_hold;
        Ok(())
    }

    fn start_upgrade(&mut self, ctx: &mut GameContext) -> Result<()> {
        let max = self.data(&ctx.rules).max_upgrade;
        let state = self
            .builder_mut()
            .ok_or_else(|| GameError::InvalidState("not a builder".into()))?;
        if state.upgrade_level >= max {
            return Err(GameError::InvalidState("builder is fully upgraded".into()));
        }
        if state.upgrade_progress.is_none() {
            state.upgrade_progress = Some(Fixed::ZERO);
        }
        Ok(())
    }
}

/// Credits to spend this tick on something costing `price` over `build_time`.
fn tick_budget(price: Fixed, build_time: u32, factor: Fixed, spent: Fixed) -> Fixed {
    let step = price / Fixed::from_num(build_time.max(1)) * factor;
    step.min(price - spent).max(Fixed::ZERO)
}

pub(super) fn update(obj: &mut GameObject, ctx: &mut GameContext) {
    let owner = obj.owner();
    let factor = ctx.house(owner).production_factor();
    let data = obj.data(&ctx.rules);
    let upgrade_cost = Fixed::from_num(data.upgrade_cost());
    let upgrade_time = data.build_time;
    let Some(state) = obj.builder() else {
        return;
    };
    if state.on_hold {
        return;
    }

    if let Some(progress) = state.upgrade_progress {
        let paid = ctx
            .house_mut(owner)
            .spend(tick_budget(upgrade_cost, upgrade_time, factor, progress));
        let id = obj.id();
        if let Some(state) = obj.builder_mut() {
            let progress = progress + paid;
            if progress >= upgrade_cost {
                state.upgrade_level += 1;
                state.upgrade_progress = None;
                info!(builder = %id, level = state.upgrade_level, "upgrade complete");
            } else {
                state.upgrade_progress = Some(progress);
            }
        }
        return;
    }

    if state.ready_structure.is_some() {
        return;
    }
    let Some(current) = state.current().cloned() else {
        return;
    };
    if !can_build(ctx, obj, owner, current.item) {
        // Prerequisite lost; wait until it is back.
        return;
    }
    let item_data = ctx.rules.get(current.item);
    let price = Fixed::from_num(item_data.price);
    let budget = tick_budget(price, item_data.build_time, factor, current.spent);
    let paid = ctx.house_mut(owner).spend(budget);
    let spent = current.spent + paid;
    let Some(state) = obj.builder_mut() else {
        return;
    };
    if spent < price {
        if let Some(front) = state.queue.front_mut() {
            front.spent = spent;
        }
        return;
    }
    state.queue.pop_front();
    finish(obj, ctx, current.item);
}

fn finish(obj: &mut GameObject, ctx: &mut GameContext, item: ItemId) {
    if item.is_structure() {
        if let Some(state) = obj.builder_mut() {
            state.ready_structure = Some(item);
        }
        ctx.emit(GameEvent::ProductionComplete {
            builder: obj.id(),
            item,
        });
        info!(builder = %obj.id(), %item, "structure ready for placement");
        return;
    }

    let class = if item.is_infantry() {
        MoveClass::Infantry
    } else if item.is_air() {
        MoveClass::Air
    } else {
        MoveClass::Vehicle
    };
    let deploy_point = obj.as_structure().map_or(Coord::INVALID, |s| s.deploy_point);
    let spot = ctx.map.find_deploy_spot(
        class,
        obj.base.location,
        obj.size(),
        deploy_point,
        Coord::INVALID,
    );
    let Some(unit) = spot
        .is_valid()
        .then(|| ctx.spawn_unit(item, obj.owner(), spot))
        .flatten()
    else {
        // Blocked in; keep the paid item at the front and try again.
        if let Some(state) = obj.builder_mut() {
            let price = Fixed::from_num(ctx.rules.get(item).price);
            state.queue.push_front(ProductionItem { item, spent: price });
        }
        return;
    };
    ctx.emit(GameEvent::ProductionComplete {
        builder: obj.id(),
        item,
    });
    info!(builder = %obj.id(), %item, %unit, %spot, "unit produced");
    if deploy_point.is_valid() && class != MoveClass::Air {
        ctx.with_object(unit, |unit, ctx| unit.do_move_to_pos(ctx, deploy_point, false));
    }
}

/// Put the construction yard's finished structure down at `pos`.
pub(crate) fn place_structure(
    obj: &mut GameObject,
    ctx: &mut GameContext,
    item: ItemId,
    pos: Coord,
) -> Result<()> {
    let ready = obj.builder().and_then(|b| b.ready_structure);
    if ready != Some(item) {
        return Err(GameError::InvalidState(format!("{item} is not ready for placement")));
    }
    if !ctx
        .map
        .okay_to_place_structure(&ctx.objects, &ctx.rules, item, pos, obj.owner())
    {
        debug!(%item, %pos, "placement refused");
        return Ok(());
    }
    if let Some(state) = obj.builder_mut() {
        state.ready_structure = None;
    }
    // Slabs become terrain and create no object.
    ctx.spawn_structure(item, obj.owner(), pos);
    Ok(())
}
