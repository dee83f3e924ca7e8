//! Build decisions: repairs, structure placement, upgrades and production.

use tracing::debug;

use super::settings::{fallback_ratio, ADAPTIVE_DAMAGE_THRESHOLD, BUILD_ORDER, CREDIT_RESERVE};
use super::{find_place_location, stays_home, Orders, QuantBot};
use crate::command::{Command, CommandType};
use crate::data::ItemId;
use crate::game::{GameContext, GameMode};
use crate::house::House;
use crate::objects::{upgrade_unlocks, Builder, GameObject};

/// Production preference of `item` for `house`, in percent.
///
/// Once the house has dealt enough damage its own record decides: damage
/// dealt by the item type per credit of that type lost. Before that the
/// fixed per-house table applies.
#[must_use]
pub fn production_weight(house: &House, item: ItemId, price: u32) -> u32 {
    if house.total_damage_dealt() < ADAPTIVE_DAMAGE_THRESHOLD {
        return fallback_ratio(house.id, item);
    }
    let dealt = house.damage_dealt_by(item);
    if dealt == 0 && house.value_lost_of(item) == 0 {
        return fallback_ratio(house.id, item);
    }
    let lost = house.value_lost_of(item).max(u64::from(price)).max(1);
    u32::try_from((dealt * 100 / lost).clamp(10, 1000)).unwrap_or(1000)
}

impl QuantBot {
    /// One pass over every own structure: repair before anything else,
    /// place finished structures, upgrade before new production, then
    /// pick what to produce.
    pub(super) fn build(&mut self, ctx: &GameContext, orders: &mut Orders) {
        let mut credits: i64 = ctx.house(self.house).credits.to_num();
        let reserve = i64::from(CREDIT_RESERVE);

        for (id, obj) in ctx.objects.iter() {
            if obj.owner() != self.house || !obj.is_structure() || obj.base.departed {
                continue;
            }
            let Some(structure) = obj.as_structure() else {
                continue;
            };

            let damaged = obj.base.health < obj.max_health(&ctx.rules);
            if damaged && !structure.repairing && credits > reserve {
                orders.on_object(CommandType::StructureRepair, id);
                if obj.builder().is_some() {
                    continue;
                }
            }

            let Some(state) = obj.builder() else {
                continue;
            };
            if let Some(ready) = state.ready_structure {
                self.place(ctx, obj, ready, orders);
                continue;
            }
            if state.is_upgrading() || state.on_hold || !state.queue.is_empty() {
                continue;
            }

            let upgrade_cost = i64::from(obj.data(&ctx.rules).upgrade_cost());
            if upgrade_unlocks(ctx, obj, self.house) && credits >= upgrade_cost + reserve {
                debug!(house = ?self.house, builder = %id, "upgrading");
                orders.on_object(CommandType::BuilderUpgrade, id);
                credits -= upgrade_cost;
                continue;
            }

            let choice = if obj.item() == ItemId::ConstructionYard {
                self.choose_structure(ctx, obj)
            } else {
                self.choose_unit(ctx, obj, credits)
            };
            let Some(item) = choice else {
                continue;
            };
            let price = i64::from(ctx.rules.get(item).price);
            if price > credits {
                continue;
            }
            debug!(house = ?self.house, builder = %id, %item, "producing");
            orders.push(id, Command::produce(orders.player, id, item, false));
            credits -= price;
        }
    }

    fn place(&self, ctx: &GameContext, builder: &GameObject, item: ItemId, orders: &mut Orders) {
        let pos = find_place_location(ctx, self.house, item, self.squad_rally);
        if pos.is_valid() {
            debug!(house = ?self.house, %item, %pos, "placing");
            let command = Command::place_structure(orders.player, builder.id(), item, pos);
            orders.push(builder.id(), command);
        } else {
            debug!(house = ?self.house, %item, "no room to place, retrying later");
        }
    }

    fn choose_structure(&self, ctx: &GameContext, yard: &GameObject) -> Option<ItemId> {
        let house = ctx.house(self.house);
        let buildable = |item: ItemId| yard.can_produce(ctx, item);

        if house.power_produced < house.power_required && buildable(ItemId::WindTrap) {
            return Some(ItemId::WindTrap);
        }

        if self.mode == GameMode::Campaign {
            // Missions only rebuild what they started with.
            return ItemId::ALL.into_iter().find(|&item| {
                item.is_structure()
                    && !item.is_slab()
                    && house.count(item) < self.initial_counts[item.index()]
                    && buildable(item)
            });
        }

        let credits: u64 = house.credits.saturating_to_num();
        if house.storage_capacity > 0 && credits * 5 > u64::from(house.storage_capacity) * 4 && buildable(ItemId::Silo) {
            return Some(ItemId::Silo);
        }
        let harvesters = house.count(ItemId::Harvester);
        let refineries = house.count(ItemId::Refinery);
        if refineries > 0 && refineries < 4 && harvesters > refineries * 3 && buildable(ItemId::Refinery) {
            return Some(ItemId::Refinery);
        }
        BUILD_ORDER
            .iter()
            .find(|&&(item, target)| house.count(item) < target && buildable(item))
            .map(|&(item, _)| item)
    }

    fn choose_unit(&mut self, ctx: &GameContext, builder: &GameObject, credits: i64) -> Option<ItemId> {
        let house = ctx.house(self.house);
        let buildable = |item: ItemId| builder.can_produce(ctx, item);
        let harvesters = house.count(ItemId::Harvester);

        match builder.item() {
            ItemId::HeavyFactory => {
                let no_base = !house.has(ItemId::ConstructionYard) && !house.has(ItemId::Mcv);
                if no_base && buildable(ItemId::Mcv) {
                    return Some(ItemId::Mcv);
                }
                let short = harvesters < self.harvester_limit;
                if short && (harvesters < 2 || self.rng.rand_bool()) && buildable(ItemId::Harvester) {
                    return Some(ItemId::Harvester);
                }
            }
            ItemId::HighTechFactory => {
                let wanted = (harvesters / 3).max(1);
                if harvesters > 0 && house.count(ItemId::Carryall) < wanted && buildable(ItemId::Carryall) {
                    return Some(ItemId::Carryall);
                }
            }
            _ => {}
        }

        if self.military_value >= self.military_value_limit {
            return None;
        }

        let candidates: Vec<(ItemId, u32)> = ItemId::ALL
            .into_iter()
            .filter(|&item| item.is_unit() && !stays_home(item) && buildable(item))
            .filter(|&item| i64::from(ctx.rules.get(item).price) <= credits)
            .map(|item| (item, production_weight(house, item, ctx.rules.get(item).price)))
            .collect();
        self.weighted_pick(&candidates)
    }

    fn weighted_pick(&mut self, candidates: &[(ItemId, u32)]) -> Option<ItemId> {
        let total: u32 = candidates.iter().map(|&(_, w)| w).sum();
        if total == 0 {
            return None;
        }
        let roll = self.rng.rand_range(0, i32::try_from(total - 1).unwrap_or(i32::MAX));
        let mut roll = u32::try_from(roll).unwrap_or(0);
        for &(item, weight) in candidates {
            if roll < weight {
                return Some(item);
            }
            roll -= weight;
        }
        candidates.last().map(|&(item, _)| item)
    }
}
