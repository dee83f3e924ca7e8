//! Per-house economy, power and battle statistics.
//!
//! Credits are fixed point so that production can draw them a fraction at
//! a time. Item counts, power and storage are recomputed from the object
//! registry at the start of every tick rather than tracked incrementally.

use crate::data::{HouseId, ItemId, Rules};
use crate::math::{ratio, Fixed};
use crate::objects::ObjectRegistry;

const ITEM_COUNT: usize = ItemId::ALL.len();

/// State of one house.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct House {
    /// Which house this is.
    pub id: HouseId,
    /// Team index; houses on one team are allies.
    pub team: u8,
    /// Whether the house takes part in this game.
    pub active: bool,
    /// Spendable credits.
    pub credits: Fixed,
    /// Spice storage from refineries and silos.
    pub storage_capacity: u32,
    /// Power from wind traps.
    pub power_produced: i32,
    /// Power drawn by other structures.
    pub power_required: i32,
    /// Enemy objects destroyed.
    pub kills: u32,
    /// Own objects lost.
    pub losses: u32,
    counts: Vec<u32>,
    damage_dealt: Vec<u64>,
    value_lost: Vec<u64>,
}

impl House {
    /// A fresh house on its own team.
    #[must_use]
    pub fn new(id: HouseId) -> Self {
        Self {
            id,
            team: id.index() as u8,
            active: false,
            credits: Fixed::ZERO,
            storage_capacity: 0,
            power_produced: 0,
            power_required: 0,
            kills: 0,
            losses: 0,
            counts: vec![0; ITEM_COUNT],
            damage_dealt: vec![0; ITEM_COUNT],
            value_lost: vec![0; ITEM_COUNT],
        }
    }

    /// Team index for fog and friend-or-foe checks.
    #[must_use]
    pub const fn team(&self) -> usize {
        self.team as usize
    }

    /// Whether the house can pay `amount` in full.
    #[must_use]
    pub fn can_afford(&self, amount: Fixed) -> bool {
        self.credits >= amount
    }

    /// Take up to `amount` credits, returning what was actually taken.
    pub fn spend(&mut self, amount: Fixed) -> Fixed {
        let taken = amount.min(self.credits).max(Fixed::ZERO);
        self.credits -= taken;
        taken
    }

    /// Add credits.
    pub fn add_credits(&mut self, amount: Fixed) {
        self.credits += amount.max(Fixed::ZERO);
    }

    /// Whether wind traps cover the power draw.
    #[must_use]
    pub const fn has_enough_power(&self) -> bool {
        self.power_produced >= self.power_required
    }

    /// Production speed factor: full with enough power, half without.
    #[must_use]
    pub fn production_factor(&self) -> Fixed {
        if self.has_enough_power() {
            Fixed::ONE
        } else {
            ratio(1, 2)
        }
    }

    /// Number of live objects of `item` this house owns.
    #[must_use]
    pub fn count(&self, item: ItemId) -> u32 {
        self.counts[item.index()]
    }

    /// Whether the house owns at least one `item`.
    #[must_use]
    pub fn has(&self, item: ItemId) -> bool {
        self.count(item) > 0
    }

    /// Total number of structures owned.
    #[must_use]
    pub fn structure_count(&self) -> u32 {
        ItemId::ALL
            .iter()
            .filter(|item| item.is_structure())
            .map(|&item| self.count(item))
            .sum()
    }

    /// Record damage dealt by one of this house's `attacker`s.
    pub fn record_damage_dealt(&mut self, attacker: ItemId, amount: Fixed) {
        let amount = amount.max(Fixed::ZERO).to_num::<u64>();
        self.damage_dealt[attacker.index()] += amount;
    }

    /// Record the loss of one of this house's objects.
    pub fn record_loss(&mut self, item: ItemId, price: u32) {
        self.losses += 1;
        self.value_lost[item.index()] += u64::from(price);
    }

    /// Damage dealt so far by `item`.
    #[must_use]
    pub fn damage_dealt_by(&self, item: ItemId) -> u64 {
        self.damage_dealt[item.index()]
    }

    /// Credits lost so far in destroyed `item`s.
    #[must_use]
    pub fn value_lost_of(&self, item: ItemId) -> u64 {
        self.value_lost[item.index()]
    }

    /// Damage dealt by all of this house's objects.
    #[must_use]
    pub fn total_damage_dealt(&self) -> u64 {
        self.damage_dealt.iter().sum()
    }

    /// Raw statistics for save games: damage dealt and value lost per item.
    #[must_use]
    pub fn statistics(&self) -> (&[u64], &[u64]) {
        (&self.damage_dealt, &self.value_lost)
    }

    /// Restore statistics from a save game.
    pub fn restore_statistics(&mut self, damage_dealt: Vec<u64>, value_lost: Vec<u64>) {
        if damage_dealt.len() == ITEM_COUNT && value_lost.len() == ITEM_COUNT {
            self.damage_dealt = damage_dealt;
            self.value_lost = value_lost;
        }
    }

    /// Recompute item counts, power and storage for every house.
    pub fn refresh_totals(houses: &mut [Self], objects: &ObjectRegistry, rules: &Rules) {
        for house in houses.iter_mut() {
            house.counts.iter_mut().for_each(|c| *c = 0);
            house.power_produced = 0;
            house.power_required = 0;
            house.storage_capacity = 0;
        }
        for (_, object) in objects.iter() {
            if object.base.is_dead() || object.base.departed {
                continue;
            }
            let Some(house) = houses.get_mut(object.owner().index()) else {
                continue;
            };
            let data = object.data(rules);
            house.counts[object.item().index()] += 1;
            if object.is_structure() {
                if data.power < 0 {
                    house.power_produced -= data.power;
                } else {
                    house.power_required += data.power;
                }
                house.storage_capacity += data.storage;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spend_is_partial() {
        let mut house = House::new(HouseId::Ordos);
        house.add_credits(Fixed::from_num(100));
        assert_eq!(house.spend(Fixed::from_num(30)), Fixed::from_num(30));
        assert_eq!(house.spend(Fixed::from_num(500)), Fixed::from_num(70));
        assert_eq!(house.credits, Fixed::ZERO);
        assert_eq!(house.spend(Fixed::from_num(1)), Fixed::ZERO);
    }

    #[test]
    fn test_power_factor() {
        let mut house = House::new(HouseId::Atreides);
        house.power_produced = 100;
        house.power_required = 80;
        assert_eq!(house.production_factor(), Fixed::ONE);
        house.power_required = 120;
        assert_eq!(house.production_factor(), ratio(1, 2));
    }

    #[test]
    fn test_statistics() {
        let mut house = House::new(HouseId::Harkonnen);
        house.record_damage_dealt(ItemId::Tank, Fixed::from_num(25));
        house.record_damage_dealt(ItemId::Tank, Fixed::from_num(25));
        house.record_loss(ItemId::Trike, 150);
        assert_eq!(house.damage_dealt_by(ItemId::Tank), 50);
        assert_eq!(house.value_lost_of(ItemId::Trike), 150);
        assert_eq!(house.losses, 1);
        assert_eq!(house.total_damage_dealt(), 50);
    }
}
