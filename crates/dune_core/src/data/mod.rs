//! Static game data.
//!
//! Item and house identifiers, and the rules table that gives every item
//! its hit points, price, speed and weapon. The table is a RON document
//! embedded in the crate; this module does no file IO.

mod items;
mod object_data;

pub use items::{HouseId, ItemId, NUM_HOUSES};
pub use object_data::{hundredths, GameConstants, ObjectData, Rules, WeaponData};
