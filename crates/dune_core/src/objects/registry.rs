//! Generational object registry.
//!
//! The registry is the single owner of every live object. All other
//! references (tile occupancy, targets, carryall cargo, commands) hold an
//! [`ObjectId`] and resolve it here on every use.
//!
//! An ID packs a slot index and a generation. Removing an object bumps the
//! slot's generation, so the old ID never resolves again. A slot whose
//! generation would wrap is retired instead of reused, which keeps IDs
//! unique for the whole run.

use serde::{Deserialize, Serialize};

use super::GameObject;

const SLOT_BITS: u32 = 20;
const SLOT_MASK: u32 = (1 << SLOT_BITS) - 1;
const MAX_GENERATION: u32 = (1 << (32 - SLOT_BITS)) - 1;

/// Stable identity of a simulation object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Raw value that never names an object.
    pub const NONE_RAW: u32 = 0;

    fn new(slot: u32, generation: u32) -> Self {
        debug_assert!(slot <= SLOT_MASK && (1..=MAX_GENERATION).contains(&generation));
        Self((generation << SLOT_BITS) | slot)
    }

    /// Rebuild an ID from its wire/save representation.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Decode an optional ID where zero means "none".
    #[must_use]
    pub const fn from_raw_opt(raw: u32) -> Option<Self> {
        if raw == Self::NONE_RAW {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Encode an optional ID where zero means "none".
    #[must_use]
    pub fn raw_opt(id: Option<Self>) -> u32 {
        id.map_or(Self::NONE_RAW, Self::raw)
    }

    /// Wire/save representation.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Slot index inside the registry.
    #[must_use]
    pub const fn slot(self) -> usize {
        (self.0 & SLOT_MASK) as usize
    }

    /// Generation of the slot when this ID was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.0 >> SLOT_BITS
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.slot(), self.generation())
    }
}

#[derive(Debug, Clone)]
enum SlotState {
    Vacant,
    Occupied(Box<GameObject>),
    /// Taken out for an update; the caller holds the object.
    CheckedOut,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    state: SlotState,
}

/// Owner of every live object.
#[derive(Debug, Clone, Default)]
pub struct ObjectRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl ObjectRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live objects, including checked-out ones.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    /// Whether no object is alive.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Reserve a fresh ID. The slot stays checked out until
    /// [`ObjectRegistry::put_back`] stores the object.
    pub fn allocate(&mut self) -> ObjectId {
        self.live += 1;
        if let Some(slot) = self.free.pop() {
            let entry = &mut self.slots[slot as usize];
            entry.state = SlotState::CheckedOut;
            return ObjectId::new(slot, entry.generation);
        }
        let slot = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 1,
            state: SlotState::CheckedOut,
        });
        ObjectId::new(slot, 1)
    }

    /// Insert an object under a fresh ID, letting `build` see the ID.
    pub fn insert_with(&mut self, build: impl FnOnce(ObjectId) -> GameObject) -> ObjectId {
        let id = self.allocate();
        self.put_back(id, build(id));
        id
    }

    /// Insert an object under an exact ID read from a save stream.
    ///
    /// Returns `false` when the ID's slot is taken or its generation is
    /// behind the slot's, which means the stream is corrupt.
    pub fn insert_at(&mut self, id: ObjectId, object: GameObject) -> bool {
        let slot = id.slot();
        if id.generation() == 0 || id.generation() > MAX_GENERATION {
            return false;
        }
        while self.slots.len() <= slot {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 1,
                state: SlotState::Vacant,
            });
            self.free.push(index);
        }
        let entry = &mut self.slots[slot];
        if !matches!(entry.state, SlotState::Vacant) || id.generation() < entry.generation {
            return false;
        }
        entry.generation = id.generation();
        entry.state = SlotState::Occupied(Box::new(object));
        self.free.retain(|&s| s as usize != slot);
        self.live += 1;
        true
    }

    fn slot(&self, id: ObjectId) -> Option<&Slot> {
        self.slots
            .get(id.slot())
            .filter(|entry| entry.generation == id.generation())
    }

    /// Whether `id` names a live object (checked out or not).
    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.slot(id)
            .is_some_and(|entry| !matches!(entry.state, SlotState::Vacant))
    }

    /// Resolve an ID. Checked-out and destroyed objects resolve to `None`.
    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        match &self.slot(id)?.state {
            SlotState::Occupied(object) => Some(object),
            _ => None,
        }
    }

    /// Resolve an ID mutably.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        let entry = self.slots.get_mut(id.slot())?;
        if entry.generation != id.generation() {
            return None;
        }
        match &mut entry.state {
            SlotState::Occupied(object) => Some(object),
            _ => None,
        }
    }

    /// Take an object out for an update that needs the rest of the world
    /// mutably. The ID stays reserved until [`put_back`](Self::put_back)
    /// or [`release`](Self::release).
    pub fn check_out(&mut self, id: ObjectId) -> Option<Box<GameObject>> {
        let entry = self.slots.get_mut(id.slot())?;
        if entry.generation != id.generation() {
            return None;
        }
        match std::mem::replace(&mut entry.state, SlotState::CheckedOut) {
            SlotState::Occupied(object) => Some(object),
            other => {
                entry.state = other;
                None
            }
        }
    }

    /// Store a checked-out or freshly allocated object.
    pub fn put_back(&mut self, id: ObjectId, object: impl Into<Box<GameObject>>) {
        let Some(entry) = self.slots.get_mut(id.slot()) else {
            debug_assert!(false, "put_back of unknown slot {id}");
            return;
        };
        debug_assert!(
            entry.generation == id.generation() && matches!(entry.state, SlotState::CheckedOut),
            "put_back of {id} that was not checked out"
        );
        if entry.generation == id.generation() {
            entry.state = SlotState::Occupied(object.into());
        }
    }

    /// Free a checked-out slot whose object was destroyed by its holder.
    pub fn release(&mut self, id: ObjectId) {
        if let Some(entry) = self.slots.get_mut(id.slot()) {
            if entry.generation == id.generation() && matches!(entry.state, SlotState::CheckedOut) {
                self.vacate(id);
            }
        }
    }

    /// Remove an object, returning it. The ID never resolves again.
    pub fn remove(&mut self, id: ObjectId) -> Option<GameObject> {
        let object = self.check_out(id)?;
        self.vacate(id);
        Some(*object)
    }

    fn vacate(&mut self, id: ObjectId) {
        let slot = id.slot();
        let entry = &mut self.slots[slot];
        entry.state = SlotState::Vacant;
        self.live -= 1;
        if entry.generation < MAX_GENERATION {
            entry.generation += 1;
            self.free.push(slot as u32);
        }
    }

    /// IDs of all objects currently stored, in slot order.
    ///
    /// Returns an owned list so the caller can mutate the registry while
    /// walking it.
    #[must_use]
    pub fn ids(&self) -> Vec<ObjectId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, entry)| matches!(entry.state, SlotState::Occupied(_)))
            .map(|(slot, entry)| ObjectId::new(slot as u32, entry.generation))
            .collect()
    }

    /// Iterate over stored objects in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &GameObject)> {
        self.slots.iter().enumerate().filter_map(|(slot, entry)| match &entry.state {
            SlotState::Occupied(object) => {
                Some((ObjectId::new(slot as u32, entry.generation), object.as_ref()))
            }
            _ => None,
        })
    }

    /// Slot generations and the free list, for save games.
    #[must_use]
    pub fn allocator_state(&self) -> (Vec<u32>, Vec<u32>) {
        (
            self.slots.iter().map(|entry| entry.generation).collect(),
            self.free.clone(),
        )
    }

    /// Restore an empty registry's allocator from a save game.
    pub fn restore_allocator(&mut self, generations: &[u32], free: Vec<u32>) {
        debug_assert!(self.is_empty(), "allocator restored into a populated registry");
        self.slots = generations
            .iter()
            .map(|&generation| Slot {
                generation,
                state: SlotState::Vacant,
            })
            .collect();
        self.free = free;
        self.live = 0;
    }
}
