// Room lock arbiter: reference-counted holds hypotheses place on rooms.
//
// A room referenced by a live hypothesis must not be reclaimed by the store
// out from under the engine, even if the room was only provisionally
// created this tick. Every hypothesis that references a room holds it once;
// when the last hold drops, the store is told it may reclaim the room if it
// is still temporary. Everything is synchronous: holds and releases happen
// inside the tick that created or discarded the hypothesis.
//
// `keep` is the accepting counterpart of `release`: it promotes the room to
// a permanent part of the map (immediately, so a sibling's release in the
// same tick cannot reclaim it), records the traversed exit as a deferred
// edit, and then drops the hold.

use rustc_hash::FxHashMap;
use wayfarer_map::RoomStore;
use wayfarer_map::store::MapEdit;
use wayfarer_map::types::{ExitDirection, RoomId};

#[derive(Debug, Default)]
pub struct RoomLockArbiter {
    holds: FxHashMap<RoomId, u32>,
}

impl RoomLockArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(&mut self, room: RoomId) {
        *self.holds.entry(room).or_insert(0) += 1;
    }

    /// Drop one hold. On the last one, a still-temporary room is reclaimed
    /// from the store. Releasing an unheld room is a programmer error.
    pub fn release(&mut self, room: RoomId, store: &mut RoomStore) {
        match self.holds.get_mut(&room) {
            Some(count) => {
                *count -= 1;
                if *count == 0 {
                    self.holds.remove(&room);
                    store.release_if_temporary(room);
                }
            }
            None => {
                debug_assert!(false, "release of unheld room {room}");
                log::warn!("arbiter: release of unheld room {room}");
            }
        }
    }

    /// Accept a held room into the map: promote it, record the traversed
    /// exit (when the hypothesis had one), then drop the hold.
    pub fn keep(
        &mut self,
        room: RoomId,
        dir: Option<ExitDirection>,
        from: Option<RoomId>,
        store: &mut RoomStore,
        edits: &mut Vec<MapEdit>,
    ) {
        store.make_permanent(room);
        if let (Some(dir), Some(from)) = (dir, from) {
            edits.push(MapEdit::AddExit { from, dir, to: room });
        }
        self.release(room, store);
    }

    pub fn lock_count(&self, room: RoomId) -> u32 {
        self.holds.get(&room).copied().unwrap_or(0)
    }

    /// Total rooms currently held by any hypothesis.
    pub fn outstanding(&self) -> usize {
        self.holds.len()
    }
}
