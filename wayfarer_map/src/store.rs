// Room store: the arena that owns every room plus both lookup indices.
//
// Rooms live in a slot arena indexed by `RoomId`; freed slots go on a free
// list and are reused, so a `RoomId` is only valid while its room exists.
// The store keeps the spatial index (`spatial.rs`) and the candidate index
// (`candidate.rs`) consistent with the arena on every mutation — callers
// never touch the indices directly.
//
// Mutations from the path engine arrive in two shapes:
//   - immediate calls (`create_room`, `make_permanent`,
//     `release_if_temporary`) for operations whose ordering matters to
//     room-lifetime bookkeeping, and
//   - `MapEdit` batches applied at the end of a tick for everything else
//     (exit links, field refreshes, server ids, moves, sunlight).
//
// See also: `compare.rs` for the matching verdicts the candidate results
// feed into.

use crate::candidate::{CandidateIndex, CollectionId};
use crate::event::{DirectionalLight, ParseEvent};
use crate::room::{ExitFlags, Light, Room, RoomStatus, Sundeath};
use crate::spatial::SpatialIndex;
use crate::types::{
    ALL_DIRECTIONS6, Bounds, Coordinate, ExitDirection, ExternalRoomId, RoomId, RoomIdSet,
    ServerRoomId,
};
use serde::{Deserialize, Serialize};

struct Slot {
    room: Room,
    collection: Option<CollectionId>,
}

/// A deferred map mutation. The path engine accumulates these during a tick
/// and the orchestrator applies them in order once the tick's hypothesis
/// bookkeeping is done.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MapEdit {
    /// Record a one-way connection `from --dir--> to` (plus reverse link).
    AddExit {
        from: RoomId,
        dir: ExitDirection,
        to: RoomId,
    },
    /// Refresh a room's observed fields from an event.
    UpdateRoom { id: RoomId, event: ParseEvent },
    /// Attach the game's own id to a room.
    SetServerId { id: RoomId, server_id: ServerRoomId },
    /// Relocate a room on the grid.
    MoveRoom { id: RoomId, to: Coordinate },
    /// Record whether direct sunlight is lethal in a room.
    SetSunlight { id: RoomId, sundeath: Sundeath },
}

#[derive(Default)]
pub struct RoomStore {
    slots: Vec<Option<Slot>>,
    free: Vec<RoomId>,
    len: usize,
    spatial: SpatialIndex,
    candidates: CandidateIndex,
    next_external: u32,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, id: RoomId) -> Option<&Room> {
        self.slots.get(id.index())?.as_ref().map(|s| &s.room)
    }

    /// Every live room id, in arena order.
    pub fn ids(&self) -> impl Iterator<Item = RoomId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| RoomId(i as u32))
    }

    // -----------------------------------------------------------------------
    // Creation and removal
    // -----------------------------------------------------------------------

    /// Insert a fully formed room (map loading, tests). The store assigns
    /// the external id if the room carries the default one.
    pub fn insert_room(&mut self, mut room: Room) -> RoomId {
        if room.external_id == ExternalRoomId::default() {
            room.external_id = self.fresh_external_id();
        }
        let id = self.alloc();
        self.spatial.insert(id, room.position);
        let collection = self.candidates.insert_room(id, &room);
        self.slots[id.index()] = Some(Slot { room, collection });
        self.len += 1;
        id
    }

    /// Create a provisional room at `position` from an observation.
    ///
    /// Refuses if the coordinate is already occupied — provisional rooms
    /// never stack on existing ones. The new room starts `Temporary`; it
    /// becomes part of the map only through `make_permanent`.
    pub fn create_room(&mut self, event: &ParseEvent, position: Coordinate) -> Option<RoomId> {
        if self.spatial.has_room_at(position) {
            return None;
        }
        let mut room = Room {
            position,
            status: RoomStatus::Temporary,
            ..Room::default()
        };
        fill_from_event(&mut room, event);
        Some(self.insert_room(room))
    }

    /// Promote a provisional room into the accepted map.
    pub fn make_permanent(&mut self, id: RoomId) {
        match self.slot_mut(id) {
            Some(slot) => slot.room.status = RoomStatus::Permanent,
            None => {
                debug_assert!(false, "make_permanent on dead room {id}");
                log::warn!("store: make_permanent on dead room {id}");
            }
        }
    }

    /// Reclaim a provisional room nobody holds anymore. Permanent rooms and
    /// dead ids are left alone. Returns whether a room was removed.
    pub fn release_if_temporary(&mut self, id: RoomId) -> bool {
        let is_temp = match self.get(id) {
            Some(room) => room.is_temporary(),
            None => return false,
        };
        if is_temp {
            self.remove_room(id);
        }
        is_temp
    }

    fn remove_room(&mut self, id: RoomId) {
        let Some(slot) = self.slots[id.index()].take() else {
            return;
        };
        self.spatial.remove(id, slot.room.position);
        if let Some(cid) = slot.collection {
            self.candidates.remove_room(id, cid);
        }
        // Drop dangling exit references from every neighbor the room knew.
        let neighbors: Vec<RoomId> = slot
            .room
            .exits()
            .flat_map(|(_, e)| e.outgoing.iter().chain(e.incoming.iter()))
            .filter(|&n| n != id)
            .collect();
        for n in neighbors {
            if let Some(other) = self.slot_mut(n) {
                for dir in crate::types::ALL_EXITS7 {
                    let exit = other.room.exit_mut(dir);
                    exit.outgoing.remove(id);
                    exit.incoming.remove(id);
                }
            }
        }
        self.free.push(id);
        self.len -= 1;
    }

    // -----------------------------------------------------------------------
    // Edits
    // -----------------------------------------------------------------------

    pub fn apply_edits(&mut self, edits: &[MapEdit]) {
        for edit in edits {
            self.apply(edit);
        }
    }

    pub fn apply(&mut self, edit: &MapEdit) {
        match edit {
            MapEdit::AddExit { from, dir, to } => self.add_exit(*from, *dir, *to),
            MapEdit::UpdateRoom { id, event } => self.update_room(*id, event),
            MapEdit::SetServerId { id, server_id } => self.set_server_id(*id, *server_id),
            MapEdit::MoveRoom { id, to } => self.move_room(*id, *to),
            MapEdit::SetSunlight { id, sundeath } => self.set_sunlight(*id, *sundeath),
        }
    }

    /// Record `from --dir--> to`. The reverse link lands on `to`'s opposite
    /// slot: `to.exit(dir.opposite()).incoming` lists the rooms you can
    /// arrive from through that side. Idempotent.
    pub fn add_exit(&mut self, from: RoomId, dir: ExitDirection, to: RoomId) {
        if self.get(from).is_none() || self.get(to).is_none() {
            debug_assert!(false, "add_exit with dead room {from} -> {to}");
            log::warn!("store: add_exit with dead room {from} -> {to}");
            return;
        }
        if let Some(slot) = self.slot_mut(from) {
            let exit = slot.room.exit_mut(dir);
            exit.flags.set(ExitFlags::EXIT);
            exit.outgoing.insert(to);
        }
        if let Some(slot) = self.slot_mut(to) {
            slot.room.exit_mut(dir.opposite()).incoming.insert(from);
        }
    }

    /// Refresh a room's observed fields from an event. Unobserved fields
    /// keep their stored values; observed exit flags are merged in.
    pub fn update_room(&mut self, id: RoomId, event: &ParseEvent) {
        let Some(slot) = self.slot_mut(id) else {
            debug_assert!(false, "update of dead room {id}");
            log::warn!("store: update of dead room {id}");
            return;
        };
        fill_from_event(&mut slot.room, event);
        self.reindex(id);
    }

    pub fn set_server_id(&mut self, id: RoomId, server_id: ServerRoomId) {
        if let Some(slot) = self.slot_mut(id) {
            slot.room.server_id = Some(server_id);
        }
    }

    pub fn move_room(&mut self, id: RoomId, to: Coordinate) {
        let Some(slot) = self.slot_mut(id) else {
            return;
        };
        let from = slot.room.position;
        slot.room.position = to;
        self.spatial.move_room(id, from, to);
    }

    pub fn set_sunlight(&mut self, id: RoomId, sundeath: Sundeath) {
        if let Some(slot) = self.slot_mut(id) {
            slot.room.sundeath = sundeath;
        }
    }

    /// Derive sunlight edits from an event's connected-room observations:
    /// a direct-sun report through an exit marks the room behind it.
    pub fn sunlight_edits(&self, at: RoomId, event: &ParseEvent) -> Vec<MapEdit> {
        let flags = event.connected_flags();
        if !flags.is_valid() {
            return Vec::new();
        }
        let Some(room) = self.get(at) else {
            return Vec::new();
        };
        let mut edits = Vec::new();
        for dir in ALL_DIRECTIONS6 {
            let Some(light) = flags.light(dir) else {
                continue;
            };
            let sundeath = match light {
                DirectionalLight::DirectSun => Sundeath::Sundeath,
                DirectionalLight::IndirectSun => Sundeath::NoSundeath,
                DirectionalLight::None => continue,
            };
            let exit = room.exit(dir);
            if !exit.out_is_unique() {
                // An ambiguous or random exit: the hint cannot be pinned on
                // any one destination, so record nothing.
                continue;
            }
            for neighbor in exit.outgoing.iter() {
                let known = self.get(neighbor).map(|r| r.sundeath);
                if known != Some(sundeath) {
                    edits.push(MapEdit::SetSunlight {
                        id: neighbor,
                        sundeath,
                    });
                }
            }
        }
        edits
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Rooms whose text could match this observation.
    ///
    /// Fast path through the candidate index; on a miss with at least the
    /// name observed there is genuinely nothing to find, but an observation
    /// with no usable text falls back to scanning every room, which is slow
    /// enough to be worth a log line.
    pub fn find_candidates(&mut self, event: &ParseEvent) -> RoomIdSet {
        if let Some(found) = self.candidates.lookup(event) {
            return found;
        }
        if event.name().is_some() {
            // Indexable observation, no such room: a real miss.
            return RoomIdSet::new();
        }
        log::warn!(
            "store: no fast candidates ({} fields skipped), scanning {} rooms",
            event.num_skipped(),
            self.len
        );
        self.ids().collect()
    }

    pub fn rooms_at(&self, coord: Coordinate) -> RoomIdSet {
        self.spatial.find_at(coord)
    }

    pub fn has_room_at(&self, coord: Coordinate) -> bool {
        self.spatial.has_room_at(coord)
    }

    pub fn rooms_in_bounds(&self, bounds: Bounds) -> RoomIdSet {
        self.spatial.find_in_bounds(bounds)
    }

    pub fn rooms_in_radius(&self, center: Coordinate, radius: i32) -> RoomIdSet {
        self.spatial.find_in_radius(center, radius)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.spatial.bounds()
    }

    pub fn needs_bounds_update(&self) -> bool {
        self.spatial.needs_bounds_update()
    }

    pub fn update_bounds(&mut self) -> Option<Bounds> {
        self.spatial.update_bounds()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn alloc(&mut self) -> RoomId {
        match self.free.pop() {
            Some(id) => id,
            None => {
                let id = RoomId(self.slots.len() as u32);
                self.slots.push(None);
                id
            }
        }
    }

    fn fresh_external_id(&mut self) -> ExternalRoomId {
        self.next_external += 1;
        ExternalRoomId(self.next_external)
    }

    fn slot_mut(&mut self, id: RoomId) -> Option<&mut Slot> {
        self.slots.get_mut(id.index())?.as_mut()
    }

    /// Re-register a room in the candidate index after a text change.
    fn reindex(&mut self, id: RoomId) {
        let Some(slot) = self.slots[id.index()].as_ref() else {
            return;
        };
        let old = slot.collection;
        let new = self.candidates.insert_room(id, &slot.room);
        if old != new
            && let Some(cid) = old
        {
            self.candidates.remove_room(id, cid);
        }
        if let Some(slot) = self.slots[id.index()].as_mut() {
            slot.collection = new;
        }
    }
}

/// Copy every observed field of `event` into `room`. Unobserved fields are
/// untouched; observed exit flags are OR-ed into the stored ones.
fn fill_from_event(room: &mut Room, event: &ParseEvent) {
    if let Some(name) = event.name() {
        room.name = name.to_owned();
    }
    if let Some(desc) = event.static_desc() {
        room.static_desc = desc.to_owned();
    }
    if let Some(desc) = event.dynamic_desc() {
        room.dynamic_desc = desc.to_owned();
    }
    if let Some(terrain) = event.terrain() {
        room.terrain = terrain;
    }
    let prompt = event.prompt_flags();
    if prompt.is_lit() {
        room.light = Light::Lit;
    } else if prompt.is_dark() && room.light == Light::Undefined {
        // Darkness may be transient (night); only record it when nothing
        // better is known.
        room.light = Light::Dark;
    }
    if let Some(server_id) = event.server_id() {
        room.server_id = Some(server_id);
    }
    let observed = event.exits_flags();
    if observed.is_valid() {
        for dir in ALL_DIRECTIONS6 {
            let exit = room.exit_mut(dir);
            if observed.is_exit(dir) {
                exit.flags.set(ExitFlags::EXIT);
            }
            if observed.is_door(dir) {
                exit.flags.set(ExitFlags::EXIT);
                exit.flags.set(ExitFlags::DOOR);
            }
            if observed.is_road(dir) {
                exit.flags.set(ExitFlags::ROAD);
            }
            if observed.is_climb(dir) {
                exit.flags.set(ExitFlags::CLIMB);
            }
        }
    }
}
