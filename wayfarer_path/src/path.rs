// The hypothesis arena.
//
// A hypothesis ("path") is a claim: standing in room R, moving in direction
// D lands in room R', with some relative probability. Paths form a tree —
// each tick's surviving forks are children of the previous tick's paths, so
// a chain of ancestors is the walk history that would be accepted if its
// leaf wins.
//
// Nodes live in an arena of slots addressed by `PathId`, with parent/child
// links stored as indices and a free list for reuse. Denying a path marks
// its slot free and unlinks it; nothing is freed mid-traversal and there
// are no owning pointers anywhere in the tree.
//
// Probabilities have no fixed range; only relative ordering matters.

use crate::arbiter::RoomLockArbiter;
use crate::config::PathConfig;
use smallvec::SmallVec;
use wayfarer_map::RoomStore;
use wayfarer_map::store::MapEdit;
use wayfarer_map::types::{Coordinate, ExitDirection, RoomId};

/// Index of a hypothesis in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PathId(u32);

impl PathId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

struct Slot {
    /// The claimed current room. `None` only for the synthetic root the
    /// resync strategy hangs its children from.
    room: Option<RoomId>,
    prob: f64,
    parent: Option<PathId>,
    children: SmallVec<[PathId; 2]>,
    /// Direction traversed from the parent's room, when the hypothesis
    /// came from a directional fork.
    dir: Option<ExitDirection>,
    /// Whether this path holds its room through the arbiter.
    holds_room: bool,
}

#[derive(Default)]
pub struct PathArena {
    slots: Vec<Option<Slot>>,
    free: Vec<PathId>,
}

impl PathArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// A root hypothesis anchored at a known room. Roots hold nothing: the
    /// room they sit on is already part of the accepted map.
    pub fn new_root(&mut self, room: RoomId) -> PathId {
        self.alloc(Slot {
            room: Some(room),
            prob: 1.0,
            parent: None,
            children: SmallVec::new(),
            dir: None,
            holds_room: false,
        })
    }

    /// The roomless root the resync strategy attaches candidates to.
    pub fn new_synthetic_root(&mut self) -> PathId {
        self.alloc(Slot {
            room: None,
            prob: 1.0,
            parent: None,
            children: SmallVec::new(),
            dir: None,
            holds_room: false,
        })
    }

    /// An unscored child for resync: every candidate room hangs off the
    /// synthetic root with an externally assigned probability.
    pub fn add_unscored_child(
        &mut self,
        parent: PathId,
        room: RoomId,
        prob: f64,
        arbiter: &mut RoomLockArbiter,
    ) -> PathId {
        arbiter.hold(room);
        let child = self.alloc(Slot {
            room: Some(room),
            prob,
            parent: Some(parent),
            children: SmallVec::new(),
            dir: None,
            holds_room: true,
        });
        if let Some(slot) = self.slot_mut(parent) {
            slot.children.push(child);
        }
        child
    }

    /// Fork a scored child: the claim "from `parent`'s room, moving `dir`
    /// lands in `room`".
    ///
    /// The score starts from the distance between `expected` (parent
    /// position plus the direction's unit offset) and the candidate's
    /// actual position, then applies the exit-topology adjustments: a
    /// recorded exit to the candidate is as good as an exact position; an
    /// exit already wired elsewhere, a self-loop, or a reverse link already
    /// claimed by another room all penalize. The result is divided by the
    /// candidate's current lock count (several hypotheses converging on one
    /// room corroborate each other) and multiplied by the new-room penalty
    /// for rooms synthesized this tick. Child probability is the parent's
    /// divided by the final factor.
    pub fn fork(
        &mut self,
        parent: PathId,
        room: RoomId,
        expected: Coordinate,
        dir: ExitDirection,
        config: &PathConfig,
        arbiter: &mut RoomLockArbiter,
        store: &RoomStore,
    ) -> Option<PathId> {
        let parent_room = self.room(parent)?;
        let (candidate_pos, candidate_temp) = {
            let candidate = store.get(room)?;
            (candidate.position, candidate.is_temporary())
        };

        arbiter.hold(room);

        let mut dist = expected.distance(candidate_pos);
        if dist < 0.5 {
            dist = 1.0 / config.correct_position_bonus;
        } else {
            let from = store.get(parent_room)?;
            let exit = from.exit(dir);
            if exit.outgoing.contains(room) {
                dist = 1.0 / config.correct_position_bonus;
            } else if !exit.out_is_empty() || room == parent_room {
                dist *= config.multiple_connections_penalty;
            } else {
                let reverse = store.get(room)?.exit(dir.opposite());
                if !reverse.incoming.is_empty() {
                    dist *= config.multiple_connections_penalty;
                }
            }
        }
        dist /= f64::from(arbiter.lock_count(room).max(1));
        if candidate_temp {
            dist *= config.new_room_penalty;
        }
        let prob = self.prob(parent) / dist;

        let child = self.alloc(Slot {
            room: Some(room),
            prob,
            parent: Some(parent),
            children: SmallVec::new(),
            dir: Some(dir),
            holds_room: true,
        });
        if let Some(slot) = self.slot_mut(parent) {
            slot.children.push(child);
        }
        Some(child)
    }

    /// Accept a hypothesis: its ancestor chain becomes the walk history.
    ///
    /// Each ancestor's room is kept (promoted and unlocked, with the
    /// traversed exit recorded); the accepted node's own children are
    /// detached into roots; every visited slot is freed. Siblings must be
    /// denied by the caller beforehand — approval only walks upward.
    pub fn approve(
        &mut self,
        id: PathId,
        store: &mut RoomStore,
        arbiter: &mut RoomLockArbiter,
        edits: &mut Vec<MapEdit>,
    ) {
        let Some(slot) = self.slots.get_mut(id.index()).and_then(Option::take) else {
            debug_assert!(false, "approve of dead path {id:?}");
            log::warn!("paths: approve of dead path {id:?}");
            return;
        };
        for child in &slot.children {
            if let Some(c) = self.slot_mut(*child) {
                c.parent = None;
            }
        }
        if let Some(parent) = slot.parent {
            if slot.holds_room
                && let Some(room) = slot.room
            {
                let from = self.room(parent);
                arbiter.keep(room, slot.dir, from, store, edits);
            }
            if let Some(p) = self.slot_mut(parent) {
                p.children.retain(|c| *c != id);
            }
            self.free.push(id);
            self.approve(parent, store, arbiter, edits);
        } else {
            debug_assert!(slot.dir.is_none());
            self.free.push(id);
        }
    }

    /// Discard a childless hypothesis, releasing its room hold, and walk up
    /// denying every ancestor this leaves childless. A path that still has
    /// children is left alone.
    pub fn deny(&mut self, id: PathId, store: &mut RoomStore, arbiter: &mut RoomLockArbiter) {
        let has_children = match self.slots.get(id.index()).and_then(Option::as_ref) {
            Some(slot) => !slot.children.is_empty(),
            None => {
                debug_assert!(false, "deny of dead path {id:?}");
                log::warn!("paths: deny of dead path {id:?}");
                return;
            }
        };
        if has_children {
            return;
        }
        let Some(slot) = self.slots.get_mut(id.index()).and_then(Option::take) else {
            return;
        };
        if slot.holds_room
            && let Some(room) = slot.room
        {
            arbiter.release(room, store);
        }
        self.free.push(id);
        if let Some(parent) = slot.parent {
            if let Some(p) = self.slot_mut(parent) {
                p.children.retain(|c| *c != id);
            }
            self.deny(parent, store, arbiter);
        }
    }

    pub fn room(&self, id: PathId) -> Option<RoomId> {
        self.slots.get(id.index())?.as_ref()?.room
    }

    pub fn prob(&self, id: PathId) -> f64 {
        match self.slots.get(id.index()).and_then(Option::as_ref) {
            Some(slot) => slot.prob,
            None => {
                debug_assert!(false, "prob of dead path {id:?}");
                0.0
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn set_prob(&mut self, id: PathId, prob: f64) {
        if let Some(slot) = self.slot_mut(id) {
            slot.prob = prob;
        }
    }

    pub fn has_children(&self, id: PathId) -> bool {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .is_some_and(|s| !s.children.is_empty())
    }

    pub fn is_alive(&self, id: PathId) -> bool {
        self.slots
            .get(id.index())
            .is_some_and(Option::is_some)
    }

    /// Number of live slots, synthetic roots included.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    fn alloc(&mut self, slot: Slot) -> PathId {
        match self.free.pop() {
            Some(id) => {
                self.slots[id.index()] = Some(slot);
                id
            }
            None => {
                let id = PathId(self.slots.len() as u32);
                self.slots.push(Some(slot));
                id
            }
        }
    }

    fn slot_mut(&mut self, id: PathId) -> Option<&mut Slot> {
        self.slots.get_mut(id.index())?.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_map::Room;
    use wayfarer_map::room::RoomStatus;
    use wayfarer_map::types::Coordinate;

    fn permanent_room(store: &mut RoomStore, x: i32, y: i32) -> RoomId {
        store.insert_room(Room {
            name: format!("room {x},{y}"),
            static_desc: "somewhere".to_owned(),
            position: Coordinate::new(x, y, 0),
            status: RoomStatus::Permanent,
            ..Room::default()
        })
    }

    #[test]
    fn fork_rewards_expected_position() {
        let mut store = RoomStore::new();
        let a = permanent_room(&mut store, 0, 0);
        let b = permanent_room(&mut store, 0, 1);
        let far = permanent_room(&mut store, 5, 5);

        let mut arena = PathArena::new();
        let mut arbiter = RoomLockArbiter::new();
        let config = PathConfig::default();
        let root = arena.new_root(a);

        let expected = Coordinate::new(0, 1, 0);
        let close = arena
            .fork(root, b, expected, ExitDirection::North, &config, &mut arbiter, &store)
            .expect("forked");
        let distant = arena
            .fork(root, far, expected, ExitDirection::North, &config, &mut arbiter, &store)
            .expect("forked");

        assert!(arena.prob(close) > arena.prob(distant));
        assert!(arena.prob(close) > 1.0);
    }

    #[test]
    fn fork_penalizes_temporary_rooms() {
        let mut store = RoomStore::new();
        let a = permanent_room(&mut store, 0, 0);
        let b = permanent_room(&mut store, 0, 1);
        let temp = store.insert_room(Room {
            name: "fresh".to_owned(),
            position: Coordinate::new(1, 1, 0),
            status: RoomStatus::Temporary,
            ..Room::default()
        });

        let mut arena = PathArena::new();
        let mut arbiter = RoomLockArbiter::new();
        let config = PathConfig::default();
        let root = arena.new_root(a);

        let expected = Coordinate::new(0, 1, 0);
        let existing = arena
            .fork(root, b, expected, ExitDirection::North, &config, &mut arbiter, &store)
            .expect("forked");
        // Compare against a permanent clone of the same situation: place
        // the temp room exactly at the expected coordinate too.
        store.move_room(temp, expected);
        let synthesized = arena
            .fork(root, temp, expected, ExitDirection::North, &config, &mut arbiter, &store)
            .expect("forked");

        assert!(arena.prob(existing) > arena.prob(synthesized));
    }

    #[test]
    fn deny_cascades_to_childless_ancestors_and_drops_holds() {
        let mut store = RoomStore::new();
        let a = permanent_room(&mut store, 0, 0);
        let b = permanent_room(&mut store, 0, 1);
        let c = permanent_room(&mut store, 0, 2);

        let mut arena = PathArena::new();
        let mut arbiter = RoomLockArbiter::new();
        let config = PathConfig::default();
        let root = arena.new_root(a);
        let mid = arena
            .fork(root, b, Coordinate::new(0, 1, 0), ExitDirection::North, &config, &mut arbiter, &store)
            .expect("forked");
        let leaf = arena
            .fork(mid, c, Coordinate::new(0, 2, 0), ExitDirection::North, &config, &mut arbiter, &store)
            .expect("forked");

        // Denying the internal node is a no-op while the leaf lives.
        arena.deny(mid, &mut store, &mut arbiter);
        assert!(arena.is_alive(mid));

        arena.deny(leaf, &mut store, &mut arbiter);
        assert!(!arena.is_alive(leaf));
        assert!(!arena.is_alive(mid));
        assert!(!arena.is_alive(root));
        assert_eq!(arbiter.outstanding(), 0);
    }

    #[test]
    fn approve_keeps_the_ancestor_chain() {
        let mut store = RoomStore::new();
        let a = permanent_room(&mut store, 0, 0);
        let event = wayfarer_map::event::observed_event(
            wayfarer_map::types::MoveKind::North,
            "New Clearing",
            "Freshly mapped.",
            wayfarer_map::room::Terrain::Forest,
        );
        let b = store
            .create_room(&event, Coordinate::new(0, 1, 0))
            .expect("created");

        let mut arena = PathArena::new();
        let mut arbiter = RoomLockArbiter::new();
        let config = PathConfig::default();
        let root = arena.new_root(a);
        let leaf = arena
            .fork(root, b, Coordinate::new(0, 1, 0), ExitDirection::North, &config, &mut arbiter, &store)
            .expect("forked");

        let mut edits = Vec::new();
        arena.approve(leaf, &mut store, &mut arbiter, &mut edits);

        assert!(!arena.is_alive(leaf));
        assert!(!arena.is_alive(root));
        assert_eq!(arbiter.outstanding(), 0);
        assert!(!store.get(b).expect("kept").is_temporary());
        assert_eq!(
            edits,
            vec![MapEdit::AddExit {
                from: a,
                dir: ExitDirection::North,
                to: b,
            }]
        );
    }

    #[test]
    fn slots_are_reused_after_denial() {
        let mut store = RoomStore::new();
        let a = permanent_room(&mut store, 0, 0);
        let mut arena = PathArena::new();
        let mut arbiter = RoomLockArbiter::new();

        let root = arena.new_root(a);
        arena.deny(root, &mut store, &mut arbiter);
        let again = arena.new_root(a);
        assert_eq!(root, again);
        assert_eq!(arena.live_count(), 1);
    }
}
