// Textual candidate index: name/desc hash lookup ahead of real comparison.
//
// Given an observation, returns a small superset of rooms that could
// plausibly match, before any expensive field-by-field comparison runs. The
// index is keyed by a 3-bit mask over which of {name, desc, terrain} were
// actually observed. Only the masks that occur for genuine movement
// observations are indexed and queried: name-only, name+desc, and
// name+desc+terrain. A description-only observation is never produced by
// the protocol; seeing one signals a parser inconsistency upstream and is
// logged once rather than hardened into an error.
//
// Rooms register under the most specific mask they qualify for and under
// every strict reduction of it, so a lookup with partial information still
// finds rooms indexed with full information. Collections (sets of rooms
// sharing one key) are arena slots created lazily and never deleted —
// a stale empty collection is harmless and simply never matches.
//
// A lookup miss means "no fast candidates": `RoomStore::find_candidates`
// decides whether that is a genuine miss or grounds for the slow, logged
// whole-store scan.

use crate::event::ParseEvent;
use crate::room::{Room, Terrain};
use crate::types::{RoomId, RoomIdSet};
use rustc_hash::{FxHashMap, FxHashSet};

const NAME: u8 = 0b001;
const DESC: u8 = 0b010;
const TERRAIN: u8 = 0b100;

/// Index of a room collection in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CollectionId(u32);

impl CollectionId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

fn event_mask(event: &ParseEvent) -> u8 {
    let mut mask = 0;
    if event.name().is_some() {
        mask |= NAME;
    }
    if event.static_desc().is_some() {
        mask |= DESC;
    }
    if event.terrain().is_some() {
        mask |= TERRAIN;
    }
    mask
}

fn room_mask(room: &Room) -> u8 {
    let mut mask = 0;
    if !room.name.is_empty() {
        mask |= NAME;
    }
    if !room.static_desc.is_empty() {
        mask |= DESC;
    }
    if room.terrain != Terrain::Undefined {
        mask |= TERRAIN;
    }
    mask
}

/// The masks genuine movement observations produce.
fn is_supported(mask: u8) -> bool {
    mask == NAME || mask == (NAME | DESC) || mask == (NAME | DESC | TERRAIN)
}

/// Strip the least significant observed field: full → name+desc → name → none.
/// Unsupported combinations collapse to their nearest supported reduction.
fn reduce(mask: u8) -> u8 {
    match mask {
        m if m == (NAME | DESC | TERRAIN) => NAME | DESC,
        m if m == (NAME | DESC) || m == (NAME | TERRAIN) => NAME,
        _ => 0,
    }
}

#[derive(Clone, Debug, Default)]
pub struct CandidateIndex {
    /// Collection arena: sets of rooms sharing one full key.
    collections: Vec<RoomIdSet>,
    /// Full (name, desc, terrain) key to its collection.
    primary: FxHashMap<(String, String, Terrain), CollectionId>,
    /// Reduction buckets: collections reachable from partial observations.
    by_name_desc: FxHashMap<(String, String), FxHashSet<CollectionId>>,
    by_name: FxHashMap<String, FxHashSet<CollectionId>>,
    desc_only_warned: bool,
}

impl CandidateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a room. Returns the collection it joined, or `None` if the
    /// room has too little text to index (reachable only via full scan).
    pub fn insert_room(&mut self, id: RoomId, room: &Room) -> Option<CollectionId> {
        let mut mask = room_mask(room);
        while mask != 0 && !is_supported(mask) {
            mask = reduce(mask);
        }
        if mask == 0 {
            return None;
        }

        let full_key = (room.name.clone(), room.static_desc.clone(), room.terrain);
        let cid = match self.primary.get(&full_key) {
            Some(&cid) => cid,
            None => {
                let cid = CollectionId(self.collections.len() as u32);
                self.collections.push(RoomIdSet::new());
                self.primary.insert(full_key, cid);
                cid
            }
        };
        self.collections[cid.index()].insert(id);

        // Register under the room's own mask level (the full level is the
        // primary map) and every strict reduction, so lookups with the same
        // or less information find it.
        let mut sub = mask;
        while sub != 0 {
            if sub == (NAME | DESC) {
                self.by_name_desc
                    .entry((room.name.clone(), room.static_desc.clone()))
                    .or_default()
                    .insert(cid);
            } else if sub == NAME {
                self.by_name
                    .entry(room.name.clone())
                    .or_default()
                    .insert(cid);
            }
            sub = reduce(sub);
        }

        Some(cid)
    }

    /// Unregister a room from its collection. The collection itself (and
    /// its bucket entries) stay behind; empty collections never match.
    pub fn remove_room(&mut self, id: RoomId, cid: CollectionId) {
        match self.collections.get_mut(cid.index()) {
            Some(collection) => {
                collection.remove(id);
            }
            None => {
                debug_assert!(false, "remove from unknown collection {cid:?}");
                log::warn!("candidate index: remove of {id} from unknown collection");
            }
        }
    }

    /// Fast candidate lookup for an observation. `None` means no fast
    /// candidates — the caller must fall back to a whole-store scan.
    pub fn lookup(&mut self, event: &ParseEvent) -> Option<RoomIdSet> {
        let mask = event_mask(event);

        if mask == DESC && !self.desc_only_warned {
            // Never produced by the protocol for movement; if it shows up,
            // the upstream parser is emitting something inconsistent.
            self.desc_only_warned = true;
            log::warn!("candidate index: description-only observation seen");
        }
        if !is_supported(mask) {
            return None;
        }

        let name = event.name().unwrap_or_default();
        let result: RoomIdSet = if mask == (NAME | DESC | TERRAIN) {
            let key = (
                name.to_owned(),
                event.static_desc().unwrap_or_default().to_owned(),
                event.terrain().unwrap_or_default(),
            );
            let cid = self.primary.get(&key)?;
            self.collections[cid.index()].clone()
        } else if mask == (NAME | DESC) {
            let key = (
                name.to_owned(),
                event.static_desc().unwrap_or_default().to_owned(),
            );
            self.union(self.by_name_desc.get(&key)?)
        } else {
            self.union(self.by_name.get(name)?)
        };

        (!result.is_empty()).then_some(result)
    }

    fn union(&self, cids: &FxHashSet<CollectionId>) -> RoomIdSet {
        let mut out = RoomIdSet::new();
        for cid in cids {
            out.extend_from(&self.collections[cid.index()]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ConnectedRoomFlags, ExitsFlags, PromptFlags, observed_event};
    use crate::types::MoveKind;

    fn room(name: &str, desc: &str, terrain: Terrain) -> Room {
        Room {
            name: name.to_owned(),
            static_desc: desc.to_owned(),
            terrain,
            ..Room::default()
        }
    }

    fn name_only_event(name: &str) -> ParseEvent {
        ParseEvent::new(
            MoveKind::North,
            Some(name.to_owned()),
            None,
            None,
            ExitsFlags::default(),
            PromptFlags::default(),
            ConnectedRoomFlags::default(),
            None,
        )
    }

    #[test]
    fn fully_indexed_room_found_by_name_only() {
        let mut index = CandidateIndex::new();
        let r = room("Mossy Bridge", "A rope bridge sways here.", Terrain::Forest);
        index.insert_room(RoomId(1), &r).expect("indexable");

        let found = index.lookup(&name_only_event("Mossy Bridge")).expect("hit");
        assert!(found.contains(RoomId(1)));
    }

    #[test]
    fn full_lookup_requires_full_key_match() {
        let mut index = CandidateIndex::new();
        let r = room("Mossy Bridge", "A rope bridge sways here.", Terrain::Forest);
        index.insert_room(RoomId(1), &r).expect("indexable");

        let hit = index.lookup(&observed_event(
            MoveKind::North,
            "Mossy Bridge",
            "A rope bridge sways here.",
            Terrain::Forest,
        ));
        assert!(hit.expect("hit").contains(RoomId(1)));

        // Wrong terrain at the full-mask level: a miss, not a partial hit.
        let miss = index.lookup(&observed_event(
            MoveKind::North,
            "Mossy Bridge",
            "A rope bridge sways here.",
            Terrain::City,
        ));
        assert!(miss.is_none());
    }

    #[test]
    fn duplicate_rooms_share_a_collection() {
        let mut index = CandidateIndex::new();
        let r = room("Twisty Passage", "All alike.", Terrain::Cavern);
        let c1 = index.insert_room(RoomId(1), &r).expect("indexable");
        let c2 = index.insert_room(RoomId(2), &r).expect("indexable");
        assert_eq!(c1, c2);

        let found = index.lookup(&name_only_event("Twisty Passage")).expect("hit");
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn removal_leaves_empty_collection_inert() {
        let mut index = CandidateIndex::new();
        let r = room("Lonely Shrine", "A shrine.", Terrain::Hills);
        let cid = index.insert_room(RoomId(7), &r).expect("indexable");
        index.remove_room(RoomId(7), cid);
        assert!(index.lookup(&name_only_event("Lonely Shrine")).is_none());
    }

    #[test]
    fn desc_only_event_yields_no_candidates() {
        let mut index = CandidateIndex::new();
        let r = room("Mossy Bridge", "A rope bridge sways here.", Terrain::Forest);
        index.insert_room(RoomId(1), &r).expect("indexable");

        let event = ParseEvent::new(
            MoveKind::North,
            None,
            None,
            Some("A rope bridge sways here.".to_owned()),
            ExitsFlags::default(),
            PromptFlags::default(),
            ConnectedRoomFlags::default(),
            None,
        );
        assert!(index.lookup(&event).is_none());
    }

    #[test]
    fn nameless_room_is_not_indexable() {
        let mut index = CandidateIndex::new();
        let r = room("", "Only a description.", Terrain::Field);
        assert!(index.insert_room(RoomId(3), &r).is_none());
    }

    #[test]
    fn blank_event_yields_no_candidates() {
        let mut index = CandidateIndex::new();
        assert!(index.lookup(&ParseEvent::blank(MoveKind::North)).is_none());
    }
}
