// The orchestrator: a three-state machine driven by one observation per
// tick.
//
//   Approved      — exactly one accepted position; each move is validated
//                   against the rooms reachable from it.
//   Experimenting — several live hypotheses; each tick forks and prunes
//                   them until one wins or all die.
//   Syncing       — confidence has collapsed; candidates are rebuilt from
//                   the whole map.
//
// Each tick runs start to finish before the next event is accepted. Map
// mutations are collected into a `MapEdit` batch and applied through the
// store at the end of the tick; the one exception is provisional room
// creation, which must be immediate so forks can score against the new
// room — the hold mechanism reverts it if every hypothesis that used it is
// denied.
//
// See also: `experimenting.rs` for the fork/prune strategies, `arbiter.rs`
// for room lifetime during a tick.

use crate::arbiter::RoomLockArbiter;
use crate::config::PathConfig;
use crate::experimenting::{Crossover, OneByOne};
use crate::path::{PathArena, PathId};
use crate::syncing::Syncing;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use wayfarer_map::RoomStore;
use wayfarer_map::compare::{ComparisonResult, compare};
use wayfarer_map::event::ParseEvent;
use wayfarer_map::store::MapEdit;
use wayfarer_map::types::{ALL_EXITS7, ExitDirection, MoveKind, RoomId, RoomIdSet};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathState {
    Approved,
    Experimenting,
    #[default]
    Syncing,
}

/// What one tick produced: the settled state, the current best guess, and
/// the edit batch that was applied to the store.
#[derive(Debug)]
pub struct TickOutput {
    pub state: PathState,
    pub best_room: Option<RoomId>,
    pub edits: Vec<MapEdit>,
}

/// Collects rooms offered while Approved and remembers the single match.
///
/// A second non-`Different` room makes the tick ambiguous and the stage
/// reports no match. A tolerant (rather than exact) match on a fully
/// observed event flags the room for a refresh.
struct ApprovedMatcher<'a> {
    event: &'a ParseEvent,
    tolerance: i32,
    matched: Option<RoomId>,
    more_than_one: bool,
    update: bool,
}

impl<'a> ApprovedMatcher<'a> {
    fn new(event: &'a ParseEvent, tolerance: i32) -> Self {
        Self {
            event,
            tolerance,
            matched: None,
            more_than_one: false,
            update: false,
        }
    }

    fn offer(&mut self, store: &RoomStore, id: RoomId) {
        let Some(room) = store.get(id) else {
            return;
        };
        if self.matched.is_some() {
            if self.matched != Some(id) {
                self.more_than_one = true;
            }
            return;
        }
        match compare(room, self.event, self.tolerance) {
            ComparisonResult::Different => {}
            ComparisonResult::Equal => self.matched = Some(id),
            ComparisonResult::Tolerance => {
                self.matched = Some(id);
                if self.event.num_skipped() == 0 {
                    self.update = true;
                }
            }
        }
    }

    fn offer_all(&mut self, store: &RoomStore, ids: &RoomIdSet) {
        for id in ids.iter() {
            self.offer(store, id);
        }
    }

    fn one_match(&self) -> Option<RoomId> {
        if self.more_than_one { None } else { self.matched }
    }

    fn reset(&mut self) {
        self.matched = None;
        self.more_than_one = false;
        self.update = false;
    }
}

pub struct PathMachine {
    config: PathConfig,
    arena: PathArena,
    arbiter: RoomLockArbiter,
    paths: Vec<PathId>,
    state: PathState,
    most_likely: Option<RoomId>,
    skipped_run: u32,
}

impl PathMachine {
    pub fn new(config: PathConfig) -> Self {
        Self {
            config,
            arena: PathArena::new(),
            arbiter: RoomLockArbiter::new(),
            paths: Vec::new(),
            state: PathState::Syncing,
            most_likely: None,
            skipped_run: 0,
        }
    }

    pub fn state(&self) -> PathState {
        self.state
    }

    pub fn best_room(&self) -> Option<RoomId> {
        self.most_likely
    }

    pub fn config(&self) -> &PathConfig {
        &self.config
    }

    /// Swap the tuning parameters between ticks.
    pub fn set_config(&mut self, config: PathConfig) {
        self.config = config;
    }

    /// Live hypotheses going into the next tick.
    pub fn live_paths(&self) -> usize {
        self.paths.len()
    }

    /// Rooms currently held on behalf of hypotheses.
    pub fn outstanding_holds(&self) -> usize {
        self.arbiter.outstanding()
    }

    /// Process one observation. Returns the settled state, the best-guess
    /// room, and the edit batch already applied to the store.
    pub fn on_event(&mut self, store: &mut RoomStore, event: &ParseEvent) -> TickOutput {
        let mut edits = Vec::new();

        if event.num_skipped() > 0 {
            self.skipped_run += 1;
        } else {
            self.skipped_run = 0;
        }
        if self.skipped_run > self.config.max_skipped && self.state != PathState::Syncing {
            log::info!(
                "{} consecutive under-observed ticks, resyncing",
                self.skipped_run
            );
            self.release_all_paths(store);
        }

        match self.state {
            PathState::Approved => self.approved(store, event, &mut edits),
            PathState::Experimenting => self.experimenting(store, event, &mut edits),
            PathState::Syncing => self.syncing(store, event, &mut edits),
        }

        store.apply_edits(&edits);
        TickOutput {
            state: self.state,
            best_room: self.most_likely,
            edits,
        }
    }

    /// Deny every live hypothesis and fall back to Syncing. Safe from any
    /// state, including mid-Experimenting.
    pub fn release_all_paths(&mut self, store: &mut RoomStore) {
        for path in std::mem::take(&mut self.paths) {
            self.arena.deny(path, store, &mut self.arbiter);
        }
        self.state = PathState::Syncing;
    }

    /// Force the current position, discarding every hypothesis.
    pub fn set_current_room(&mut self, store: &mut RoomStore, id: RoomId) {
        self.release_all_paths(store);
        if store.get(id).is_some() {
            self.most_likely = Some(id);
            self.state = PathState::Approved;
        } else {
            debug_assert!(false, "set_current_room to dead room {id}");
            log::warn!("machine: set_current_room to dead room {id}");
        }
    }

    // -----------------------------------------------------------------------
    // Approved
    // -----------------------------------------------------------------------

    /// Validate a move from the single accepted position. The stages fall
    /// back from most to least reliable: forward exits, reverse exits, the
    /// expected coordinate, then one z-step below and above it (stairs the
    /// map recorded on the wrong level). A match refreshes the map; no
    /// match seeds a hypothesis root and drops to Experimenting.
    fn approved(&mut self, store: &mut RoomStore, event: &ParseEvent, edits: &mut Vec<MapEdit>) {
        let Some(here) = self.most_likely else {
            self.state = PathState::Syncing;
            self.syncing(store, event, edits);
            return;
        };

        let mut matcher = ApprovedMatcher::new(event, self.config.matching_tolerance);
        let move_kind = event.move_kind();

        matcher.offer_all(store, &forward_rooms(store, here, move_kind));
        let mut perhaps = matcher.one_match();

        if perhaps.is_none() {
            matcher.reset();
            matcher.offer_all(store, &reverse_rooms(store, here, move_kind));
            perhaps = matcher.one_match();
        }
        if perhaps.is_none() {
            matcher.reset();
            matcher.offer_all(store, &coordinate_rooms(store, here, move_kind));
            perhaps = matcher.one_match();
        }
        if perhaps.is_none()
            && let Some(dir) = move_kind.direction()
            && dir.offset().z == 0
            && let Some(pos) = store.get(here).map(|r| r.position)
        {
            let mut expected = pos + dir.offset();
            expected.z -= 1;
            matcher.reset();
            matcher.offer_all(store, &store.rooms_at(expected));
            perhaps = matcher.one_match();
            if perhaps.is_none() {
                expected.z += 2;
                matcher.reset();
                matcher.offer_all(store, &store.rooms_at(expected));
                perhaps = matcher.one_match();
            }
        }

        if let Some(found) = perhaps {
            if let Some(dir) = move_kind.direction() {
                edits.push(MapEdit::AddExit {
                    from: here,
                    dir,
                    to: found,
                });
            }
            self.most_likely = Some(found);
            edits.extend(store.sunlight_edits(found, event));
            if matcher.update {
                edits.push(MapEdit::UpdateRoom {
                    id: found,
                    event: event.clone(),
                });
            } else if let Some(server_id) = event.server_id()
                && store.get(found).is_some_and(|r| r.server_id.is_none())
            {
                edits.push(MapEdit::SetServerId {
                    id: found,
                    server_id,
                });
            }
        } else {
            self.state = PathState::Experimenting;
            let root = self.arena.new_root(here);
            self.paths.push(root);
            self.experimenting(store, event, edits);
        }
    }

    // -----------------------------------------------------------------------
    // Experimenting
    // -----------------------------------------------------------------------

    fn experimenting(
        &mut self,
        store: &mut RoomStore,
        event: &ParseEvent,
        edits: &mut Vec<MapEdit>,
    ) {
        let dir = event.move_kind().direction();
        // Rooms are synthesized only for a fully observed directional move;
        // anything else validates against what already exists.
        let creating = event.num_skipped() == 0
            && self.most_likely.is_some()
            && dir.is_some_and(|d| !d.offset().is_origin());

        if creating && let Some(dir) = dir {
            let mut cross = Crossover::new(self.paths.clone(), dir);

            // One provisional room per distinct path end, at the
            // coordinate the move should land on. Creation is immediate;
            // unused ones are reclaimed when their holds drop.
            let mut ends: FxHashSet<RoomId> = FxHashSet::default();
            for &path in &self.paths {
                let Some(room) = self.arena.room(path) else {
                    continue;
                };
                if ends.insert(room)
                    && let Some(pos) = store.get(room).map(|r| r.position)
                {
                    store.create_room(event, pos + dir.offset());
                }
            }

            let candidates = store.find_candidates(event);
            for candidate in candidates.iter() {
                cross.offer(candidate, &mut self.arena, &self.config, &mut self.arbiter, store);
            }
            self.paths = cross.evaluate(&mut self.arena, &self.config, store, &mut self.arbiter);
        } else {
            let mut one = OneByOne::new(dir.unwrap_or(ExitDirection::Unknown), event);
            for path in self.paths.clone() {
                one.add_path(path);
                let Some(room) = self.arena.room(path) else {
                    continue;
                };
                let candidates = adjacent_rooms(store, room, event.move_kind());
                for candidate in candidates.iter() {
                    one.offer(candidate, &mut self.arena, &self.config, &mut self.arbiter, store);
                }
            }
            self.paths = one.evaluate(&mut self.arena, &self.config, store, &mut self.arbiter);
        }

        self.evaluate_paths(store, edits);
    }

    // -----------------------------------------------------------------------
    // Syncing
    // -----------------------------------------------------------------------

    fn syncing(&mut self, store: &mut RoomStore, event: &ParseEvent, edits: &mut Vec<MapEdit>) {
        let mut sync = Syncing::new(&mut self.arena);
        if event.num_skipped() <= self.config.max_skipped {
            let candidates = store.find_candidates(event);
            for candidate in candidates.iter() {
                sync.offer(candidate, &mut self.arena, &self.config, store, &mut self.arbiter);
            }
        }
        self.paths = sync.evaluate(&mut self.arena, store, &mut self.arbiter);
        self.evaluate_paths(store, edits);
    }

    // -----------------------------------------------------------------------
    // Settling
    // -----------------------------------------------------------------------

    /// Decide the next state from the surviving hypothesis set: none means
    /// lost, one means accepted, several means keep experimenting.
    fn evaluate_paths(&mut self, store: &mut RoomStore, edits: &mut Vec<MapEdit>) {
        if self.paths.is_empty() {
            if self.state != PathState::Syncing {
                log::info!("no surviving hypothesis, resyncing");
            }
            self.state = PathState::Syncing;
            return;
        }
        self.most_likely = self.arena.room(self.paths[0]);
        if self.paths.len() == 1 {
            let only = self.paths.remove(0);
            self.arena.approve(only, store, &mut self.arbiter, edits);
            self.state = PathState::Approved;
        } else {
            log::debug!("{} live hypotheses", self.paths.len());
            self.state = PathState::Experimenting;
        }
    }
}

/// Rooms the move could land on via recorded forward exits.
fn forward_rooms(store: &RoomStore, here: RoomId, move_kind: MoveKind) -> RoomIdSet {
    let mut out = RoomIdSet::new();
    let Some(room) = store.get(here) else {
        return out;
    };
    if let Some(dir) = move_kind.direction() {
        out.extend_from(&room.exit(dir).outgoing);
    } else {
        out.insert(here);
        if move_kind.tries_all_exits() {
            for dir in ALL_EXITS7 {
                out.extend_from(&room.exit(dir).outgoing);
            }
        }
    }
    out
}

/// Rooms whose recorded exits lead here (one-way links mapped backwards).
fn reverse_rooms(store: &RoomStore, here: RoomId, move_kind: MoveKind) -> RoomIdSet {
    let mut out = RoomIdSet::new();
    let Some(room) = store.get(here) else {
        return out;
    };
    if let Some(dir) = move_kind.direction() {
        out.extend_from(&room.exit(dir).incoming);
    } else {
        out.insert(here);
        if move_kind.tries_all_exits() {
            for dir in ALL_EXITS7 {
                out.extend_from(&room.exit(dir).incoming);
            }
        }
    }
    out
}

/// Rooms at the coordinate(s) the move should have landed on.
fn coordinate_rooms(store: &RoomStore, here: RoomId, move_kind: MoveKind) -> RoomIdSet {
    let mut out = RoomIdSet::new();
    let Some(pos) = store.get(here).map(|r| r.position) else {
        return out;
    };
    if move_kind.tries_all_exits() {
        for dir in ALL_EXITS7 {
            out.extend_from(&store.rooms_at(pos + dir.offset()));
        }
    } else {
        let offset = move_kind.direction().map(|d| d.offset()).unwrap_or_default();
        out.extend_from(&store.rooms_at(pos + offset));
    }
    out
}

/// Everything reachable from one hypothesis end for a per-path validation:
/// forward exits, reverse exits, and the expected coordinate.
fn adjacent_rooms(store: &RoomStore, here: RoomId, move_kind: MoveKind) -> RoomIdSet {
    let mut out = forward_rooms(store, here, move_kind);
    out.extend_from(&reverse_rooms(store, here, move_kind));
    out.extend_from(&coordinate_rooms(store, here, move_kind));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_map::Room;
    use wayfarer_map::event::observed_event;
    use wayfarer_map::room::{RoomStatus, Terrain};
    use wayfarer_map::types::{Coordinate, ExitDirection};

    fn permanent_room(
        store: &mut RoomStore,
        name: &str,
        desc: &str,
        terrain: Terrain,
        pos: Coordinate,
    ) -> RoomId {
        store.insert_room(Room {
            name: name.to_owned(),
            static_desc: desc.to_owned(),
            terrain,
            position: pos,
            status: RoomStatus::Permanent,
            ..Room::default()
        })
    }

    fn two_room_map() -> (RoomStore, RoomId, RoomId) {
        let mut store = RoomStore::new();
        let a = permanent_room(
            &mut store,
            "Gatehouse",
            "A squat stone gatehouse.",
            Terrain::City,
            Coordinate::new(0, 0, 0),
        );
        let b = permanent_room(
            &mut store,
            "Courtyard",
            "A wide cobbled courtyard.",
            Terrain::City,
            Coordinate::new(0, 1, 0),
        );
        store.add_exit(a, ExitDirection::North, b);
        (store, a, b)
    }

    #[test]
    fn approved_move_follows_recorded_exit() {
        let (mut store, a, b) = two_room_map();
        let mut machine = PathMachine::new(PathConfig::default());
        machine.set_current_room(&mut store, a);

        let event = observed_event(
            MoveKind::North,
            "Courtyard",
            "A wide cobbled courtyard.",
            Terrain::City,
        );
        let out = machine.on_event(&mut store, &event);

        assert_eq!(out.state, PathState::Approved);
        assert_eq!(out.best_room, Some(b));
    }

    #[test]
    fn approved_mismatch_drops_to_hypotheses() {
        let (mut store, a, _b) = two_room_map();
        // A second plausible destination so the tick cannot settle.
        permanent_room(
            &mut store,
            "Granary",
            "Sacks of grain.",
            Terrain::City,
            Coordinate::new(1, 1, 0),
        );
        permanent_room(
            &mut store,
            "Granary",
            "Sacks of grain.",
            Terrain::City,
            Coordinate::new(-1, 1, 0),
        );
        let mut machine = PathMachine::new(PathConfig::default());
        machine.set_current_room(&mut store, a);

        let event = observed_event(MoveKind::North, "Granary", "Sacks of grain.", Terrain::City);
        let out = machine.on_event(&mut store, &event);
        assert_eq!(out.state, PathState::Experimenting);
        assert!(machine.live_paths() > 1);
    }

    #[test]
    fn stair_fallback_matches_one_level_off() {
        let mut store = RoomStore::new();
        let a = permanent_room(
            &mut store,
            "Landing",
            "A narrow landing.",
            Terrain::Indoors,
            Coordinate::new(0, 0, 0),
        );
        // The destination is mapped one level below the expected spot.
        let b = permanent_room(
            &mut store,
            "Cellar Stairs",
            "Steps descend into the dark.",
            Terrain::Indoors,
            Coordinate::new(0, 1, -1),
        );
        let mut machine = PathMachine::new(PathConfig::default());
        machine.set_current_room(&mut store, a);

        let event = observed_event(
            MoveKind::North,
            "Cellar Stairs",
            "Steps descend into the dark.",
            Terrain::Indoors,
        );
        let out = machine.on_event(&mut store, &event);
        assert_eq!(out.state, PathState::Approved);
        assert_eq!(out.best_room, Some(b));
    }

    #[test]
    fn syncing_finds_unique_room_by_text() {
        let (mut store, _a, b) = two_room_map();
        let mut machine = PathMachine::new(PathConfig::default());
        assert_eq!(machine.state(), PathState::Syncing);

        let event = observed_event(
            MoveKind::Look,
            "Courtyard",
            "A wide cobbled courtyard.",
            Terrain::City,
        );
        let out = machine.on_event(&mut store, &event);
        assert_eq!(out.state, PathState::Approved);
        assert_eq!(out.best_room, Some(b));
        assert_eq!(machine.outstanding_holds(), 0);
    }

    #[test]
    fn release_all_paths_is_safe_mid_experimenting() {
        let (mut store, a, _b) = two_room_map();
        permanent_room(
            &mut store,
            "Granary",
            "Sacks of grain.",
            Terrain::City,
            Coordinate::new(1, 1, 0),
        );
        permanent_room(
            &mut store,
            "Granary",
            "Sacks of grain.",
            Terrain::City,
            Coordinate::new(-1, 1, 0),
        );
        let mut machine = PathMachine::new(PathConfig::default());
        machine.set_current_room(&mut store, a);
        let event = observed_event(MoveKind::North, "Granary", "Sacks of grain.", Terrain::City);
        let out = machine.on_event(&mut store, &event);
        assert_eq!(out.state, PathState::Experimenting);

        machine.release_all_paths(&mut store);
        assert_eq!(machine.state(), PathState::Syncing);
        assert_eq!(machine.live_paths(), 0);
        assert_eq!(machine.outstanding_holds(), 0);
    }
}
