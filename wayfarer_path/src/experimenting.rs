// The forking strategies: how candidate rooms become child hypotheses.
//
// `Experimenting` is the shared core. During one tick it forks children off
// the live paths ("short paths"), tracking the single best fork and the
// runner-up, and `evaluate` then applies the tie-break rule that decides
// which forks survive:
//   - leftover short paths that produced no fork are dead ends, denied;
//   - a best fork clearly ahead of the runner-up (by ratio or margin) wins
//     outright and every other fork is denied;
//   - otherwise the best survives along with every runner-up that is not
//     vastly less probable (`max_paths / num_forked` scaling) and not an
//     equal-probability duplicate of the best resolving to the same room.
//     Equal-probability duplicates must go or no unique best could ever
//     emerge.
//
// The two concrete strategies differ only in which rooms they offer:
// `Crossover` offers every candidate to every live short path at once;
// `OneByOne` validates candidates against one specific path with an exact
// comparison, releasing non-matching rooms through the arbiter instead of
// forking.
//
// See also: `syncing.rs` for the unscored resync strategy.

use crate::arbiter::RoomLockArbiter;
use crate::config::PathConfig;
use crate::path::{PathArena, PathId};
use wayfarer_map::RoomStore;
use wayfarer_map::compare::{ComparisonResult, compare};
use wayfarer_map::event::ParseEvent;
use wayfarer_map::types::{ExitDirection, RoomId};

pub struct Experimenting {
    dir: ExitDirection,
    short_paths: Vec<PathId>,
    paths: Vec<PathId>,
    best: Option<PathId>,
    second: Option<PathId>,
    num_forked: f64,
}

impl Experimenting {
    pub fn new(short_paths: Vec<PathId>, dir: ExitDirection) -> Self {
        Self {
            dir,
            short_paths,
            paths: Vec::new(),
            best: None,
            second: None,
            num_forked: 0.0,
        }
    }

    /// Fork `candidate` off `parent` and fold the result into the running
    /// best/second tracking.
    fn augment(
        &mut self,
        parent: PathId,
        candidate: RoomId,
        arena: &mut PathArena,
        config: &PathConfig,
        arbiter: &mut RoomLockArbiter,
        store: &RoomStore,
    ) {
        let Some(parent_room) = arena.room(parent) else {
            return;
        };
        let Some(expected) = store.get(parent_room).map(|r| r.position + self.dir.offset())
        else {
            return;
        };
        let Some(working) =
            arena.fork(parent, candidate, expected, self.dir, config, arbiter, store)
        else {
            return;
        };
        match self.best {
            None => self.best = Some(working),
            Some(best) if arena.prob(working) > arena.prob(best) => {
                self.paths.push(best);
                self.second = Some(best);
                self.best = Some(working);
            }
            Some(_) => {
                if self
                    .second
                    .is_none_or(|second| arena.prob(working) > arena.prob(second))
                {
                    self.second = Some(working);
                }
                self.paths.push(working);
            }
        }
        self.num_forked += 1.0;
    }

    /// Apply the tie-break rule and return the surviving paths, best first.
    pub fn evaluate(
        mut self,
        arena: &mut PathArena,
        config: &PathConfig,
        store: &mut RoomStore,
        arbiter: &mut RoomLockArbiter,
    ) -> Vec<PathId> {
        for short in self.short_paths.drain(..) {
            if !arena.has_children(short) {
                arena.deny(short, store, arbiter);
            }
        }

        let Some(best) = self.best else {
            return self.paths;
        };
        let best_prob = arena.prob(best);
        let confident = match self.second {
            None => true,
            Some(second) => {
                best_prob > arena.prob(second) * config.accept_best_relative
                    || best_prob > arena.prob(second) + config.accept_best_absolute
            }
        };

        if confident {
            for path in self.paths.drain(..) {
                arena.deny(path, store, arbiter);
            }
            self.paths.push(best);
            return self.paths;
        }

        let mut survivors = vec![best];
        for path in self.paths.drain(..) {
            let prob = arena.prob(path);
            let too_unlikely = best_prob > prob * f64::from(config.max_paths) / self.num_forked;
            let duplicate_of_best =
                best_prob <= prob && arena.room(best) == arena.room(path);
            if too_unlikely || duplicate_of_best {
                arena.deny(path, store, arbiter);
            } else {
                survivors.push(path);
            }
        }
        survivors
    }
}

/// Offers every candidate to every live short path, used when several
/// hypotheses may have converged on overlapping destinations.
pub struct Crossover {
    inner: Experimenting,
}

impl Crossover {
    pub fn new(short_paths: Vec<PathId>, dir: ExitDirection) -> Self {
        Self {
            inner: Experimenting::new(short_paths, dir),
        }
    }

    pub fn offer(
        &mut self,
        candidate: RoomId,
        arena: &mut PathArena,
        config: &PathConfig,
        arbiter: &mut RoomLockArbiter,
        store: &RoomStore,
    ) {
        for i in 0..self.inner.short_paths.len() {
            let parent = self.inner.short_paths[i];
            self.inner
                .augment(parent, candidate, arena, config, arbiter, store);
        }
    }

    pub fn evaluate(
        self,
        arena: &mut PathArena,
        config: &PathConfig,
        store: &mut RoomStore,
        arbiter: &mut RoomLockArbiter,
    ) -> Vec<PathId> {
        self.inner.evaluate(arena, config, store, arbiter)
    }
}

/// Validates specific expected destinations against one path at a time with
/// an exact comparison. Candidates that fail the comparison are released
/// through the arbiter (hold-then-release, so a provisional room nobody
/// else holds is reclaimed) rather than forked.
pub struct OneByOne<'a> {
    inner: Experimenting,
    event: &'a ParseEvent,
}

impl<'a> OneByOne<'a> {
    pub fn new(dir: ExitDirection, event: &'a ParseEvent) -> Self {
        Self {
            inner: Experimenting::new(Vec::new(), dir),
            event,
        }
    }

    /// Make `path` the target of subsequent offers.
    pub fn add_path(&mut self, path: PathId) {
        self.inner.short_paths.push(path);
    }

    pub fn offer(
        &mut self,
        candidate: RoomId,
        arena: &mut PathArena,
        config: &PathConfig,
        arbiter: &mut RoomLockArbiter,
        store: &mut RoomStore,
    ) {
        let matches = store
            .get(candidate)
            .is_some_and(|room| {
                compare(room, self.event, config.matching_tolerance) == ComparisonResult::Equal
            });
        if matches {
            if let Some(&parent) = self.inner.short_paths.last() {
                self.inner
                    .augment(parent, candidate, arena, config, arbiter, store);
            }
        } else {
            // Hold-then-release instead of a bare release: if no hypothesis
            // holds this room, the pair reclaims a provisional room without
            // tripping the unheld-release check.
            arbiter.hold(candidate);
            arbiter.release(candidate, store);
        }
    }

    pub fn evaluate(
        self,
        arena: &mut PathArena,
        config: &PathConfig,
        store: &mut RoomStore,
        arbiter: &mut RoomLockArbiter,
    ) -> Vec<PathId> {
        self.inner.evaluate(arena, config, store, arbiter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_map::Room;
    use wayfarer_map::event::observed_event;
    use wayfarer_map::room::RoomStatus;
    use wayfarer_map::types::{Coordinate, MoveKind};

    fn permanent_room(store: &mut RoomStore, name: &str, x: i32, y: i32) -> RoomId {
        store.insert_room(Room {
            name: name.to_owned(),
            static_desc: format!("The {name}."),
            position: Coordinate::new(x, y, 0),
            status: RoomStatus::Permanent,
            ..Room::default()
        })
    }

    struct Fixture {
        store: RoomStore,
        arena: PathArena,
        arbiter: RoomLockArbiter,
        config: PathConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: RoomStore::new(),
                arena: PathArena::new(),
                arbiter: RoomLockArbiter::new(),
                config: PathConfig::default(),
            }
        }
    }

    #[test]
    fn single_candidate_wins_confidently() {
        let mut f = Fixture::new();
        let a = permanent_room(&mut f.store, "Gate", 0, 0);
        let b = permanent_room(&mut f.store, "Yard", 0, 1);
        let root = f.arena.new_root(a);

        let mut cross = Crossover::new(vec![root], ExitDirection::North);
        cross.offer(b, &mut f.arena, &f.config, &mut f.arbiter, &f.store);
        let survivors = cross.evaluate(&mut f.arena, &f.config, &mut f.store, &mut f.arbiter);

        assert_eq!(survivors.len(), 1);
        assert_eq!(f.arena.room(survivors[0]), Some(b));
        assert!(f.arena.prob(survivors[0]) > 1.0);
    }

    #[test]
    fn near_tied_candidates_both_survive() {
        let mut f = Fixture::new();
        let a = permanent_room(&mut f.store, "Gate", 0, 0);
        // Two distinct rooms at the same expected coordinate: identical
        // scores, no confident winner.
        let b1 = permanent_room(&mut f.store, "Yard", 0, 1);
        let b2 = f.store.insert_room(Room {
            name: "Yard".to_owned(),
            static_desc: "The Yard.".to_owned(),
            position: Coordinate::new(0, 1, 0),
            status: RoomStatus::Permanent,
            ..Room::default()
        });
        let root = f.arena.new_root(a);

        let mut cross = Crossover::new(vec![root], ExitDirection::North);
        cross.offer(b1, &mut f.arena, &f.config, &mut f.arbiter, &f.store);
        cross.offer(b2, &mut f.arena, &f.config, &mut f.arbiter, &f.store);
        let survivors = cross.evaluate(&mut f.arena, &f.config, &mut f.store, &mut f.arbiter);

        assert_eq!(survivors.len(), 2);
        let rooms: Vec<_> = survivors.iter().map(|&p| f.arena.room(p)).collect();
        assert!(rooms.contains(&Some(b1)));
        assert!(rooms.contains(&Some(b2)));
    }

    #[test]
    fn equal_probability_same_room_duplicates_are_pruned() {
        let mut f = Fixture::new();
        let a1 = permanent_room(&mut f.store, "Gate", 0, 0);
        let a2 = permanent_room(&mut f.store, "Gate", 2, 0);
        let b = permanent_room(&mut f.store, "Yard", 0, 1);
        let r1 = f.arena.new_root(a1);
        let r2 = f.arena.new_root(a2);

        // Both parents fork to the same candidate room. Force the two forks
        // to an exact probability tie: neither confidence rule can fire, and
        // only the same-room duplicate rule separates them.
        let mut exp = Experimenting::new(vec![r1, r2], ExitDirection::North);
        exp.augment(r1, b, &mut f.arena, &f.config, &mut f.arbiter, &f.store);
        exp.augment(r2, b, &mut f.arena, &f.config, &mut f.arbiter, &f.store);
        let best = exp.best.expect("two forks");
        let other = exp.paths[0];
        f.arena.set_prob(best, 5.0);
        f.arena.set_prob(other, 5.0);

        let survivors = exp.evaluate(&mut f.arena, &f.config, &mut f.store, &mut f.arbiter);
        assert_eq!(survivors, vec![best]);
        assert!(!f.arena.is_alive(other));
    }

    #[test]
    fn forkless_short_paths_are_denied() {
        let mut f = Fixture::new();
        let a = permanent_room(&mut f.store, "Gate", 0, 0);
        let root = f.arena.new_root(a);

        let cross = Crossover::new(vec![root], ExitDirection::North);
        let survivors = cross.evaluate(&mut f.arena, &f.config, &mut f.store, &mut f.arbiter);

        assert!(survivors.is_empty());
        assert!(!f.arena.is_alive(root));
        assert_eq!(f.arbiter.outstanding(), 0);
    }

    #[test]
    fn one_by_one_releases_non_matching_candidates() {
        let mut f = Fixture::new();
        let a = permanent_room(&mut f.store, "Gate", 0, 0);
        let b = permanent_room(&mut f.store, "Yard", 0, 1);
        let wrong = permanent_room(&mut f.store, "Cellar", 1, 1);
        let root = f.arena.new_root(a);

        let event = observed_event(MoveKind::North, "Yard", "The Yard.", Default::default());
        let mut one = OneByOne::new(ExitDirection::North, &event);
        one.add_path(root);
        one.offer(wrong, &mut f.arena, &f.config, &mut f.arbiter, &mut f.store);
        one.offer(b, &mut f.arena, &f.config, &mut f.arbiter, &mut f.store);
        let survivors = one.evaluate(&mut f.arena, &f.config, &mut f.store, &mut f.arbiter);

        assert_eq!(survivors.len(), 1);
        assert_eq!(f.arena.room(survivors[0]), Some(b));
        assert!(f.store.get(wrong).is_some());
    }

    #[test]
    fn one_by_one_reclaims_unheld_provisional_rejects() {
        let mut f = Fixture::new();
        let a = permanent_room(&mut f.store, "Gate", 0, 0);
        let root = f.arena.new_root(a);
        let event = observed_event(MoveKind::North, "Yard", "The Yard.", Default::default());
        let provisional = f
            .store
            .create_room(
                &observed_event(MoveKind::North, "Cellar", "The Cellar.", Default::default()),
                Coordinate::new(0, 1, 0),
            )
            .expect("created");

        let mut one = OneByOne::new(ExitDirection::North, &event);
        one.add_path(root);
        one.offer(provisional, &mut f.arena, &f.config, &mut f.arbiter, &mut f.store);

        assert!(f.store.get(provisional).is_none());
    }

    #[test]
    fn evaluate_is_deterministic() {
        let run = || {
            let mut f = Fixture::new();
            let a = permanent_room(&mut f.store, "Gate", 0, 0);
            let b1 = permanent_room(&mut f.store, "Yard", 0, 1);
            let b2 = permanent_room(&mut f.store, "Yard", 1, 1);
            let b3 = permanent_room(&mut f.store, "Yard", 4, 4);
            let root = f.arena.new_root(a);
            let mut cross = Crossover::new(vec![root], ExitDirection::North);
            for room in [b1, b2, b3] {
                cross.offer(room, &mut f.arena, &f.config, &mut f.arbiter, &f.store);
            }
            let survivors = cross.evaluate(&mut f.arena, &f.config, &mut f.store, &mut f.arbiter);
            survivors
                .iter()
                .map(|&p| (f.arena.room(p), f.arena.prob(p)))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
