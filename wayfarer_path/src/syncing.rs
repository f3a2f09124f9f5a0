// The resync strategy: rebuild hypotheses from nothing.
//
// When confidence has collapsed there is no parent hypothesis to fork from,
// so scoring is meaningless. Every offered room becomes an equally-weighted
// child of one synthetic root (probability 1/n, only so later ticks have
// something to order by). Exceeding `max_paths` means the observation was
// too generic to narrow anything down: everything is denied and the engine
// stays lost until a more specific observation arrives.

use crate::arbiter::RoomLockArbiter;
use crate::config::PathConfig;
use crate::path::{PathArena, PathId};
use wayfarer_map::RoomStore;
use wayfarer_map::types::RoomId;

pub struct Syncing {
    root: PathId,
    paths: Vec<PathId>,
    num_paths: u32,
    overflowed: bool,
}

impl Syncing {
    pub fn new(arena: &mut PathArena) -> Self {
        Self {
            root: arena.new_synthetic_root(),
            paths: Vec::new(),
            num_paths: 0,
            overflowed: false,
        }
    }

    pub fn offer(
        &mut self,
        room: RoomId,
        arena: &mut PathArena,
        config: &PathConfig,
        store: &mut RoomStore,
        arbiter: &mut RoomLockArbiter,
    ) {
        self.num_paths += 1;
        if self.num_paths > config.max_paths {
            if !self.overflowed {
                log::info!(
                    "resync: more than {} candidates, staying lost",
                    config.max_paths
                );
                self.overflowed = true;
            }
            for path in self.paths.drain(..) {
                arena.deny(path, store, arbiter);
            }
            return;
        }
        let prob = 1.0 / f64::from(self.num_paths);
        let child = arena.add_unscored_child(self.root, room, prob, arbiter);
        self.paths.push(child);
    }

    /// The surviving candidate set. An empty one (nothing offered, or
    /// overflow) also retires the synthetic root.
    pub fn evaluate(
        self,
        arena: &mut PathArena,
        store: &mut RoomStore,
        arbiter: &mut RoomLockArbiter,
    ) -> Vec<PathId> {
        // On overflow the root already died with its last child.
        if self.paths.is_empty() && arena.is_alive(self.root) {
            arena.deny(self.root, store, arbiter);
        }
        self.paths
    }
}
