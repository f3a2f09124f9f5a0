// Probabilistic room localization for the wayfarer mapper.
//
// Consumes one `ParseEvent` per tick from the upstream parser and decides
// where the player stands in the map owned by `wayfarer_map::RoomStore`,
// growing the map when exploration reaches unmapped ground.
//
// Module map:
//   config        — tuning parameters (empirical, JSON-loadable)
//   path          — the hypothesis arena (forking, approval, denial)
//   experimenting — the fork/prune strategies (Crossover, OneByOne)
//   syncing       — whole-map resynchronization
//   arbiter       — reference-counted room holds
//   machine       — the Approved/Experimenting/Syncing orchestrator
//
// Entry point: `PathMachine::on_event`.

pub mod arbiter;
pub mod config;
pub mod experimenting;
pub mod machine;
pub mod path;
pub mod syncing;

pub use arbiter::RoomLockArbiter;
pub use config::PathConfig;
pub use machine::{PathMachine, PathState, TickOutput};
pub use path::{PathArena, PathId};
