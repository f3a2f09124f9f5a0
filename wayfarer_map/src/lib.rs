// Map model for the wayfarer mapper: rooms, observations, and the two
// indices the localization engine queries.
//
// Module map:
//   types     — coordinates, bounds, ids, directions, `RoomIdSet`
//   room      — `Room`, exits, and the room field enumerations
//   event     — `ParseEvent`, one tick's observation from the game
//   compare   — room-vs-observation matching verdicts
//   spatial   — per-z-plane quadtree over room positions
//   candidate — name/desc hash index for fast candidate lookup
//   store     — the arena owning rooms and keeping both indices consistent
//
// The path engine (the `wayfarer_path` crate) drives everything through
// `RoomStore` and never touches the indices directly.

pub mod candidate;
pub mod compare;
pub mod event;
pub mod room;
pub mod spatial;
pub mod store;
pub mod types;

pub use compare::{ComparisonResult, compare};
pub use event::ParseEvent;
pub use room::{Room, RoomStatus};
pub use store::{MapEdit, RoomStore};
pub use types::{Coordinate, ExitDirection, MoveKind, RoomId, RoomIdSet};
