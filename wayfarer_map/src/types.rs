// Core value types shared across the map crates.
//
// Defines grid coordinates (`Coordinate`), axis-aligned boxes (`Bounds`),
// the three room identifier types, exit directions with their unit offsets,
// and the small sorted room-id set used by exits and the spatial index.
//
// `RoomId` is a dense arena index into the room store — it is never a
// pointer and may be renumbered on reload, which is why the stable
// `ExternalRoomId` exists alongside it. `ServerRoomId` is reported by the
// remote game and may be absent entirely (darkness, fog).
//
// See also: `room.rs` for the `Room` entity these ids refer to,
// `spatial.rs` for the coordinate-keyed index built on `Coordinate`.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial primitives
// ---------------------------------------------------------------------------

/// A position on the map grid.
///
/// Right-handed ENU axes: x = east, y = north, z = up. One unit is one room.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coordinate {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// True for the all-zero coordinate, which doubles as "no offset".
    pub fn is_origin(self) -> bool {
        self.x == 0 && self.y == 0 && self.z == 0
    }

    /// Euclidean distance between two coordinates.
    pub fn distance(self, other: Self) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        let dz = f64::from(self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl std::ops::Add for Coordinate {
    type Output = Coordinate;
    fn add(self, rhs: Coordinate) -> Coordinate {
        Coordinate::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Coordinate {
    type Output = Coordinate;
    fn sub(self, rhs: Coordinate) -> Coordinate {
        Coordinate::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// An inclusive axis-aligned box. Invariant: `min <= max` componentwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Coordinate,
    pub max: Coordinate,
}

impl Bounds {
    /// A degenerate box covering exactly one coordinate.
    pub fn at(coord: Coordinate) -> Self {
        Self {
            min: coord,
            max: coord,
        }
    }

    /// Inclusive containment test.
    pub fn contains(&self, coord: Coordinate) -> bool {
        coord.x >= self.min.x
            && coord.x <= self.max.x
            && coord.y >= self.min.y
            && coord.y <= self.max.y
            && coord.z >= self.min.z
            && coord.z <= self.max.z
    }

    /// Grow the box so it contains `coord`.
    pub fn extend_to(&mut self, coord: Coordinate) {
        self.min.x = self.min.x.min(coord.x);
        self.min.y = self.min.y.min(coord.y);
        self.min.z = self.min.z.min(coord.z);
        self.max.x = self.max.x.max(coord.x);
        self.max.y = self.max.y.max(coord.y);
        self.max.z = self.max.z.max(coord.z);
    }
}

// ---------------------------------------------------------------------------
// Room identifiers
// ---------------------------------------------------------------------------

/// Dense, process-local index into the room store arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub u32);

impl RoomId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable identifier that survives save/reload; internal ids may be
/// renumbered, external ids may not. Zero means "not yet assigned".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExternalRoomId(pub u32);

/// Identifier reported directly by the remote game, when it reports one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerRoomId(pub u64);

// ---------------------------------------------------------------------------
// Exit directions
// ---------------------------------------------------------------------------

/// The seven exit slots of a room. `Unknown` covers portals, one-way drops,
/// and anything else the game reports without a compass direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExitDirection {
    North,
    South,
    East,
    West,
    Up,
    Down,
    Unknown,
}

/// The six compass/vertical directions, excluding `Unknown`.
pub const ALL_DIRECTIONS6: [ExitDirection; 6] = [
    ExitDirection::North,
    ExitDirection::South,
    ExitDirection::East,
    ExitDirection::West,
    ExitDirection::Up,
    ExitDirection::Down,
];

/// All seven exit slots.
pub const ALL_EXITS7: [ExitDirection; 7] = [
    ExitDirection::North,
    ExitDirection::South,
    ExitDirection::East,
    ExitDirection::West,
    ExitDirection::Up,
    ExitDirection::Down,
    ExitDirection::Unknown,
];

impl ExitDirection {
    pub const NUM: usize = 7;

    pub fn index(self) -> usize {
        self as usize
    }

    /// The reverse direction. `Unknown` is its own reverse.
    pub fn opposite(self) -> ExitDirection {
        match self {
            ExitDirection::North => ExitDirection::South,
            ExitDirection::South => ExitDirection::North,
            ExitDirection::East => ExitDirection::West,
            ExitDirection::West => ExitDirection::East,
            ExitDirection::Up => ExitDirection::Down,
            ExitDirection::Down => ExitDirection::Up,
            ExitDirection::Unknown => ExitDirection::Unknown,
        }
    }

    /// Unit offset a move in this direction is expected to produce.
    /// `Unknown` has no expected offset.
    pub const fn offset(self) -> Coordinate {
        match self {
            ExitDirection::North => Coordinate::new(0, 1, 0),
            ExitDirection::South => Coordinate::new(0, -1, 0),
            ExitDirection::East => Coordinate::new(1, 0, 0),
            ExitDirection::West => Coordinate::new(-1, 0, 0),
            ExitDirection::Up => Coordinate::new(0, 0, 1),
            ExitDirection::Down => Coordinate::new(0, 0, -1),
            ExitDirection::Unknown => Coordinate::new(0, 0, 0),
        }
    }
}

/// The movement command the player attempted, as reported by the upstream
/// parser alongside each observation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveKind {
    North,
    South,
    East,
    West,
    Up,
    Down,
    /// Moved through a portal or otherwise without a compass direction.
    Unknown,
    /// Looked at the current room without moving.
    Look,
    /// Fled in a random direction.
    Flee,
    /// Scouted an adjacent room without entering it.
    Scout,
    /// No movement command was recognized for this observation.
    #[default]
    None,
}

impl MoveKind {
    /// The exit slot this command corresponds to, for the seven directional
    /// values. `Look`/`Flee`/`Scout`/`None` have no single direction.
    pub fn direction(self) -> Option<ExitDirection> {
        match self {
            MoveKind::North => Some(ExitDirection::North),
            MoveKind::South => Some(ExitDirection::South),
            MoveKind::East => Some(ExitDirection::East),
            MoveKind::West => Some(ExitDirection::West),
            MoveKind::Up => Some(ExitDirection::Up),
            MoveKind::Down => Some(ExitDirection::Down),
            MoveKind::Unknown => Some(ExitDirection::Unknown),
            MoveKind::Look | MoveKind::Flee | MoveKind::Scout | MoveKind::None => None,
        }
    }

    /// True for the commands where any exit of the current room is a
    /// plausible destination (fled, scouted, or no command recognized).
    pub fn tries_all_exits(self) -> bool {
        matches!(self, MoveKind::Flee | MoveKind::Scout | MoveKind::None)
    }
}

// ---------------------------------------------------------------------------
// Small room-id sets
// ---------------------------------------------------------------------------

/// A sorted set of room ids optimized for the common one-element case.
///
/// Used for per-coordinate occupancy (several rooms may legally share a
/// coordinate) and for exit in/out links.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomIdSet {
    ids: SmallVec<[RoomId; 2]>,
}

impl RoomIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an id. Returns false if it was already present.
    pub fn insert(&mut self, id: RoomId) -> bool {
        match self.ids.binary_search(&id) {
            Ok(_) => false,
            Err(pos) => {
                self.ids.insert(pos, id);
                true
            }
        }
    }

    /// Remove an id. Returns false if it was not present.
    pub fn remove(&mut self, id: RoomId) -> bool {
        match self.ids.binary_search(&id) {
            Ok(pos) => {
                self.ids.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn contains(&self, id: RoomId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    pub fn first(&self) -> Option<RoomId> {
        self.ids.first().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RoomId> + '_ {
        self.ids.iter().copied()
    }

    pub fn extend_from(&mut self, other: &RoomIdSet) {
        for id in other.iter() {
            self.insert(id);
        }
    }
}

impl FromIterator<RoomId> for RoomIdSet {
    fn from_iter<T: IntoIterator<Item = RoomId>>(iter: T) -> Self {
        let mut set = RoomIdSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_add_and_distance() {
        let a = Coordinate::new(1, 2, 3);
        let b = a + Coordinate::new(0, 1, 0);
        assert_eq!(b, Coordinate::new(1, 3, 3));
        assert_eq!(a.distance(b), 1.0);
        assert_eq!(a.distance(a), 0.0);
    }

    #[test]
    fn bounds_contains_is_inclusive() {
        let mut b = Bounds::at(Coordinate::new(0, 0, 0));
        b.extend_to(Coordinate::new(3, -2, 1));
        assert!(b.contains(Coordinate::new(3, -2, 1)));
        assert!(b.contains(Coordinate::new(0, 0, 0)));
        assert!(b.contains(Coordinate::new(2, -1, 0)));
        assert!(!b.contains(Coordinate::new(4, 0, 0)));
    }

    #[test]
    fn direction_offsets_are_unit_vectors() {
        for dir in ALL_DIRECTIONS6 {
            let o = dir.offset();
            assert_eq!(o.x.abs() + o.y.abs() + o.z.abs(), 1, "{dir:?}");
            assert_eq!(dir.opposite().offset(), Coordinate::new(-o.x, -o.y, -o.z));
        }
        assert!(ExitDirection::Unknown.offset().is_origin());
    }

    #[test]
    fn move_kind_directions() {
        assert_eq!(MoveKind::North.direction(), Some(ExitDirection::North));
        assert_eq!(MoveKind::Look.direction(), None);
        assert!(MoveKind::Flee.tries_all_exits());
        assert!(!MoveKind::North.tries_all_exits());
    }

    #[test]
    fn room_id_set_stays_sorted_and_unique() {
        let mut set = RoomIdSet::new();
        assert!(set.insert(RoomId(5)));
        assert!(set.insert(RoomId(1)));
        assert!(!set.insert(RoomId(5)));
        assert_eq!(set.len(), 2);
        assert_eq!(set.first(), Some(RoomId(1)));
        assert!(set.remove(RoomId(1)));
        assert!(!set.remove(RoomId(1)));
        assert!(set.contains(RoomId(5)));
    }
}
