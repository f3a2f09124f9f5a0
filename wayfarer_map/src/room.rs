// Rooms and exits — the entities the indices and the path engine refer to.
//
// A `Room` is owned by the `RoomStore` (see `store.rs`) and referenced
// everywhere else only by `RoomId`. It carries the textual fields matched
// against observations (name, static desc, dynamic desc), the terrain and
// light enumerations, a grid position, and a fixed array of 7 exits.
//
// Rooms created provisionally by the path engine start as
// `RoomStatus::Temporary` and are reclaimed by the store if the last
// hypothesis hold on them is released; an accepted hypothesis promotes them
// to `Permanent`.
//
// Invariant (enforced by the store, not here): an exit's in/out sets never
// reference a nonexistent `RoomId`.

use crate::types::{ALL_EXITS7, Coordinate, ExitDirection, ExternalRoomId, RoomIdSet, ServerRoomId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Room field enumerations
// ---------------------------------------------------------------------------

/// Terrain reported in the game's prompt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    #[default]
    Undefined,
    Indoors,
    City,
    Field,
    Forest,
    Hills,
    Mountains,
    ShallowWater,
    Water,
    Rapids,
    Underwater,
    Road,
    Brush,
    Tunnel,
    Cavern,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Light {
    #[default]
    Undefined,
    Dark,
    Lit,
}

/// Whether direct sunlight in this room is lethal to light-sensitive
/// characters. Set from connected-room observations of adjacent rooms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sundeath {
    #[default]
    Undefined,
    Sundeath,
    NoSundeath,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    #[default]
    Undefined,
    Good,
    Neutral,
    Evil,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ridable {
    #[default]
    Undefined,
    Ridable,
    NotRidable,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Portable {
    #[default]
    Undefined,
    Portable,
    NotPortable,
}

/// Lifecycle of a room inside the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    /// Created provisionally by the path engine; reclaimed when unheld.
    #[default]
    Temporary,
    /// Part of the accepted map.
    Permanent,
}

// ---------------------------------------------------------------------------
// Exits
// ---------------------------------------------------------------------------

/// Per-exit flag bits as reported by the game.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitFlags(pub u8);

impl ExitFlags {
    pub const EXIT: u8 = 1 << 0;
    pub const DOOR: u8 = 1 << 1;
    pub const ROAD: u8 = 1 << 2;
    pub const CLIMB: u8 = 1 << 3;
    /// Exclude this exit from observation matching (mapper-maintained).
    pub const NO_MATCH: u8 = 1 << 4;

    pub fn is_exit(self) -> bool {
        self.0 & Self::EXIT != 0
    }
    pub fn is_door(self) -> bool {
        self.0 & Self::DOOR != 0
    }
    pub fn is_road(self) -> bool {
        self.0 & Self::ROAD != 0
    }
    pub fn is_climb(self) -> bool {
        self.0 & Self::CLIMB != 0
    }
    pub fn is_no_match(self) -> bool {
        self.0 & Self::NO_MATCH != 0
    }
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn set(&mut self, bit: u8) {
        self.0 |= bit;
    }
}

/// Door-specific flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorFlags(pub u8);

impl DoorFlags {
    pub const HIDDEN: u8 = 1 << 0;

    pub fn is_hidden(self) -> bool {
        self.0 & Self::HIDDEN != 0
    }
}

/// One of a room's seven exit slots.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exit {
    pub flags: ExitFlags,
    pub door_flags: DoorFlags,
    pub door_name: Option<String>,
    /// Rooms this exit leads to. Usually zero or one; more means the map
    /// recorded an ambiguous or random exit.
    pub outgoing: RoomIdSet,
    /// Rooms whose exits lead here through this side of the room: an exit
    /// `from --north--> here` registers `from` under the south slot.
    /// Store-maintained reverse links.
    pub incoming: RoomIdSet,
}

impl Exit {
    pub fn out_is_empty(&self) -> bool {
        self.outgoing.is_empty()
    }

    pub fn out_is_unique(&self) -> bool {
        self.outgoing.len() == 1
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// One mapped location.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    /// The unchanging part of the room description, used for matching.
    pub static_desc: String,
    /// The transient part (mobs, items, weather). Stored, never matched.
    pub dynamic_desc: String,
    pub terrain: Terrain,
    pub light: Light,
    pub sundeath: Sundeath,
    pub alignment: Alignment,
    pub ridable: Ridable,
    pub portable: Portable,
    pub position: Coordinate,
    pub status: RoomStatus,
    pub external_id: ExternalRoomId,
    pub server_id: Option<ServerRoomId>,
    pub exits: [Exit; ExitDirection::NUM],
}

impl Room {
    pub fn exit(&self, dir: ExitDirection) -> &Exit {
        &self.exits[dir.index()]
    }

    pub fn exit_mut(&mut self, dir: ExitDirection) -> &mut Exit {
        &mut self.exits[dir.index()]
    }

    pub fn exits(&self) -> impl Iterator<Item = (ExitDirection, &Exit)> {
        ALL_EXITS7.iter().map(move |&dir| (dir, self.exit(dir)))
    }

    pub fn is_temporary(&self) -> bool {
        self.status == RoomStatus::Temporary
    }

    /// True for rooms the user placed by hand with no observed fields yet.
    pub fn is_blank(&self) -> bool {
        self.name.is_empty() && self.static_desc.is_empty() && self.terrain == Terrain::Undefined
    }

    /// Total number of outgoing connections across all exits.
    pub fn connection_count(&self) -> usize {
        self.exits.iter().map(|e| e.outgoing.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RoomId;

    #[test]
    fn exit_flags_bits() {
        let mut flags = ExitFlags::default();
        assert!(flags.is_empty());
        flags.set(ExitFlags::EXIT);
        flags.set(ExitFlags::DOOR);
        assert!(flags.is_exit());
        assert!(flags.is_door());
        assert!(!flags.is_climb());
    }

    #[test]
    fn room_exit_slots_are_independent() {
        let mut room = Room::default();
        room.exit_mut(ExitDirection::North)
            .outgoing
            .insert(RoomId(7));
        assert!(room.exit(ExitDirection::North).out_is_unique());
        assert!(room.exit(ExitDirection::South).out_is_empty());
        assert_eq!(room.connection_count(), 1);
    }

    #[test]
    fn blank_room_detection() {
        let mut room = Room::default();
        assert!(room.is_blank());
        room.name = "A dusty crossroads".to_owned();
        assert!(!room.is_blank());
    }
}
