// Observations — one tick's worth of textual room data from the game.
//
// `ParseEvent` is the sole input type the path engine consumes. It carries
// the movement command attempted, the textual room fields, and three packed
// flag words: perceived exits, the prompt (terrain + light), and
// connected-room sunlight hints. Each flag word has a "valid" bit meaning
// "this observation actually reported the field" — a blank observation
// (darkness, blindness) leaves fields unobserved rather than empty.
//
// `num_skipped` is derived at construction: how many of the three key
// matching fields {name, static desc, terrain} were unobservable this tick.
// The candidate index (`candidate.rs`) and the orchestrator's resync logic
// both key off it.

use crate::room::Terrain;
use crate::types::{ExitDirection, MoveKind, ServerRoomId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Packed observation flags
// ---------------------------------------------------------------------------

/// Per-direction exit observations: 4 bits (exit/door/road/climb) for each
/// of the six compass/vertical directions, plus a valid bit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitsFlags(u32);

impl ExitsFlags {
    const EXIT: u32 = 1 << 0;
    const DOOR: u32 = 1 << 1;
    const ROAD: u32 = 1 << 2;
    const CLIMB: u32 = 1 << 3;
    const VALID: u32 = 1 << 31;

    fn shift(dir: ExitDirection) -> u32 {
        debug_assert!(dir != ExitDirection::Unknown);
        (dir.index() as u32) * 4
    }

    /// Mark this word as carrying a real observation.
    pub fn set_valid(&mut self) {
        self.0 |= Self::VALID;
    }

    pub fn is_valid(self) -> bool {
        self.0 & Self::VALID != 0
    }

    pub fn set_exit(&mut self, dir: ExitDirection) {
        self.0 |= Self::EXIT << Self::shift(dir);
    }

    pub fn set_door(&mut self, dir: ExitDirection) {
        self.0 |= Self::DOOR << Self::shift(dir);
    }

    pub fn set_road(&mut self, dir: ExitDirection) {
        self.0 |= Self::ROAD << Self::shift(dir);
    }

    pub fn set_climb(&mut self, dir: ExitDirection) {
        self.0 |= Self::CLIMB << Self::shift(dir);
    }

    pub fn is_exit(self, dir: ExitDirection) -> bool {
        self.0 & (Self::EXIT << Self::shift(dir)) != 0
    }

    pub fn is_door(self, dir: ExitDirection) -> bool {
        self.0 & (Self::DOOR << Self::shift(dir)) != 0
    }

    pub fn is_road(self, dir: ExitDirection) -> bool {
        self.0 & (Self::ROAD << Self::shift(dir)) != 0
    }

    pub fn is_climb(self, dir: ExitDirection) -> bool {
        self.0 & (Self::CLIMB << Self::shift(dir)) != 0
    }
}

/// Prompt observations: terrain plus lighting, with a valid bit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptFlags {
    terrain: Terrain,
    lit: bool,
    dark: bool,
    valid: bool,
}

impl PromptFlags {
    pub fn observed(terrain: Terrain) -> Self {
        Self {
            terrain,
            lit: false,
            dark: false,
            valid: true,
        }
    }

    pub fn with_lit(mut self) -> Self {
        self.lit = true;
        self.dark = false;
        self
    }

    pub fn with_dark(mut self) -> Self {
        self.dark = true;
        self.lit = false;
        self
    }

    pub fn is_valid(self) -> bool {
        self.valid
    }

    /// The observed terrain, or `None` if the prompt was not seen.
    pub fn terrain(self) -> Option<Terrain> {
        self.valid.then_some(self.terrain)
    }

    pub fn is_lit(self) -> bool {
        self.valid && self.lit
    }

    pub fn is_dark(self) -> bool {
        self.valid && self.dark
    }
}

/// Per-direction sunlight level seen through an exit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectionalLight {
    None,
    DirectSun,
    IndirectSun,
}

/// Connected-room observations: sunlight hints through each of the six
/// directions, plus a valid bit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedRoomFlags {
    light: [Option<DirectionalLight>; 6],
    valid: bool,
}

impl ConnectedRoomFlags {
    pub fn observed() -> Self {
        Self {
            light: [None; 6],
            valid: true,
        }
    }

    pub fn set_light(&mut self, dir: ExitDirection, light: DirectionalLight) {
        debug_assert!(dir != ExitDirection::Unknown);
        self.light[dir.index()] = Some(light);
    }

    pub fn is_valid(self) -> bool {
        self.valid
    }

    pub fn light(self, dir: ExitDirection) -> Option<DirectionalLight> {
        if !self.valid || dir == ExitDirection::Unknown {
            return None;
        }
        self.light[dir.index()]
    }
}

// ---------------------------------------------------------------------------
// ParseEvent
// ---------------------------------------------------------------------------

/// One observation extracted from the game's output.
///
/// `name` and `static_desc` are `None` when the field was unobservable
/// (as opposed to genuinely empty); terrain observability is carried by
/// the prompt valid bit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseEvent {
    move_kind: MoveKind,
    name: Option<String>,
    dynamic_desc: Option<String>,
    static_desc: Option<String>,
    exits_flags: ExitsFlags,
    prompt_flags: PromptFlags,
    connected_flags: ConnectedRoomFlags,
    server_id: Option<ServerRoomId>,
    num_skipped: u32,
}

impl ParseEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        move_kind: MoveKind,
        name: Option<String>,
        dynamic_desc: Option<String>,
        static_desc: Option<String>,
        exits_flags: ExitsFlags,
        prompt_flags: PromptFlags,
        connected_flags: ConnectedRoomFlags,
        server_id: Option<ServerRoomId>,
    ) -> Self {
        let mut skipped = 0;
        if name.is_none() {
            skipped += 1;
        }
        if static_desc.is_none() {
            skipped += 1;
        }
        if !prompt_flags.is_valid() {
            skipped += 1;
        }
        Self {
            move_kind,
            name,
            dynamic_desc,
            static_desc,
            exits_flags,
            prompt_flags,
            connected_flags,
            server_id,
            num_skipped: skipped,
        }
    }

    /// A fully blank observation: the player saw nothing at all.
    pub fn blank(move_kind: MoveKind) -> Self {
        Self::new(
            move_kind,
            None,
            None,
            None,
            ExitsFlags::default(),
            PromptFlags::default(),
            ConnectedRoomFlags::default(),
            None,
        )
    }

    pub fn move_kind(&self) -> MoveKind {
        self.move_kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn dynamic_desc(&self) -> Option<&str> {
        self.dynamic_desc.as_deref()
    }

    pub fn static_desc(&self) -> Option<&str> {
        self.static_desc.as_deref()
    }

    pub fn exits_flags(&self) -> ExitsFlags {
        self.exits_flags
    }

    pub fn prompt_flags(&self) -> PromptFlags {
        self.prompt_flags
    }

    pub fn connected_flags(&self) -> ConnectedRoomFlags {
        self.connected_flags
    }

    pub fn terrain(&self) -> Option<Terrain> {
        self.prompt_flags.terrain()
    }

    pub fn server_id(&self) -> Option<ServerRoomId> {
        self.server_id
    }

    /// How many of {name, static desc, terrain} were unobservable (0–3).
    pub fn num_skipped(&self) -> u32 {
        self.num_skipped
    }
}

/// Convenience builder for the common case of a fully observed movement.
pub fn observed_event(move_kind: MoveKind, name: &str, static_desc: &str, terrain: Terrain) -> ParseEvent {
    ParseEvent::new(
        move_kind,
        Some(name.to_owned()),
        None,
        Some(static_desc.to_owned()),
        ExitsFlags::default(),
        PromptFlags::observed(terrain),
        ConnectedRoomFlags::default(),
        None,
    )
}
