// Field-by-field comparison between a stored room and an observation.
//
// The verdict is three-valued: `Equal` (the room is up to date and matches
// exactly), `Tolerance` (the room plausibly matches but some field drifted —
// the caller may want to refresh the room from the event), and `Different`.
//
// Unobservable event fields are never compared: a skipped name, desc, or
// terrain contributes nothing either way, so a blind observation degrades
// to "matches everything" rather than "matches nothing". A server-id match
// upgrades what would otherwise be hard mismatches to `Tolerance`, since
// the game's own id outranks drifting text.
//
// String comparison is word-by-word with a tolerance budget proportional to
// the stored text length (`tolerance` is a percentage). Weak-property
// comparison (exit/door flags, prompt light) counts mismatches against the
// same `tolerance` knob, with allowances for secret doors and hidden exits.

use crate::event::ParseEvent;
use crate::room::{Light, Room, Sundeath};
use crate::types::ALL_DIRECTIONS6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComparisonResult {
    Different,
    Tolerance,
    Equal,
}

/// Letter-by-letter difference between two words, counting mismatched
/// positions plus leftover length.
fn word_difference(a: &str, b: &str) -> i64 {
    let mut ac = a.chars();
    let mut bc = b.chars();
    let mut diff = 0i64;
    loop {
        match (ac.next(), bc.next()) {
            (Some(x), Some(y)) => {
                if x != y {
                    diff += 1;
                }
            }
            (Some(_), None) | (None, Some(_)) => diff += 1,
            (None, None) => return diff,
        }
    }
}

fn non_space_len(s: &str) -> i64 {
    s.chars().filter(|c| !c.is_whitespace()).count() as i64
}

/// Compare a stored string against an observed one.
///
/// `up_to_date` relaxes the rule that the stored text must not be shorter
/// than the observed text (a trusted room may legitimately have trimmed
/// trailing content).
pub fn compare_strings(
    room: &str,
    event: Option<&str>,
    tolerance: i32,
    up_to_date: bool,
) -> ComparisonResult {
    let Some(event) = event else {
        // Unobservable field: nothing to compare (blindness, darkness).
        return ComparisonResult::Equal;
    };

    let budget = i64::from(tolerance.max(0)) * room.len() as i64 / 100;
    let mut remaining = budget;

    let mut room_words = room.split_whitespace().peekable();
    let mut event_words = event.split_whitespace().peekable();

    if event_words.peek().is_some() {
        while remaining >= 0 {
            match (event_words.next(), room_words.next()) {
                (Some(ew), Some(rw)) => remaining -= word_difference(ew, rw),
                (Some(ew), None) => {
                    if up_to_date {
                        remaining -= non_space_len(ew)
                            + event_words.map(non_space_len).sum::<i64>();
                    }
                    break;
                }
                (None, Some(rw)) => {
                    remaining -= non_space_len(rw) + room_words.map(non_space_len).sum::<i64>();
                    break;
                }
                (None, None) => break,
            }
        }
    }

    if remaining < 0 {
        ComparisonResult::Different
    } else if remaining != budget || event.len() != room.len() {
        // Some budget was spent, or only whitespace differs.
        ComparisonResult::Tolerance
    } else {
        ComparisonResult::Equal
    }
}

/// Compare the weak properties: perceived exits and prompt light.
///
/// Counts mismatches; zero is `Equal`, up to `tolerance` is `Tolerance`,
/// beyond that `Different`.
fn compare_weak_props(room: &Room, event: &ParseEvent, tolerance: i32) -> ComparisonResult {
    let mut mismatches: i32 = 0;

    let prompt = event.prompt_flags();
    if prompt.is_valid() {
        // Light hints only count against rooms known to be sun-safe; a
        // sundeath room legitimately reads dark indoors and lit outside.
        if room.sundeath == Sundeath::NoSundeath
            && ((prompt.is_lit() && room.light == Light::Dark)
                || (prompt.is_dark() && room.light == Light::Lit))
        {
            mismatches += 1;
        }
    }

    let observed = event.exits_flags();
    if observed.is_valid() {
        for dir in ALL_DIRECTIONS6 {
            let room_exit = room.exit(dir);
            let flags = room_exit.flags;
            if flags.is_no_match() {
                continue;
            }
            let event_exit = observed.is_exit(dir) || observed.is_door(dir);
            let event_door = observed.is_door(dir);

            if !flags.is_exit() && event_door {
                // Likely a secret door the map has not recorded yet.
                mismatches += 1;
            } else if room_exit.door_flags.is_hidden() && !event_door {
                // Hidden doors are expected to go unreported.
            } else if flags.is_exit() && flags.is_door() && !event_exit {
                // A known door read as a plain wall: probably secret.
                mismatches += 1;
            } else if flags.is_exit() != event_exit || flags.is_door() != event_door {
                mismatches += 2;
            }
        }
    }

    if mismatches == 0 {
        ComparisonResult::Equal
    } else if mismatches <= tolerance.max(0) {
        ComparisonResult::Tolerance
    } else {
        ComparisonResult::Different
    }
}

/// Full room-vs-observation comparison.
pub fn compare(room: &Room, event: &ParseEvent, tolerance: i32) -> ComparisonResult {
    if room.is_blank() {
        // User-created placeholder: it matches anything, loosely.
        return ComparisonResult::Tolerance;
    }

    let server_match = match (event.server_id(), room.server_id) {
        (Some(a), Some(b)) if a == b => true,
        (Some(a), Some(b)) if a != b => return ComparisonResult::Different,
        _ => false,
    };
    // A server-id match outranks drifted text: demote hard mismatches.
    let demote = |r: ComparisonResult| {
        if server_match {
            ComparisonResult::Tolerance
        } else {
            r
        }
    };

    let mut up_to_date = true;

    if let Some(terrain) = event.terrain()
        && terrain != room.terrain
    {
        return demote(ComparisonResult::Different);
    }

    match compare_strings(&room.name, event.name(), tolerance, true) {
        ComparisonResult::Different => return demote(ComparisonResult::Different),
        ComparisonResult::Tolerance => up_to_date = false,
        ComparisonResult::Equal => {}
    }

    match compare_strings(&room.static_desc, event.static_desc(), tolerance, up_to_date) {
        ComparisonResult::Different => return demote(ComparisonResult::Different),
        ComparisonResult::Tolerance => up_to_date = false,
        ComparisonResult::Equal => {}
    }

    match compare_weak_props(room, event, tolerance) {
        ComparisonResult::Different => return demote(ComparisonResult::Different),
        ComparisonResult::Tolerance => up_to_date = false,
        ComparisonResult::Equal => {}
    }

    if up_to_date && event.server_id().is_some() && !server_match {
        // The room is missing an id the game just told us.
        up_to_date = false;
    }

    if up_to_date {
        ComparisonResult::Equal
    } else {
        ComparisonResult::Tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::observed_event;
    use crate::room::Terrain;
    use crate::types::{ExitDirection, MoveKind, ServerRoomId};

    fn room(name: &str, desc: &str, terrain: Terrain) -> Room {
        Room {
            name: name.to_owned(),
            static_desc: desc.to_owned(),
            terrain,
            ..Room::default()
        }
    }

    #[test]
    fn exact_match_is_equal() {
        let r = room("Dusty Crossroads", "Four roads meet here.", Terrain::Road);
        let e = observed_event(
            MoveKind::North,
            "Dusty Crossroads",
            "Four roads meet here.",
            Terrain::Road,
        );
        assert_eq!(compare(&r, &e, 5), ComparisonResult::Equal);
    }

    #[test]
    fn different_name_is_different() {
        let r = room("Dusty Crossroads", "Four roads meet here.", Terrain::Road);
        let e = observed_event(
            MoveKind::North,
            "Sunken Library",
            "Four roads meet here.",
            Terrain::Road,
        );
        assert_eq!(compare(&r, &e, 5), ComparisonResult::Different);
    }

    #[test]
    fn terrain_mismatch_is_different() {
        let r = room("Dusty Crossroads", "Four roads meet here.", Terrain::Road);
        let e = observed_event(
            MoveKind::North,
            "Dusty Crossroads",
            "Four roads meet here.",
            Terrain::Forest,
        );
        assert_eq!(compare(&r, &e, 5), ComparisonResult::Different);
    }

    #[test]
    fn skipped_fields_are_not_compared() {
        let r = room("Dusty Crossroads", "Four roads meet here.", Terrain::Road);
        let e = ParseEvent::blank(MoveKind::North);
        assert_eq!(compare(&r, &e, 5), ComparisonResult::Equal);
    }

    #[test]
    fn small_drift_is_tolerance() {
        let r = room(
            "Dusty Crossroads",
            "Four wide roads meet here beneath an old oak and a mossy milestone.",
            Terrain::Road,
        );
        let e = observed_event(
            MoveKind::North,
            "Dusty Crossroads",
            "Four wide roads meet here beneath an old elm and a mossy milestone.",
            Terrain::Road,
        );
        assert_eq!(compare(&r, &e, 20), ComparisonResult::Tolerance);
    }

    #[test]
    fn server_id_mismatch_overrides_text_match() {
        let mut r = room("Dusty Crossroads", "Four roads meet here.", Terrain::Road);
        r.server_id = Some(ServerRoomId(1));
        let mut e = observed_event(
            MoveKind::North,
            "Dusty Crossroads",
            "Four roads meet here.",
            Terrain::Road,
        );
        e = ParseEvent::new(
            e.move_kind(),
            e.name().map(str::to_owned),
            None,
            e.static_desc().map(str::to_owned),
            e.exits_flags(),
            e.prompt_flags(),
            e.connected_flags(),
            Some(ServerRoomId(2)),
        );
        assert_eq!(compare(&r, &e, 5), ComparisonResult::Different);
    }

    #[test]
    fn server_id_match_demotes_text_mismatch() {
        let mut r = room("Dusty Crossroads", "Four roads meet here.", Terrain::Road);
        r.server_id = Some(ServerRoomId(9));
        let e = ParseEvent::new(
            MoveKind::North,
            Some("Renamed Crossroads Entirely".to_owned()),
            None,
            Some("Four roads meet here.".to_owned()),
            crate::event::ExitsFlags::default(),
            crate::event::PromptFlags::observed(Terrain::Road),
            crate::event::ConnectedRoomFlags::default(),
            Some(ServerRoomId(9)),
        );
        assert_eq!(compare(&r, &e, 5), ComparisonResult::Tolerance);
    }

    #[test]
    fn blank_room_matches_anything_as_tolerance() {
        let r = Room::default();
        let e = observed_event(MoveKind::North, "Anywhere", "Anything.", Terrain::City);
        assert_eq!(compare(&r, &e, 5), ComparisonResult::Tolerance);
    }

    #[test]
    fn secret_door_within_tolerance() {
        let r = room("Dusty Crossroads", "Four roads meet here.", Terrain::Road);
        let mut flags = crate::event::ExitsFlags::default();
        flags.set_valid();
        flags.set_exit(ExitDirection::North);
        flags.set_door(ExitDirection::North);
        let e = ParseEvent::new(
            MoveKind::North,
            Some("Dusty Crossroads".to_owned()),
            None,
            Some("Four roads meet here.".to_owned()),
            flags,
            crate::event::PromptFlags::observed(Terrain::Road),
            crate::event::ConnectedRoomFlags::default(),
            None,
        );
        // The map has no north exit recorded; a door observation there is a
        // likely secret door, tolerated rather than rejected.
        assert_eq!(compare(&r, &e, 5), ComparisonResult::Tolerance);
    }
}
