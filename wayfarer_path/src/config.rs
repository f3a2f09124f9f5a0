// Tuning parameters for the path engine.
//
// The defaults are empirically tuned values carried over from years of live
// mapping, not derived from any principle. Treat them as knobs: the engine
// must behave sensibly for any positive settings, and hosts may reload a
// different config between ticks.

use serde::{Deserialize, Serialize};

/// Scoring and width-bound knobs for hypothesis tracking.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// A best fork this many times more probable than the runner-up wins
    /// outright.
    pub accept_best_relative: f64,
    /// A best fork ahead of the runner-up by this absolute margin wins
    /// outright.
    pub accept_best_absolute: f64,
    /// Penalty factor for a candidate that had to be synthesized this tick.
    pub new_room_penalty: f64,
    /// Penalty factor for landing on a room whose exit is already wired
    /// elsewhere (reused-description false matches cluster there).
    pub multiple_connections_penalty: f64,
    /// Bonus divisor for a candidate sitting exactly where the move should
    /// have landed.
    pub correct_position_bonus: f64,
    /// Hard cap on live hypotheses; also scales runner-up pruning.
    pub max_paths: u32,
    /// Mismatch budget for the room/event comparison (percent of text
    /// length for strings, absolute count for weak properties).
    pub matching_tolerance: i32,
    /// How many consecutive under-observed ticks are tolerated before the
    /// engine gives up and resynchronizes against the whole map.
    pub max_skipped: u32,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            accept_best_relative: 10.0,
            accept_best_absolute: 3.0,
            new_room_penalty: 5.0,
            multiple_connections_penalty: 2.0,
            correct_position_bonus: 5.1,
            max_paths: 500,
            matching_tolerance: 5,
            max_skipped: 1,
        }
    }
}

impl PathConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_json() {
        let config = PathConfig::default();
        let text = serde_json::to_string(&config).expect("serialize");
        assert_eq!(PathConfig::from_json(&text).expect("parse"), config);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = PathConfig::from_json(r#"{"max_paths": 10}"#).expect("parse");
        assert_eq!(config.max_paths, 10);
        assert_eq!(config.matching_tolerance, PathConfig::default().matching_tolerance);
    }
}
