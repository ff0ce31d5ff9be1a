//! Plug power state and the rules for reading it out of `kasa` output.

use std::fmt;

use tracing::warn;

/// Marker the plug tool prints on the last line after switching an outlet on.
const TURNED_ON_MARKER: &str = "Turning on";

/// Marker the plug tool prints on the last line after switching an outlet off.
const TURNED_OFF_MARKER: &str = "Turning off";

/// Resulting state of a plug or outlet after a command.
///
/// `Unknown` means the state could not be determined. It is never treated as `Off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PowerState {
    On,
    Off,
    #[default]
    Unknown,
}

impl PowerState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Map a relay value as reported by discovery (`1` on, `0` off).
    pub fn from_relay(value: i64) -> Self {
        match value {
            1 => Self::On,
            0 => Self::Off,
            _ => Self::Unknown,
        }
    }

    /// Fold one more outlet result into an aggregate.
    ///
    /// A determinate result replaces `Unknown`, and `On` wins over `Off`.
    pub fn combine(self, next: PowerState) -> PowerState {
        match (self, next) {
            (Self::Unknown, next) => next,
            (Self::Off, Self::On) => Self::On,
            (current, _) => current,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Combine per-outlet results into one state for the whole group.
///
/// `On` if any outlet ended on, otherwise `Off` if any ended off, otherwise `Unknown`.
pub fn aggregate<I>(states: I) -> PowerState
where
    I: IntoIterator<Item = PowerState>,
{
    states
        .into_iter()
        .fold(PowerState::Unknown, PowerState::combine)
}

/// Classify the stdout of a successful toggle command.
///
/// Only the last line is inspected. This is a textual contract with the plug
/// tool and may break with new releases of it, so keep it in this one place.
pub fn parse_toggle_output(stdout: &str) -> PowerState {
    let Some(last) = stdout.lines().last() else {
        warn!("unable to determine power state - empty output");
        return PowerState::Unknown;
    };

    if last.contains(TURNED_ON_MARKER) {
        PowerState::On
    } else if last.contains(TURNED_OFF_MARKER) {
        PowerState::Off
    } else {
        warn!("unable to determine power state - {}", stdout);
        PowerState::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PowerState::{Off, On, Unknown};

    #[test]
    fn on_dominates_off_in_either_order() {
        assert_eq!(aggregate([On, Off]), On);
        assert_eq!(aggregate([Off, On]), On);
    }

    #[test]
    fn all_off_is_off() {
        assert_eq!(aggregate([Off, Off]), Off);
    }

    #[test]
    fn empty_aggregate_is_unknown() {
        assert_eq!(aggregate(Vec::<PowerState>::new()), Unknown);
    }

    #[test]
    fn unknown_never_downgrades_a_determinate_result() {
        assert_eq!(aggregate([Unknown, Off]), Off);
        assert_eq!(aggregate([Off, Unknown]), Off);
        assert_eq!(aggregate([On, Unknown, Off]), On);
        assert_eq!(aggregate([Unknown, Unknown]), Unknown);
    }

    #[test]
    fn last_line_turning_on() {
        let out = "Discovering device\nToggling outlet\nTurning on the outlet";
        assert_eq!(parse_toggle_output(out), On);
    }

    #[test]
    fn last_line_turning_off() {
        let out = "Toggling outlet\nTurning off Sun Room Lights\n";
        assert_eq!(parse_toggle_output(out), Off);
    }

    #[test]
    fn marker_on_earlier_line_is_ignored() {
        let out = "Turning on the outlet\nsomething unexpected";
        assert_eq!(parse_toggle_output(out), Unknown);
    }

    #[test]
    fn empty_output_is_unknown() {
        assert_eq!(parse_toggle_output(""), Unknown);
    }

    #[test]
    fn relay_values() {
        assert_eq!(PowerState::from_relay(1), On);
        assert_eq!(PowerState::from_relay(0), Off);
        assert_eq!(PowerState::from_relay(7), Unknown);
    }

    #[test]
    fn display_uses_upper_case() {
        assert_eq!(On.to_string(), "ON");
        assert_eq!(Unknown.to_string(), "UNKNOWN");
    }
}
