use std::collections::HashMap;

use crate::events::DeviceEvent;

/// Key code the remote sends for its main button.
pub const TRACKED_KEY: u16 = evdev::Key::KEY_PLAYPAUSE.0;

/// Remembers the last value of each tracked key so a release edge fires once.
///
/// Values are stored as 0 (up) or 1 (down); autorepeat counts as down.
#[derive(Debug, Clone)]
pub struct ButtonEdgeTracker {
    last: HashMap<u16, i32>,
}

impl ButtonEdgeTracker {
    pub fn new(codes: impl IntoIterator<Item = u16>) -> Self {
        Self {
            last: codes.into_iter().map(|code| (code, 0)).collect(),
        }
    }

    /// Record a new value for `code`. Returns true on a press → release edge.
    pub fn observe(&mut self, code: u16, value: i32) -> bool {
        let Some(last) = self.last.get_mut(&code) else {
            return false;
        };

        let value = i32::from(value != 0);
        let released = *last == 1 && value == 0;
        *last = value;
        released
    }

    /// Forget all key state, as if every tracked key were up.
    pub fn reset(&mut self) {
        self.last.values_mut().for_each(|value| *value = 0);
    }

    pub fn process(&mut self, event: DeviceEvent) -> bool {
        match event {
            DeviceEvent::Key { code, value } => self.observe(code, value),
            DeviceEvent::Other => false,
        }
    }
}

impl Default for ButtonEdgeTracker {
    fn default() -> Self {
        Self::new([TRACKED_KEY])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(values: &[i32]) -> usize {
        let mut tracker = ButtonEdgeTracker::default();
        values
            .iter()
            .filter(|&&v| tracker.observe(TRACKED_KEY, v))
            .count()
    }

    #[test]
    fn press_then_release_fires_once() {
        assert_eq!(edges(&[1, 0]), 1);
    }

    #[test]
    fn press_alone_does_not_fire() {
        assert_eq!(edges(&[1]), 0);
        assert_eq!(edges(&[0, 1]), 0);
    }

    #[test]
    fn repeated_values_never_refire() {
        assert_eq!(edges(&[0, 0, 0]), 0);
        assert_eq!(edges(&[1, 1, 1, 0, 0, 0]), 1);
    }

    #[test]
    fn each_press_release_pair_fires() {
        assert_eq!(edges(&[1, 0, 1, 0, 1, 0]), 3);
        assert_eq!(edges(&[0, 1, 1, 0, 0, 1]), 1);
    }

    #[test]
    fn held_button_with_autorepeat_fires_on_release() {
        assert_eq!(edges(&[1, 2, 2, 2, 0]), 1);
    }

    #[test]
    fn reset_forgets_a_held_button() {
        let mut tracker = ButtonEdgeTracker::default();
        tracker.observe(TRACKED_KEY, 1);
        tracker.reset();
        assert!(!tracker.observe(TRACKED_KEY, 0));
    }

    #[test]
    fn untracked_keys_are_ignored() {
        let mut tracker = ButtonEdgeTracker::default();
        assert!(!tracker.observe(30, 1));
        assert!(!tracker.observe(30, 0));
    }

    #[test]
    fn other_events_do_not_disturb_the_edge() {
        let mut tracker = ButtonEdgeTracker::default();
        assert!(!tracker.process(DeviceEvent::Key { code: TRACKED_KEY, value: 1 }));
        assert!(!tracker.process(DeviceEvent::Other));
        assert!(!tracker.process(DeviceEvent::Key { code: 115, value: 0 }));
        assert!(tracker.process(DeviceEvent::Key { code: TRACKED_KEY, value: 0 }));
    }
}
