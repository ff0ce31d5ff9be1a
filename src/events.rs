use std::fmt;

/// An event read from the remote, reduced to what the listener acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Key transition. `value` is 0 for release, 1 for press and 2 for autorepeat.
    Key { code: u16, value: i32 },
    /// Sync, misc and anything else the device reports.
    Other,
}

impl fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceEvent::Key { code, value } => write!(f, "event code - {} value - {}", code, value),
            DeviceEvent::Other => write!(f, "non-key event"),
        }
    }
}
