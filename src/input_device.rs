//! Reading key events from the remote through Linux evdev.
//!
//! The listener only sees the [`InputSource`] and [`DeviceOpener`] traits, so
//! its state machine can be driven by in-memory sources in tests.

use std::collections::VecDeque;
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use evdev::{Device, InputEvent, InputEventKind};
use tracing::{debug, warn};

use crate::events::DeviceEvent;
use crate::fd::{self, EventFd};

/// Makes a read on another thread give up.
pub trait ReadWaker: Send + Sync {
    /// The blocked (or next) `next_event` on the matching source returns
    /// `ErrorKind::Interrupted`.
    fn wake(&self);
}

/// An open input device handle.
pub trait InputSource: Send {
    /// Block until the next event is available or the source is woken.
    ///
    /// `Ok(None)` means the stream has ended and the handle is useless.
    fn next_event(&mut self) -> io::Result<Option<DeviceEvent>>;

    /// Waker for this source, usable while `next_event` is blocked.
    fn waker(&self) -> Arc<dyn ReadWaker>;
}

/// Opens handles and locates devices by display name.
pub trait DeviceOpener: Send + Sync {
    fn open(&self, path: &Path) -> io::Result<Box<dyn InputSource>>;

    /// Path of the first device whose name contains `name`.
    fn find_by_name(&self, name: &str) -> Option<PathBuf>;
}

impl ReadWaker for EventFd {
    fn wake(&self) {
        if let Err(e) = self.signal() {
            warn!("failed to wake reader: {}", e);
        }
    }
}

/// evdev handle. Events come in batches from the kernel and are handed out
/// one at a time. Reads wait on the device and the wake descriptor together.
pub struct EvdevSource {
    device: Device,
    wake: Arc<EventFd>,
    pending: VecDeque<DeviceEvent>,
}

impl EvdevSource {
    pub fn open(path: &Path) -> io::Result<Self> {
        let device = Device::open(path)?;
        fd::set_nonblocking(&device)?;

        Ok(Self {
            device,
            wake: Arc::new(EventFd::new()?),
            pending: VecDeque::new(),
        })
    }
}

fn to_device_event(event: InputEvent) -> DeviceEvent {
    match event.kind() {
        InputEventKind::Key(key) => DeviceEvent::Key {
            code: key.code(),
            value: event.value(),
        },
        _ => DeviceEvent::Other,
    }
}

impl InputSource for EvdevSource {
    fn next_event(&mut self) -> io::Result<Option<DeviceEvent>> {
        while self.pending.is_empty() {
            let mut fds = [
                fd::readable(self.device.as_raw_fd()),
                fd::readable(self.wake.as_raw_fd()),
            ];
            fd::poll(&mut fds)?;

            if fds[1].revents & libc::POLLIN != 0 && self.wake.drain() {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "read woken"));
            }

            match self.device.fetch_events() {
                Ok(events) => self.pending.extend(events.map(to_device_event)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }
        }
        Ok(self.pending.pop_front())
    }

    fn waker(&self) -> Arc<dyn ReadWaker> {
        self.wake.clone()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EvdevOpener;

impl DeviceOpener for EvdevOpener {
    fn open(&self, path: &Path) -> io::Result<Box<dyn InputSource>> {
        Ok(Box::new(EvdevSource::open(path)?))
    }

    fn find_by_name(&self, name: &str) -> Option<PathBuf> {
        evdev::enumerate().find_map(|(path, device)| {
            let device_name = device.name().unwrap_or_default();
            debug!("scanned {} ({})", path.display(), device_name);
            device_name.contains(name).then_some(path)
        })
    }
}
