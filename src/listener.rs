//! Remote presence tracking and the key event loop.
//!
//! The hotplug thread reports the remote coming and going through a
//! [`ListenerHandle`]. The loop in [`DeviceListener::run`] waits while the
//! remote is absent, reads key events while it is present, and toggles every
//! configured group on each release of the tracked button.
//!
//! Presence and the open handle live under one mutex with one condition
//! variable. The loop never holds that mutex while it is blocked in a read,
//! so notifications are never held up by an in-flight read. A notification
//! that drops the handle also wakes that read, and the loop re-evaluates
//! presence before reading again.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::command::CommandRunner;
use crate::config::Group;
use crate::error::ListenerError;
use crate::events::DeviceEvent;
use crate::input_device::{DeviceOpener, InputSource, ReadWaker};
use crate::input_processor::ButtonEdgeTracker;
use crate::plug_controller::PlugController;
use crate::power::PowerState;

/// Whether the listener currently holds a handle to the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Absent,
    Present,
    /// Shut down; the loop exits once it sees this.
    Closed,
}

/// A handle opened from a device node.
///
/// `generation` changes every time a handle is installed, so a read that
/// finishes after its handle was replaced or dropped can be recognised.
#[derive(Clone)]
struct OpenDevice {
    path: PathBuf,
    generation: u64,
    source: Arc<Mutex<Box<dyn InputSource>>>,
    /// Reachable without the source lock, which a blocked read holds.
    waker: Arc<dyn ReadWaker>,
}

impl OpenDevice {
    fn abandon(self) {
        debug!("waking reader of {}", self.path.display());
        self.waker.wake();
    }
}

#[derive(Default)]
struct PresenceState {
    device: Option<OpenDevice>,
    closed: bool,
    generation: u64,
}

impl PresenceState {
    fn presence(&self) -> Presence {
        if self.closed {
            Presence::Closed
        } else if self.device.is_some() {
            Presence::Present
        } else {
            Presence::Absent
        }
    }
}

struct Shared {
    state: Mutex<PresenceState>,
    wake: Condvar,
    opener: Box<dyn DeviceOpener>,
}

/// Cloneable handle used by the notifying side.
#[derive(Clone)]
pub struct ListenerHandle {
    shared: Arc<Shared>,
}

impl ListenerHandle {
    fn new(opener: Box<dyn DeviceOpener>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PresenceState::default()),
                wake: Condvar::new(),
                opener,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PresenceState> {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The remote appeared at `path`.
    ///
    /// Opens a handle and makes it current. A handle that is already open is
    /// dropped and replaced. If the open fails, presence is left as it was.
    pub fn notify_connected(&self, path: &Path) {
        let opened = self.shared.opener.open(path);

        let mut state = self.lock();
        if state.closed {
            return;
        }

        let replaced = match opened {
            Ok(source) => {
                state.generation += 1;
                let generation = state.generation;
                let waker = source.waker();
                let replaced = state.device.replace(OpenDevice {
                    path: path.to_path_buf(),
                    generation,
                    source: Arc::new(Mutex::new(source)),
                    waker,
                });
                if let Some(old) = &replaced {
                    info!("replacing device {} with {}", old.path.display(), path.display());
                }
                info!("device connected - {}", path.display());
                replaced
            }
            Err(source) => {
                let err = ListenerError::Open {
                    path: path.to_path_buf(),
                    source,
                };
                warn!("{}", err);
                None
            }
        };

        drop(state);
        self.shared.wake.notify_all();
        if let Some(old) = replaced {
            old.abandon();
        }
    }

    /// The remote went away. Drops the handle and wakes the loop, including
    /// a read blocked on that handle.
    pub fn notify_removed(&self) {
        let mut state = self.lock();
        let removed = state.device.take();

        drop(state);
        self.shared.wake.notify_all();
        if let Some(old) = removed {
            info!("device disconnected - {}", old.path.display());
            old.abandon();
        }
    }

    /// Whether the current handle was opened from `path`.
    pub fn has_device(&self, path: &Path) -> bool {
        self.lock()
            .device
            .as_ref()
            .is_some_and(|device| device.path == path)
    }

    pub fn presence(&self) -> Presence {
        self.lock().presence()
    }

    /// Stop the loop. A read that is blocked on the current handle is woken,
    /// so the loop returns without waiting for another event.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        state.closed = true;
        let dropped = state.device.take();

        drop(state);
        self.shared.wake.notify_all();
        if let Some(old) = dropped {
            old.abandon();
        }
    }

    /// Block until a handle is available. `None` once shut down.
    fn wait_for_device(&self) -> Option<OpenDevice> {
        let mut state = self.lock();
        loop {
            match state.presence() {
                Presence::Closed => return None,
                Presence::Present => return state.device.clone(),
                Presence::Absent => {}
            }
            state = self
                .shared
                .wake
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock()
            .device
            .as_ref()
            .is_some_and(|device| device.generation == generation)
    }

    /// Drop the handle after a failed read, unless it was already replaced.
    fn release(&self, generation: u64) {
        let mut state = self.lock();
        if state
            .device
            .as_ref()
            .is_some_and(|device| device.generation == generation)
        {
            state.device = None;
        }

        drop(state);
        self.shared.wake.notify_all();
    }
}

/// Binds releases of the remote's button to toggling plug groups.
pub struct DeviceListener<R> {
    handle: ListenerHandle,
    controller: PlugController<R>,
    groups: Vec<Group>,
    tracker: ButtonEdgeTracker,
    /// Generation of the handle the tracker's key state belongs to.
    tracked_generation: u64,
    display_name: String,
}

impl<R: CommandRunner> DeviceListener<R> {
    pub fn new(
        opener: impl DeviceOpener + 'static,
        controller: PlugController<R>,
        groups: Vec<Group>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            handle: ListenerHandle::new(Box::new(opener)),
            controller,
            groups,
            tracker: ButtonEdgeTracker::default(),
            tracked_generation: 0,
            display_name: display_name.into(),
        }
    }

    /// Handle for the hotplug side.
    pub fn handle(&self) -> ListenerHandle {
        self.handle.clone()
    }

    /// Run the event loop. Returns only after [`ListenerHandle::shutdown`].
    pub fn run(&mut self) {
        self.seed_presence();

        while let Some(device) = self.handle.wait_for_device() {
            // A press cut short by an unplug must not fire on the next device.
            if device.generation != self.tracked_generation {
                self.tracker.reset();
                self.tracked_generation = device.generation;
            }
            self.read_next(&device);
        }

        info!("listener stopped");
    }

    /// Look for a remote that was attached before hotplug monitoring began.
    fn seed_presence(&self) {
        if self.handle.presence() != Presence::Absent {
            return;
        }

        match self.handle.shared.opener.find_by_name(&self.display_name) {
            Some(path) => {
                info!("device found - {}", path.display());
                self.handle.notify_connected(&path);
            }
            None => info!("{} not attached, waiting for it", self.display_name),
        }
    }

    fn read_next(&mut self, device: &OpenDevice) {
        let result = device
            .source
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .next_event();

        match result {
            Ok(Some(event)) => {
                if self.handle.is_current(device.generation) {
                    self.handle_event(event);
                } else {
                    debug!("discarding event from stale handle {}", device.path.display());
                }
            }
            Ok(None) => {
                info!("event stream ended - {}", device.path.display());
                self.handle.release(device.generation);
            }
            // Woken by a presence change; re-evaluate before reading again.
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                debug!("read on {} interrupted", device.path.display());
            }
            Err(source) => {
                let err = ListenerError::Read {
                    path: device.path.clone(),
                    source,
                };
                warn!("{}", err);
                self.handle.release(device.generation);
            }
        }
    }

    fn handle_event(&mut self, event: DeviceEvent) {
        if let DeviceEvent::Key { .. } = event {
            debug!("{}", event);
        }

        if self.tracker.process(event) {
            self.toggle_groups();
        }
    }

    /// Toggle every group once, in configuration order, one after another.
    pub fn toggle_groups(&mut self) -> Vec<PowerState> {
        let start = Instant::now();

        let results = self
            .groups
            .iter()
            .map(|group| {
                debug!("toggle - {} {:?}", group.name, group.children);
                let state = self.controller.toggle(&group.name, &group.children);
                info!("{} is now {}", group.name, state);
                state
            })
            .collect();

        debug!("command finished in {:.2}s", start.elapsed().as_secs_f64());
        results
    }
}
