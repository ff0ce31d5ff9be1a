//! Input device hotplug monitoring using udev.
//!
//! Watches the `input` subsystem for the remote's event node being added or
//! removed and reports it to the listener.

use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use crate::fd;
use crate::listener::ListenerHandle;

/// udev action, reduced to the two we react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAction {
    Add,
    Remove,
    Other,
}

impl From<udev::EventType> for DeviceAction {
    fn from(event_type: udev::EventType) -> Self {
        match event_type {
            udev::EventType::Add => DeviceAction::Add,
            udev::EventType::Remove => DeviceAction::Remove,
            _ => DeviceAction::Other,
        }
    }
}

/// What the listener should be told about a udev event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotplugAction {
    Connected(PathBuf),
    Removed(PathBuf),
}

/// Whether `devnode` is a numbered event node such as `/dev/input/event12`.
///
/// The remote also exposes `mouseN` and `jsN` nodes that must not be opened.
fn is_event_node(devnode: &Path) -> bool {
    devnode
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix("event"))
        .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
}

/// Decide how a udev event affects the listener.
///
/// `ancestor_names` are the `NAME` properties of the node's parents.
/// `is_current` says whether the listener's handle was opened from this node;
/// on removal the parents are often already gone, so that alone is enough.
pub fn classify(
    action: DeviceAction,
    devnode: Option<&Path>,
    ancestor_names: &[String],
    display_name: &str,
    is_current: bool,
) -> Option<HotplugAction> {
    let devnode = devnode?;
    let is_remote = is_event_node(devnode)
        && ancestor_names.iter().any(|name| name.contains(display_name));

    match action {
        DeviceAction::Add if is_remote => Some(HotplugAction::Connected(devnode.to_path_buf())),
        DeviceAction::Remove if is_remote || is_current => {
            Some(HotplugAction::Removed(devnode.to_path_buf()))
        }
        _ => None,
    }
}

fn ancestor_names(device: &udev::Device) -> Vec<String> {
    let mut names = Vec::new();
    let mut current = device.parent();
    while let Some(parent) = current {
        if let Some(name) = parent.property_value("NAME") {
            names.push(name.to_string_lossy().into_owned());
        }
        current = parent.parent();
    }
    names
}

/// Start the hotplug monitor in a background thread.
pub fn start_hotplug_monitor(handle: ListenerHandle, display_name: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        if let Err(e) = run_monitor_loop(&handle, &display_name) {
            error!("hotplug monitor error: {:#}", e);
        }
    })
}

fn run_monitor_loop(handle: &ListenerHandle, display_name: &str) -> Result<()> {
    let socket = udev::MonitorBuilder::new()
        .context("udev monitor init failed")?
        .match_subsystem("input")
        .context("udev subsystem filter failed")?
        .listen()
        .context("udev monitor listen failed")?;

    info!("hotplug monitor started, watching for {}", display_name);

    loop {
        wait_readable(&socket).context("polling udev monitor failed")?;

        for event in socket.iter() {
            let device = event.device();
            let devnode = device.devnode();
            let action = DeviceAction::from(event.event_type());
            debug!("event - {:?} {:?}", action, devnode);

            let is_current = action == DeviceAction::Remove
                && devnode.is_some_and(|node| handle.has_device(node));

            match classify(action, devnode, &ancestor_names(&device), display_name, is_current) {
                Some(HotplugAction::Connected(path)) => {
                    info!("device added - {}", path.display());
                    handle.notify_connected(&path);
                }
                Some(HotplugAction::Removed(path)) => {
                    info!("device removed - {}", path.display());
                    handle.notify_removed();
                }
                None => {}
            }
        }
    }
}

/// Block until the monitor socket has events.
fn wait_readable(socket: &impl AsRawFd) -> io::Result<()> {
    fd::poll(&mut [fd::readable(socket.as_raw_fd())])
}
