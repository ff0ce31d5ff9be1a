use anyhow::Result;
use tracing::info;

pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod fd;
pub mod hotplug;
pub mod input_device;
pub mod input_processor;
pub mod listener;
pub mod logging;
pub mod plug_controller;
pub mod power;

use cli::Cli;
use command::KasaCli;
use config::Settings;
use input_device::EvdevOpener;
use listener::DeviceListener;
use plug_controller::PlugController;

/// Run the daemon until the process is killed.
///
/// Only startup problems (unreadable config, logging setup) are returned as
/// errors; everything after that is logged and retried.
pub fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env();
    let groups = config::load_groups(&cli.config)?;

    let _log_guard = logging::init_logging(&settings.log)?;
    info!(
        "loaded {} group(s) from {}",
        groups.len(),
        cli.config.display()
    );

    let mut controller = PlugController::new(KasaCli::new(settings.program.clone()));
    controller.discover();

    let mut listener = DeviceListener::new(EvdevOpener, controller, groups, settings.device_name.clone());

    // Detached: the monitor lives as long as the process.
    let _monitor = hotplug::start_hotplug_monitor(listener.handle(), settings.device_name);

    listener.run();
    Ok(())
}
