use std::path::PathBuf;

use clap::Parser;

/// Toggle Kasa smart plugs from a Bluetooth remote's play/pause button.
#[derive(Debug, Parser)]
#[command(name = "blue-kasa", version, about)]
pub struct Cli {
    /// JSON file listing the plug groups to toggle
    pub config: PathBuf,
}
