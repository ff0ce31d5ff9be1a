//! Kasa smart plug control.
//!
//! Discovers plugs through `kasa --json discover`, maps a group name to the
//! plug's address, and toggles either the whole plug or a list of its child
//! outlets. Results for several outlets are folded into one [`PowerState`].

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, error, info};

use crate::command::CommandRunner;
use crate::error::PlugError;
use crate::power::{aggregate, parse_toggle_output, PowerState};

/// One individually switchable socket on a multi-outlet plug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildOutlet {
    pub name: String,
    pub state: PowerState,
}

/// A plug found by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlugEndpoint {
    /// Alias configured on the plug; this is what groups refer to.
    pub name: String,
    pub address: String,
    /// Relay state of a single-outlet plug. `None` for power strips.
    pub state: Option<PowerState>,
    pub children: Vec<ChildOutlet>,
}

/// Raw discovery record, keyed by address in the tool's output.
#[derive(Debug, Deserialize)]
struct DiscoveryRecord {
    system: SystemInfo,
}

#[derive(Debug, Deserialize)]
struct SystemInfo {
    get_sysinfo: SysInfo,
}

#[derive(Debug, Deserialize)]
struct SysInfo {
    alias: String,
    #[serde(default)]
    relay_state: Option<i64>,
    #[serde(default)]
    children: Option<Vec<ChildInfo>>,
}

#[derive(Debug, Deserialize)]
struct ChildInfo {
    alias: String,
    state: i64,
}

/// Parse the JSON printed by `kasa --json discover`.
///
/// Endpoints come back ordered by address.
fn parse_discovery(stdout: &str) -> Result<Vec<PlugEndpoint>, PlugError> {
    let records: BTreeMap<String, DiscoveryRecord> = serde_json::from_str(stdout)?;

    let endpoints = records
        .into_iter()
        .map(|(address, record)| {
            let info = record.system.get_sysinfo;
            let children = info
                .children
                .unwrap_or_default()
                .into_iter()
                .map(|child| ChildOutlet {
                    name: child.alias,
                    state: PowerState::from_relay(child.state),
                })
                .collect::<Vec<_>>();

            let state = if children.is_empty() {
                Some(
                    info.relay_state
                        .map(PowerState::from_relay)
                        .unwrap_or_default(),
                )
            } else {
                None
            };

            PlugEndpoint {
                name: info.alias,
                address,
                state,
                children,
            }
        })
        .collect();

    Ok(endpoints)
}

/// Owns the discovery snapshot and issues toggle commands.
///
/// Methods that touch the snapshot take `&mut self`, so a controller can only
/// be driven from one place at a time.
pub struct PlugController<R> {
    runner: R,
    endpoints: Vec<PlugEndpoint>,
}

impl<R: CommandRunner> PlugController<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            endpoints: Vec::new(),
        }
    }

    /// Rediscover plugs, replacing the previous snapshot.
    ///
    /// A failed or unparseable discovery leaves the snapshot empty; callers
    /// retry later instead of treating it as fatal.
    pub fn discover(&mut self) -> &[PlugEndpoint] {
        self.endpoints = match self.fetch_endpoints() {
            Ok(endpoints) => endpoints,
            Err(e) => {
                error!("discovery failed: {}", e);
                Vec::new()
            }
        };

        info!("discovered {} device(s)", self.endpoints.len());
        for endpoint in &self.endpoints {
            debug!(
                "device {} at {} ({} outlet(s))",
                endpoint.name,
                endpoint.address,
                endpoint.children.len().max(1)
            );
        }

        &self.endpoints
    }

    fn fetch_endpoints(&self) -> Result<Vec<PlugEndpoint>, PlugError> {
        let stdout = self.runner.run(&["--json", "discover"])?;
        parse_discovery(&stdout)
    }

    /// The last discovery snapshot.
    pub fn endpoints(&self) -> &[PlugEndpoint] {
        &self.endpoints
    }

    pub fn resolve_address(&self, name: &str) -> Option<&str> {
        self.endpoints
            .iter()
            .find(|endpoint| endpoint.name == name)
            .map(|endpoint| endpoint.address.as_str())
    }

    /// Toggle a group, logging any failure and reporting it as `Unknown`.
    pub fn toggle(&mut self, group: &str, children: &[String]) -> PowerState {
        match self.try_toggle(group, children) {
            Ok(state) => state,
            Err(e) => {
                error!("{}", e);
                PowerState::Unknown
            }
        }
    }

    /// Toggle a group.
    ///
    /// An unresolved name triggers one rediscovery. If the name still does
    /// not resolve, no command is issued and `DeviceNotFound` is returned.
    /// Failures of individual outlets are logged and count as `Unknown`.
    pub fn try_toggle(&mut self, group: &str, children: &[String]) -> Result<PowerState, PlugError> {
        let resolved = self.resolve_address(group).map(str::to_owned);
        let address = match resolved {
            Some(address) => address,
            None => {
                info!("device {} not found. rescanning devices", group);
                self.discover();
                self.resolve_address(group)
                    .map(str::to_owned)
                    .ok_or_else(|| PlugError::DeviceNotFound(group.to_string()))?
            }
        };

        if children.is_empty() {
            return Ok(self.toggle_outlet(&address, None));
        }

        let state = aggregate(
            children
                .iter()
                .map(|child| self.toggle_outlet(&address, Some(child.as_str()))),
        );
        Ok(state)
    }

    fn toggle_outlet(&self, address: &str, child: Option<&str>) -> PowerState {
        let mut args = vec!["--host", address, "device"];
        if let Some(child) = child {
            args.extend(["--child", child]);
        }
        args.push("toggle");

        let target = child.unwrap_or(address);
        match self.runner.run(&args) {
            Ok(stdout) => {
                let state = parse_toggle_output(&stdout);
                debug!("{} is now {}", target, state);
                state
            }
            Err(e) => {
                error!("toggle of {} failed: {}", target, e);
                PowerState::Unknown
            }
        }
    }
}
