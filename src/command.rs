//! Execution of the external `kasa` plug tool.
//!
//! The plug controller never spawns processes itself; it goes through
//! [`CommandRunner`] so tests can substitute canned output.

use std::process::Command;

use tracing::{debug, error, info};

use crate::error::PlugError;

/// Program name used when no override is configured.
pub const DEFAULT_PROGRAM: &str = "kasa";

/// Runs the plug tool with the given arguments and returns its stdout.
///
/// A non-zero exit must be reported as [`PlugError::CommandFailure`].
pub trait CommandRunner: Send {
    fn run(&self, args: &[&str]) -> Result<String, PlugError>;
}

/// Runs the real `kasa` executable.
#[derive(Debug, Clone)]
pub struct KasaCli {
    program: String,
}

impl KasaCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn describe(&self, args: &[&str]) -> String {
        std::iter::once(self.program.as_str())
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl CommandRunner for KasaCli {
    fn run(&self, args: &[&str]) -> Result<String, PlugError> {
        let command = self.describe(args);
        info!("executing command - {}", command);

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| PlugError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("command return code - {}", output.status);
        debug!("command response - {}", stdout);

        if !output.status.success() {
            error!("failed to execute command - {}", command);
            return Err(PlugError::CommandFailure {
                command,
                status: output.status.to_string(),
            });
        }

        Ok(stdout)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_joins_program_and_args() {
        let cli = KasaCli::new("kasa");
        assert_eq!(
            cli.describe(&["--host", "10.0.0.5", "device", "toggle"]),
            "kasa --host 10.0.0.5 device toggle"
        );
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let cli = KasaCli::new("/nonexistent/blue-kasa-test-tool");
        let result = cli.run(&["--json", "discover"]);
        assert!(matches!(result, Err(PlugError::Spawn { .. })));
    }

    #[test]
    fn non_zero_exit_is_a_command_failure() {
        let cli = KasaCli::new("false");
        let result = cli.run(&[]);
        assert!(matches!(result, Err(PlugError::CommandFailure { .. })));
    }

    #[test]
    fn stdout_is_returned_on_success() {
        let cli = KasaCli::new("echo");
        let stdout = cli.run(&["Turning", "on"]).expect("echo runs");
        assert_eq!(stdout.trim_end(), "Turning on");
    }
}
