use crate::command::DEFAULT_PROGRAM;
use crate::error::ConfigError;
use crate::logging::LogConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Display name of the remote, matched as a substring.
pub const DEFAULT_DEVICE_NAME: &str = "Wireless Phone Controller";

/// Environment variable overriding the remote's display name.
const DEVICE_ENV: &str = "BLUE_KASA_DEVICE";
/// Environment variable overriding the plug tool program.
const PROGRAM_ENV: &str = "BLUE_KASA_CLI";
/// Environment variable overriding the log file location.
const LOG_FILE_ENV: &str = "BLUE_KASA_LOG";

/// Process settings that are not part of the group file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub device_name: String,
    pub program: String,
    pub log: LogConfig,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut log = LogConfig::default();
        if let Some(path) = non_empty(LOG_FILE_ENV) {
            log.file_path = PathBuf::from(path);
        }

        Self {
            device_name: non_empty(DEVICE_ENV).unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string()),
            program: non_empty(PROGRAM_ENV).unwrap_or_else(|| DEFAULT_PROGRAM.to_string()),
            log,
        }
    }
}

/// One toggle target: a plug, or a set of outlets on one plug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Plug alias as reported by discovery.
    pub name: String,
    /// Child outlet aliases. Empty means toggle the plug as a whole.
    pub children: Vec<String>,
}

impl Group {
    pub fn new(name: impl Into<String>, children: Vec<String>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }
}

/// Group entry as written in the config file. Extra fields are ignored.
#[derive(Debug, Deserialize)]
struct GroupEntry {
    name: String,
    #[serde(default)]
    children: Vec<ChildEntry>,
}

#[derive(Debug, Deserialize)]
struct ChildEntry {
    name: String,
}

impl From<GroupEntry> for Group {
    fn from(entry: GroupEntry) -> Self {
        Group {
            name: entry.name,
            children: entry.children.into_iter().map(|child| child.name).collect(),
        }
    }
}

/// Parse groups from JSON text.
pub fn parse_groups(contents: &str) -> Result<Vec<Group>, serde_json::Error> {
    let entries: Vec<GroupEntry> = serde_json::from_str(contents)?;
    Ok(entries.into_iter().map(Group::from).collect())
}

/// Load the group list from a JSON config file, keeping file order.
pub fn load_groups(path: &Path) -> Result<Vec<Group>, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse_groups(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn settings_default_to_the_original_remote() {
        let settings = Settings::from_lookup(|_| None);
        assert_eq!(settings.device_name, DEFAULT_DEVICE_NAME);
        assert_eq!(settings.program, "kasa");
        assert_eq!(settings.log.file_path, PathBuf::from("/tmp/blue-kasa.log"));
    }

    #[test]
    fn settings_from_environment() {
        let settings = Settings::from_lookup(|key| match key {
            "BLUE_KASA_DEVICE" => Some("8BitDo Micro".to_string()),
            "BLUE_KASA_CLI" => Some("/opt/kasa/bin/kasa".to_string()),
            "BLUE_KASA_LOG" => Some("/var/log/blue-kasa.log".to_string()),
            _ => None,
        });

        assert_eq!(settings.device_name, "8BitDo Micro");
        assert_eq!(settings.program, "/opt/kasa/bin/kasa");
        assert_eq!(settings.log.file_path, PathBuf::from("/var/log/blue-kasa.log"));
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let settings = Settings::from_lookup(|key| (key == "BLUE_KASA_DEVICE").then(|| "  ".to_string()));
        assert_eq!(settings.device_name, DEFAULT_DEVICE_NAME);
    }

    #[test]
    fn plain_and_child_groups() {
        let json = r#"[
            { "name": "Lamp" },
            { "name": "TP-LINK_Power Strip_57F4", "children": [
                { "name": "Christmas Tree", "id": "00" },
                { "name": "Sun Room Lights" }
            ] }
        ]"#;

        let groups = parse_groups(json).expect("parse");

        assert_eq!(
            groups,
            vec![
                Group::new("Lamp", Vec::new()),
                Group::new(
                    "TP-LINK_Power Strip_57F4",
                    vec!["Christmas Tree".to_string(), "Sun Room Lights".to_string()]
                ),
            ]
        );
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = r#"[{ "name": "Lamp", "room": "den", "children": [] }]"#;
        let groups = parse_groups(json).expect("parse");
        assert_eq!(groups, vec![Group::new("Lamp", Vec::new())]);
    }

    #[test]
    fn empty_list_is_valid() {
        assert!(parse_groups("[]").expect("parse").is_empty());
    }

    #[test]
    fn group_without_name_is_rejected() {
        assert!(parse_groups(r#"[{ "children": [] }]"#).is_err());
    }

    #[test]
    fn object_instead_of_list_is_rejected() {
        assert!(parse_groups(r#"{ "name": "Lamp" }"#).is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"[{{ "name": "Lamp" }}]"#).expect("write");

        let groups = load_groups(file.path()).expect("load");
        assert_eq!(groups, vec![Group::new("Lamp", Vec::new())]);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = load_groups(Path::new("/nonexistent/blue-kasa/groups.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "this is not json [[[").expect("write");

        let result = load_groups(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
