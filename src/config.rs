use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const ENV_GRAPH_NAME: &str = "SUBSEQ_GRAPH_NAME";
pub const ENV_WRITE_BACKUPS: &str = "SUBSEQ_GRAPH_WRITE_BACKUPS";
pub const ENV_BACKUP_DIR: &str = "SUBSEQ_GRAPH_BACKUP_DIR";
pub const ENV_DISPLAY_MSGS: &str = "SUBSEQ_GRAPH_DISPLAY_MSGS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphConfig {
    pub graph_name: Option<String>,
    /// Snapshot the graph after every committed mutation.
    pub write_backups: bool,
    pub backup_dir: PathBuf,
    pub display_msgs: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            graph_name: None,
            write_backups: false,
            backup_dir: PathBuf::from("."),
            display_msgs: false,
        }
    }
}

impl GraphConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            graph_name: env::var(ENV_GRAPH_NAME)
                .ok()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            write_backups: env_flag(ENV_WRITE_BACKUPS),
            backup_dir: env::var(ENV_BACKUP_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.backup_dir),
            display_msgs: env_flag(ENV_DISPLAY_MSGS),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.graph_name = Some(name.into());
        self
    }

    pub fn with_backups(mut self, dir: impl Into<PathBuf>) -> Self {
        self.write_backups = true;
        self.backup_dir = dir.into();
        self
    }

    pub fn with_messages(mut self, display_msgs: bool) -> Self {
        self.display_msgs = display_msgs;
        self
    }
}

fn env_flag(name: &str) -> bool {
    match env::var(name) {
        Ok(value) => parse_flag(&value),
        Err(_) => false,
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn flags_accept_common_truthy_values() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag(" on "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: GraphConfig = serde_json::from_value(json!({"graphName": "roads"}))
            .expect("config should deserialize");
        assert_eq!(config.graph_name.as_deref(), Some("roads"));
        assert!(!config.write_backups);
        assert_eq!(config.backup_dir, PathBuf::from("."));
    }

    #[test]
    fn with_backups_enables_snapshots() {
        let config = GraphConfig::default().with_backups("/tmp/graphs");
        assert!(config.write_backups);
        assert_eq!(config.backup_dir, PathBuf::from("/tmp/graphs"));
    }
}
