use serde::{Deserialize, Serialize};

pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_HEARTBEAT_INTERVAL: i64 = 15;

/// `[conductor]` section of config.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorSettings {
    pub enabled: bool,
    /// Minutes between heartbeats; non-positive means the default
    pub heartbeat_interval: i64,
    pub profiles: Vec<String>,
    /// Override for the shared CLAUDE.md
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claude_md_path: Option<String>,
}

impl ConductorSettings {
    pub fn get_heartbeat_interval(&self) -> i64 {
        if self.heartbeat_interval <= 0 {
            DEFAULT_HEARTBEAT_INTERVAL
        } else {
            self.heartbeat_interval
        }
    }

    pub fn get_profiles(&self) -> Vec<String> {
        if self.profiles.is_empty() {
            vec![DEFAULT_PROFILE.to_string()]
        } else {
            self.profiles.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_heartbeat_interval() {
        for (interval, expected) in [(0, 15), (-1, 15), (10, 10), (30, 30)] {
            let settings = ConductorSettings {
                heartbeat_interval: interval,
                ..Default::default()
            };
            assert_eq!(settings.get_heartbeat_interval(), expected, "interval {interval}");
        }
    }

    #[test]
    fn test_get_profiles() {
        let settings = ConductorSettings::default();
        assert_eq!(settings.get_profiles(), vec![DEFAULT_PROFILE.to_string()]);

        let settings = ConductorSettings {
            profiles: vec!["work".to_string(), "personal".to_string()],
            ..Default::default()
        };
        assert_eq!(settings.get_profiles(), vec!["work", "personal"]);
    }
}
