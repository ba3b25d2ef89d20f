use std::path::PathBuf;

use crate::conductor::{validate_conductor_name, ConfigRoot, HEARTBEAT_SCRIPT};
use crate::error::Result;
use crate::template::render;

use super::systemd::{interval_seconds, path_str};
use super::BRIDGE_SCRIPT;

pub const BRIDGE_PLIST_LABEL: &str = "com.agentdeck.conductor-bridge";
const HEARTBEAT_LABEL_PREFIX: &str = "com.agentdeck.conductor-heartbeat.";

const HEARTBEAT_PLIST_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>__LABEL__</string>
    <key>ProgramArguments</key>
    <array>
        <string>/bin/bash</string>
        <string>__SCRIPT_PATH__</string>
    </array>
    <key>StartInterval</key>
    <integer>__INTERVAL__</integer>
    <key>RunAtLoad</key>
    <false/>
    <key>StandardOutPath</key>
    <string>__LOG_DIR__/heartbeat.log</string>
    <key>StandardErrorPath</key>
    <string>__LOG_DIR__/heartbeat.log</string>
    <key>EnvironmentVariables</key>
    <dict>
        <key>HOME</key>
        <string>__HOME__</string>
        <key>PATH</key>
        <string>__HOME__/.local/bin:/opt/homebrew/bin:/usr/local/bin:/usr/bin:/bin</string>
    </dict>
</dict>
</plist>
"#;

const BRIDGE_PLIST_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>__LABEL__</string>
    <key>ProgramArguments</key>
    <array>
        <string>/usr/bin/env</string>
        <string>python3</string>
        <string>__SCRIPT_PATH__</string>
    </array>
    <key>RunAtLoad</key>
    <true/>
    <key>KeepAlive</key>
    <true/>
    <key>StandardOutPath</key>
    <string>__LOG_DIR__/bridge.log</string>
    <key>StandardErrorPath</key>
    <string>__LOG_DIR__/bridge.log</string>
    <key>EnvironmentVariables</key>
    <dict>
        <key>HOME</key>
        <string>__HOME__</string>
        <key>PATH</key>
        <string>__HOME__/.local/bin:/opt/homebrew/bin:/usr/local/bin:/usr/bin:/bin</string>
    </dict>
</dict>
</plist>
"#;

pub fn heartbeat_plist_label(name: &str) -> String {
    format!("{HEARTBEAT_LABEL_PREFIX}{name}")
}

/// `~/Library/LaunchAgents`
pub fn launch_agents_dir(root: &ConfigRoot) -> PathBuf {
    root.home().join("Library").join("LaunchAgents")
}

pub fn heartbeat_plist_path(root: &ConfigRoot, name: &str) -> PathBuf {
    launch_agents_dir(root).join(format!("{}.plist", heartbeat_plist_label(name)))
}

pub fn bridge_plist_path(root: &ConfigRoot) -> PathBuf {
    launch_agents_dir(root).join(format!("{BRIDGE_PLIST_LABEL}.plist"))
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn generate_heartbeat_plist(root: &ConfigRoot, name: &str, interval_minutes: i64) -> Result<String> {
    validate_conductor_name(name)?;
    let conductor_dir = root.conductor_dir().join(name);
    let script = conductor_dir.join(HEARTBEAT_SCRIPT);
    let label = heartbeat_plist_label(name);
    let script = xml_escape(path_str(&script, "heartbeat script path")?);
    let interval = interval_seconds(interval_minutes)?.to_string();
    let log_dir = xml_escape(path_str(&conductor_dir, "conductor directory")?);
    let home = xml_escape(path_str(root.home(), "home directory")?);

    Ok(render(
        HEARTBEAT_PLIST_TEMPLATE,
        &[
            ("LABEL", label.as_str()),
            ("SCRIPT_PATH", script.as_str()),
            ("INTERVAL", interval.as_str()),
            ("LOG_DIR", log_dir.as_str()),
            ("HOME", home.as_str()),
        ],
    ))
}

pub fn generate_bridge_plist(root: &ConfigRoot) -> Result<String> {
    let conductor_dir = root.conductor_dir();
    let script = conductor_dir.join(BRIDGE_SCRIPT);
    let script = xml_escape(path_str(&script, "bridge script path")?);
    let log_dir = xml_escape(path_str(&conductor_dir, "conductor directory")?);
    let home = xml_escape(path_str(root.home(), "home directory")?);

    Ok(render(
        BRIDGE_PLIST_TEMPLATE,
        &[
            ("LABEL", BRIDGE_PLIST_LABEL),
            ("SCRIPT_PATH", script.as_str()),
            ("LOG_DIR", log_dir.as_str()),
            ("HOME", home.as_str()),
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_plist_label() {
        assert_eq!(heartbeat_plist_label("test"), "com.agentdeck.conductor-heartbeat.test");
    }

    #[test]
    fn test_heartbeat_plist() {
        let root = ConfigRoot::with_home("/Users/deck");
        let plist = generate_heartbeat_plist(&root, "ops", 10).unwrap();
        assert!(!plist.contains("__"));
        assert!(plist.contains("<string>com.agentdeck.conductor-heartbeat.ops</string>"));
        assert!(plist.contains("<integer>600</integer>"));
        assert!(plist.contains("/Users/deck/.agent-deck/conductor/ops/heartbeat.sh"));
    }

    #[test]
    fn test_heartbeat_plist_interval_overflow() {
        let root = ConfigRoot::with_home("/Users/deck");
        assert!(matches!(
            generate_heartbeat_plist(&root, "ops", i64::MAX / 2),
            Err(crate::error::DeckError::Validation(_))
        ));
    }

    #[test]
    fn test_plist_escapes_paths() {
        let root = ConfigRoot::with_home("/Users/R&D");
        let plist = generate_bridge_plist(&root).unwrap();
        assert!(plist.contains("/Users/R&amp;D/.agent-deck/conductor/bridge.py"));
        assert!(!plist.contains("R&D"));
        assert!(plist.contains("<key>KeepAlive</key>"));
    }

    #[test]
    fn test_plist_paths() {
        let root = ConfigRoot::with_home("/Users/deck");
        assert_eq!(
            heartbeat_plist_path(&root, "ops"),
            PathBuf::from("/Users/deck/Library/LaunchAgents/com.agentdeck.conductor-heartbeat.ops.plist")
        );
        assert_eq!(
            bridge_plist_path(&root),
            PathBuf::from("/Users/deck/Library/LaunchAgents/com.agentdeck.conductor-bridge.plist")
        );
    }
}
