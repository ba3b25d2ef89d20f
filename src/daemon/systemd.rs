use std::path::{Path, PathBuf};

use crate::conductor::{validate_conductor_name, ConfigRoot, DEFAULT_HEARTBEAT_INTERVAL, HEARTBEAT_SCRIPT};
use crate::error::{DeckError, Result};
use crate::template::render;

use super::BRIDGE_SCRIPT;

pub const BRIDGE_SERVICE_NAME: &str = "agent-deck-conductor-bridge.service";
const HEARTBEAT_UNIT_PREFIX: &str = "agent-deck-conductor-heartbeat-";

const HEARTBEAT_TIMER_TEMPLATE: &str = r#"[Unit]
Description=Agent Deck conductor heartbeat timer (__NAME__)

[Timer]
OnBootSec=__INTERVAL__
OnUnitActiveSec=__INTERVAL__
Unit=__SERVICE__
AccuracySec=30s

[Install]
WantedBy=timers.target
"#;

const HEARTBEAT_SERVICE_TEMPLATE: &str = r#"[Unit]
Description=Agent Deck conductor heartbeat (__NAME__)

[Service]
Type=oneshot
ExecStart=/bin/bash "__SCRIPT_PATH__"
Environment=HOME=__HOME__
Environment=PATH=__HOME__/.local/bin:/usr/local/bin:/usr/bin:/bin
"#;

const BRIDGE_SERVICE_TEMPLATE: &str = r#"[Unit]
Description=Agent Deck conductor bridge
After=network-online.target
Wants=network-online.target

[Service]
Type=simple
ExecStart=/usr/bin/env python3 "__SCRIPT_PATH__"
Restart=always
RestartSec=10
Environment=HOME=__HOME__
Environment=PATH=__HOME__/.local/bin:/usr/local/bin:/usr/bin:/bin

[Install]
WantedBy=default.target
"#;

pub fn systemd_heartbeat_service_name(name: &str) -> String {
    format!("{HEARTBEAT_UNIT_PREFIX}{name}.service")
}

pub fn systemd_heartbeat_timer_name(name: &str) -> String {
    format!("{HEARTBEAT_UNIT_PREFIX}{name}.timer")
}

/// `~/.config/systemd/user`
pub fn systemd_user_dir(root: &ConfigRoot) -> PathBuf {
    root.home().join(".config").join("systemd").join("user")
}

/// The bridge serves every conductor, so its unit has no per-conductor suffix
pub fn systemd_bridge_service_path(root: &ConfigRoot) -> PathBuf {
    systemd_user_dir(root).join(BRIDGE_SERVICE_NAME)
}

pub fn systemd_heartbeat_service_path(root: &ConfigRoot, name: &str) -> PathBuf {
    systemd_user_dir(root).join(systemd_heartbeat_service_name(name))
}

pub fn systemd_heartbeat_timer_path(root: &ConfigRoot, name: &str) -> PathBuf {
    systemd_user_dir(root).join(systemd_heartbeat_timer_name(name))
}

/// Heartbeat interval in seconds; non-positive minutes mean the default
pub(crate) fn interval_seconds(interval_minutes: i64) -> Result<i64> {
    let minutes = if interval_minutes <= 0 {
        DEFAULT_HEARTBEAT_INTERVAL
    } else {
        interval_minutes
    };
    minutes.checked_mul(60).ok_or_else(|| {
        DeckError::Validation(format!(
            "heartbeat interval of {interval_minutes} minutes is too large"
        ))
    })
}

pub fn generate_systemd_heartbeat_timer(name: &str, interval_minutes: i64) -> Result<String> {
    validate_conductor_name(name)?;
    let interval = format!("{}s", interval_seconds(interval_minutes)?);
    let service = systemd_heartbeat_service_name(name);
    Ok(render(
        HEARTBEAT_TIMER_TEMPLATE,
        &[("NAME", name), ("SERVICE", service.as_str()), ("INTERVAL", interval.as_str())],
    ))
}

pub(crate) fn path_str<'a>(path: &'a Path, what: &str) -> Result<&'a str> {
    path.to_str().ok_or_else(|| {
        DeckError::Config(format!(
            "cannot resolve {what}: {} is not valid UTF-8",
            path.display()
        ))
    })
}

pub fn generate_systemd_heartbeat_service(root: &ConfigRoot, name: &str) -> Result<String> {
    validate_conductor_name(name)?;
    let script = root.conductor_dir().join(name).join(HEARTBEAT_SCRIPT);
    let script = path_str(&script, "heartbeat script path")?;
    let home = path_str(root.home(), "home directory")?;

    Ok(render(
        HEARTBEAT_SERVICE_TEMPLATE,
        &[("NAME", name), ("SCRIPT_PATH", script), ("HOME", home)],
    ))
}

pub fn generate_systemd_bridge_service(root: &ConfigRoot) -> Result<String> {
    let script = root.conductor_dir().join(BRIDGE_SCRIPT);
    let script = path_str(&script, "bridge script path")?;
    let home = path_str(root.home(), "home directory")?;

    Ok(render(
        BRIDGE_SERVICE_TEMPLATE,
        &[("SCRIPT_PATH", script), ("HOME", home)],
    ))
}
