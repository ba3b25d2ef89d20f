//! Unit definitions for running conductor heartbeats and the bridge under the
//! host service manager. Generation only: nothing here calls systemctl or
//! launchctl, and writing a generated unit is a separate step.

mod launchd;
mod systemd;

use std::fmt;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use tracing::{debug, info};

use crate::conductor::{validate_conductor_name, ConfigRoot};
use crate::error::{DeckError, Result};
use crate::fsutil::write_atomic;

pub use launchd::{
    bridge_plist_path, generate_bridge_plist, generate_heartbeat_plist, heartbeat_plist_label,
    heartbeat_plist_path, launch_agents_dir, BRIDGE_PLIST_LABEL,
};
pub use systemd::{
    generate_systemd_bridge_service, generate_systemd_heartbeat_service,
    generate_systemd_heartbeat_timer, systemd_bridge_service_path, systemd_heartbeat_service_name,
    systemd_heartbeat_service_path, systemd_heartbeat_timer_name, systemd_heartbeat_timer_path,
    systemd_user_dir, BRIDGE_SERVICE_NAME,
};

/// Bridge process script, shared by all conductors
pub const BRIDGE_SCRIPT: &str = "bridge.py";

static HOST_PLATFORM: Lazy<DaemonPlatform> = Lazy::new(DaemonPlatform::detect);

/// Service manager available on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonPlatform {
    Systemd,
    Launchd,
    Unsupported,
}

impl DaemonPlatform {
    pub fn detect() -> Self {
        if cfg!(target_os = "linux") {
            DaemonPlatform::Systemd
        } else if cfg!(target_os = "macos") {
            DaemonPlatform::Launchd
        } else {
            DaemonPlatform::Unsupported
        }
    }

    fn backend(self) -> Box<dyn DaemonBackend> {
        match self {
            DaemonPlatform::Systemd => Box::new(SystemdBackend),
            DaemonPlatform::Launchd => Box::new(LaunchdBackend),
            DaemonPlatform::Unsupported => Box::new(UnsupportedBackend),
        }
    }
}

impl fmt::Display for DaemonPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DaemonPlatform::Systemd => "systemd",
            DaemonPlatform::Launchd => "launchd",
            DaemonPlatform::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// A generated unit and where it belongs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFile {
    pub path: PathBuf,
    pub contents: String,
}

trait DaemonBackend: Send + Sync {
    fn heartbeat_units(&self, root: &ConfigRoot, name: &str, interval_minutes: i64) -> Result<Vec<UnitFile>>;
    fn bridge_units(&self, root: &ConfigRoot) -> Result<Vec<UnitFile>>;
    fn heartbeat_hint(&self, name: &str) -> String;
    fn bridge_hint(&self) -> String;
}

struct SystemdBackend;

impl DaemonBackend for SystemdBackend {
    fn heartbeat_units(&self, root: &ConfigRoot, name: &str, interval_minutes: i64) -> Result<Vec<UnitFile>> {
        Ok(vec![
            UnitFile {
                path: systemd_heartbeat_service_path(root, name),
                contents: generate_systemd_heartbeat_service(root, name)?,
            },
            UnitFile {
                path: systemd_heartbeat_timer_path(root, name),
                contents: generate_systemd_heartbeat_timer(name, interval_minutes)?,
            },
        ])
    }

    fn bridge_units(&self, root: &ConfigRoot) -> Result<Vec<UnitFile>> {
        Ok(vec![UnitFile {
            path: systemd_bridge_service_path(root),
            contents: generate_systemd_bridge_service(root)?,
        }])
    }

    fn heartbeat_hint(&self, name: &str) -> String {
        format!(
            "systemctl --user daemon-reload && systemctl --user enable --now {}",
            systemd_heartbeat_timer_name(name)
        )
    }

    fn bridge_hint(&self) -> String {
        format!(
            "Enable the conductor bridge with: systemctl --user daemon-reload && systemctl --user enable --now {BRIDGE_SERVICE_NAME}"
        )
    }
}

struct LaunchdBackend;

impl DaemonBackend for LaunchdBackend {
    fn heartbeat_units(&self, root: &ConfigRoot, name: &str, interval_minutes: i64) -> Result<Vec<UnitFile>> {
        Ok(vec![UnitFile {
            path: heartbeat_plist_path(root, name),
            contents: generate_heartbeat_plist(root, name, interval_minutes)?,
        }])
    }

    fn bridge_units(&self, root: &ConfigRoot) -> Result<Vec<UnitFile>> {
        Ok(vec![UnitFile {
            path: bridge_plist_path(root),
            contents: generate_bridge_plist(root)?,
        }])
    }

    fn heartbeat_hint(&self, name: &str) -> String {
        format!(
            "launchctl load ~/Library/LaunchAgents/{}.plist",
            heartbeat_plist_label(name)
        )
    }

    fn bridge_hint(&self) -> String {
        format!("Load the conductor bridge with: launchctl load ~/Library/LaunchAgents/{BRIDGE_PLIST_LABEL}.plist")
    }
}

struct UnsupportedBackend;

impl DaemonBackend for UnsupportedBackend {
    fn heartbeat_units(&self, _root: &ConfigRoot, _name: &str, _interval_minutes: i64) -> Result<Vec<UnitFile>> {
        Err(DeckError::Config(
            "heartbeat daemons need systemd or launchd".to_string(),
        ))
    }

    fn bridge_units(&self, _root: &ConfigRoot) -> Result<Vec<UnitFile>> {
        Err(DeckError::Config(
            "the bridge daemon needs systemd or launchd".to_string(),
        ))
    }

    fn heartbeat_hint(&self, name: &str) -> String {
        format!("Schedule ~/.agent-deck/conductor/{name}/heartbeat.sh with your own scheduler (e.g. cron)")
    }

    fn bridge_hint(&self) -> String {
        format!("No service manager support on this platform; run the bridge manually: python3 ~/.agent-deck/conductor/{BRIDGE_SCRIPT}")
    }
}

/// Generates heartbeat and bridge units for the platform chosen at construction
pub struct DaemonScheduler {
    root: ConfigRoot,
    platform: DaemonPlatform,
    backend: Box<dyn DaemonBackend>,
}

impl DaemonScheduler {
    pub fn new(root: ConfigRoot) -> Self {
        Self::for_platform(root, *HOST_PLATFORM)
    }

    pub fn for_platform(root: ConfigRoot, platform: DaemonPlatform) -> Self {
        debug!(%platform, "Selected daemon backend");
        Self {
            root,
            platform,
            backend: platform.backend(),
        }
    }

    pub fn platform(&self) -> DaemonPlatform {
        self.platform
    }

    pub fn heartbeat_units(&self, name: &str, interval_minutes: i64) -> Result<Vec<UnitFile>> {
        validate_conductor_name(name)?;
        self.backend.heartbeat_units(&self.root, name, interval_minutes)
    }

    pub fn bridge_units(&self) -> Result<Vec<UnitFile>> {
        self.backend.bridge_units(&self.root)
    }

    pub fn heartbeat_hint(&self, name: &str) -> String {
        self.backend.heartbeat_hint(name)
    }

    pub fn bridge_hint(&self) -> String {
        self.backend.bridge_hint()
    }
}

impl fmt::Debug for DaemonScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaemonScheduler")
            .field("root", &self.root)
            .field("platform", &self.platform)
            .finish()
    }
}

/// Instructions for starting the bridge on this host
pub fn bridge_daemon_hint() -> String {
    HOST_PLATFORM.backend().bridge_hint()
}

/// Persist one generated unit, replacing any previous version atomically
pub async fn write_unit_file(unit: &UnitFile) -> Result<()> {
    write_atomic(&unit.path, unit.contents.clone(), None).await?;
    info!(path = %unit.path.display(), "Wrote unit file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_daemon_hint_never_empty() {
        assert!(!bridge_daemon_hint().is_empty());
        for platform in [DaemonPlatform::Systemd, DaemonPlatform::Launchd, DaemonPlatform::Unsupported] {
            let scheduler = DaemonScheduler::for_platform(ConfigRoot::with_home("/h"), platform);
            assert!(!scheduler.bridge_hint().is_empty(), "{platform}");
            assert!(!scheduler.heartbeat_hint("ops").is_empty(), "{platform}");
        }
    }

    #[test]
    fn test_systemd_heartbeat_units() {
        let scheduler = DaemonScheduler::for_platform(ConfigRoot::with_home("/h"), DaemonPlatform::Systemd);
        let units = scheduler.heartbeat_units("ops", 5).unwrap();
        assert_eq!(units.len(), 2);
        assert!(units[0].path.ends_with("agent-deck-conductor-heartbeat-ops.service"));
        assert!(units[0].contents.contains("Type=oneshot"));
        assert!(units[1].path.ends_with("agent-deck-conductor-heartbeat-ops.timer"));
        assert!(units[1].contents.contains("300s"));
    }

    #[test]
    fn test_launchd_units() {
        let scheduler = DaemonScheduler::for_platform(ConfigRoot::with_home("/h"), DaemonPlatform::Launchd);
        let units = scheduler.heartbeat_units("ops", 15).unwrap();
        assert_eq!(units.len(), 1);
        assert!(units[0].contents.contains("<integer>900</integer>"));

        let bridge = scheduler.bridge_units().unwrap();
        assert!(bridge[0].path.ends_with("com.agentdeck.conductor-bridge.plist"));
    }

    #[test]
    fn test_unsupported_platform_errors() {
        let scheduler = DaemonScheduler::for_platform(ConfigRoot::with_home("/h"), DaemonPlatform::Unsupported);
        assert!(matches!(scheduler.heartbeat_units("ops", 15), Err(DeckError::Config(_))));
        assert!(matches!(scheduler.bridge_units(), Err(DeckError::Config(_))));
    }

    #[test]
    fn test_heartbeat_units_validate_name() {
        let scheduler = DaemonScheduler::for_platform(ConfigRoot::with_home("/h"), DaemonPlatform::Systemd);
        assert!(matches!(
            scheduler.heartbeat_units("bad/name", 15),
            Err(DeckError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_write_unit_file() {
        let home = tempfile::tempdir().unwrap();
        let scheduler = DaemonScheduler::for_platform(ConfigRoot::with_home(home.path()), DaemonPlatform::Systemd);
        for unit in scheduler.bridge_units().unwrap() {
            write_unit_file(&unit).await.unwrap();
            assert_eq!(std::fs::read_to_string(&unit.path).unwrap(), unit.contents);
        }
        assert!(home
            .path()
            .join(".config/systemd/user/agent-deck-conductor-bridge.service")
            .exists());
    }
}
