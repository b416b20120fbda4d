//! Companion agent deployment.
//!
//! The agent is a scrcpy server started in control-only mode. It injects the
//! touch events it receives on an abstract socket, which adb forwards to a
//! local TCP port.

use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::process::Child;

use anyhow::{bail, Result};
use tracing::info;

use super::bridge::AdbBridge;

pub const DEFAULT_REMOTE_PATH: &str = "/data/local/tmp/scrcpy-server-manual.jar";
pub const DEFAULT_VERSION: &str = "3.3.4";
pub const DEFAULT_PORT: u16 = 27183;
pub const DEFAULT_SOCKET_NAME: &str = "scrcpy";

/// File name looked up in the work directory when no agent path is given.
const DEFAULT_LOCAL_NAME: &str = "scrcpy-server";

const SERVER_CLASS: &str = "com.genymobile.scrcpy.Server";

/// Where the agent lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub local_path: PathBuf,
    pub remote_path: String,
    /// Must match the version the agent binary was built as.
    pub version: String,
    pub port: u16,
    pub socket_name: String,
}

impl AgentConfig {
    /// Resolve the local agent binary.
    ///
    /// Priority: `--agent`, then `NONOPAINT_AGENT` (ignored when empty), then
    /// `scrcpy-server` in the work directory.
    pub fn resolve(explicit: Option<&Path>, work_dir: &Path) -> Self {
        let local_path = explicit
            .map(Path::to_path_buf)
            .or_else(|| {
                env::var("NONOPAINT_AGENT")
                    .ok()
                    .filter(|v| !v.is_empty())
                    .map(PathBuf::from)
            })
            .unwrap_or_else(|| work_dir.join(DEFAULT_LOCAL_NAME));

        Self {
            local_path,
            remote_path: DEFAULT_REMOTE_PATH.to_string(),
            version: DEFAULT_VERSION.to_string(),
            port: DEFAULT_PORT,
            socket_name: DEFAULT_SOCKET_NAME.to_string(),
        }
    }

    /// Arguments for `adb shell` that start the agent.
    pub fn server_command(&self) -> Vec<String> {
        let mut args = vec![
            format!("CLASSPATH={}", self.remote_path),
            "app_process".to_string(),
            "/".to_string(),
            SERVER_CLASS.to_string(),
            self.version.clone(),
        ];
        args.extend(
            [
                "tunnel_forward=true",
                "audio=false",
                "video=false",
                "cleanup=false",
                "send_device_meta=false",
                "send_frame_meta=false",
                "send_dummy_byte=true",
            ]
            .map(String::from),
        );
        args
    }

    pub fn local_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.port))
    }
}

/// Brings a companion agent up and tells the session where to dial.
pub(crate) trait AgentLauncher {
    /// Copy the agent onto the device.
    async fn deploy(&self) -> Result<()>;

    /// Make the agent's socket reachable locally and return its address.
    async fn forward(&self) -> Result<SocketAddr>;

    /// Start the agent. The returned process lives as long as the session.
    fn spawn(&self) -> Result<Child>;
}

/// Launches the scrcpy server through adb.
pub struct ScrcpyLauncher<'a> {
    bridge: &'a AdbBridge,
    config: &'a AgentConfig,
}

impl<'a> ScrcpyLauncher<'a> {
    pub fn new(bridge: &'a AdbBridge, config: &'a AgentConfig) -> Self {
        Self { bridge, config }
    }
}

impl AgentLauncher for ScrcpyLauncher<'_> {
    async fn deploy(&self) -> Result<()> {
        if !self.config.local_path.is_file() {
            bail!(
                "Agent binary not found at {} (pass --agent or set NONOPAINT_AGENT to a scrcpy-server {} build)",
                self.config.local_path.display(),
                self.config.version
            );
        }
        info!(
            "Pushing {} to {}",
            self.config.local_path.display(),
            self.config.remote_path
        );
        self.bridge
            .push(&self.config.local_path, &self.config.remote_path)
            .await
    }

    async fn forward(&self) -> Result<SocketAddr> {
        self.bridge
            .forward(self.config.port, &self.config.socket_name)
            .await?;
        Ok(self.config.local_addr())
    }

    fn spawn(&self) -> Result<Child> {
        self.bridge.shell_spawn(&self.config.server_command())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_agent_path() {
        let config = AgentConfig::resolve(Some(Path::new("/opt/scrcpy-server")), Path::new("/work"));
        assert_eq!(config.local_path, PathBuf::from("/opt/scrcpy-server"));
        assert_eq!(config.local_addr().to_string(), "127.0.0.1:27183");
    }

    #[test]
    fn test_server_command() {
        let config = AgentConfig::resolve(Some(Path::new("/opt/agent")), Path::new("/work"));
        let command = config.server_command();
        assert_eq!(
            command[..5],
            [
                "CLASSPATH=/data/local/tmp/scrcpy-server-manual.jar",
                "app_process",
                "/",
                "com.genymobile.scrcpy.Server",
                "3.3.4",
            ]
        );
        assert!(command.contains(&"tunnel_forward=true".to_string()));
        assert!(command.contains(&"video=false".to_string()));
        assert_eq!(command.last().map(String::as_str), Some("send_dummy_byte=true"));
    }
}
