//! Thin wrapper around the `adb` executable.
//!
//! Input sent through `adb shell input` takes a few hundred milliseconds per
//! event, so it is only used for one-off taps and swipes. Painting goes
//! through a [`TouchSession`](super::session::TouchSession) instead.

use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use nonopaint_core::geometry::Point;
use nonopaint_core::raster::RasterImage;
use serde::Serialize;
use tokio::process::Command;
use tracing::debug;

/// State reported by `adb devices` for a ready device.
const READY_STATE: &str = "device";

/// One line of `adb devices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub serial: String,
    /// `device`, `unauthorized`, `offline`, ...
    pub state: String,
}

impl DeviceInfo {
    pub fn is_ready(&self) -> bool {
        self.state == READY_STATE
    }
}

/// Parse the output of `adb devices`.
///
/// Skips the header, daemon startup notices and blank lines.
pub fn parse_devices(output: &str) -> Vec<DeviceInfo> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let serial = fields.next()?;
            let state = fields.next()?;
            Some(DeviceInfo {
                serial: serial.to_string(),
                state: state.to_string(),
            })
        })
        .collect()
}

/// Handle to the adb executable, optionally pinned to one device.
#[derive(Debug, Clone)]
pub struct AdbBridge {
    program: PathBuf,
    serial: Option<String>,
}

impl AdbBridge {
    pub fn new(program: impl Into<PathBuf>, serial: Option<String>) -> Self {
        Self {
            program: program.into(),
            serial,
        }
    }

    fn device_args(&self) -> Vec<String> {
        match &self.serial {
            Some(serial) => vec!["-s".to_string(), serial.clone()],
            None => Vec::new(),
        }
    }

    /// Run adb to completion and return its stdout.
    async fn run<S: AsRef<str>>(&self, args: &[S]) -> Result<Vec<u8>> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        debug!("adb {}", args.join(" "));

        let output = Command::new(&self.program)
            .args(self.device_args())
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.program.display()))?;

        if !output.status.success() {
            bail!(
                "adb {} exited with {}: {}",
                args.first().copied().unwrap_or_default(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output.stdout)
    }

    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        let output = Command::new(&self.program)
            .arg("devices")
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.program.display()))?;
        if !output.status.success() {
            bail!("adb devices exited with {}", output.status);
        }
        Ok(parse_devices(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Whether the target device (or, without a serial, any device) is ready.
    pub async fn has_device(&self) -> Result<bool> {
        let devices = self.list_devices().await?;
        Ok(devices
            .iter()
            .filter(|d| d.is_ready())
            .any(|d| self.serial.as_deref().map_or(true, |s| s == d.serial)))
    }

    /// Grab the current screen as PNG and decode it in memory.
    pub async fn capture_screenshot(&self) -> Result<RasterImage> {
        let png = self.run(&["exec-out", "screencap", "-p"]).await?;
        let screen = RasterImage::decode(&png).context("Failed to decode screenshot")?;
        debug!("captured {}x{} screenshot", screen.width(), screen.height());
        Ok(screen)
    }

    pub async fn tap(&self, point: Point) -> Result<()> {
        let (x, y) = (point.x.to_string(), point.y.to_string());
        self.run(&["shell", "input", "tap", x.as_str(), y.as_str()])
            .await?;
        Ok(())
    }

    pub async fn swipe(&self, from: Point, to: Point, duration: Duration) -> Result<()> {
        let args = [
            "shell".to_string(),
            "input".to_string(),
            "swipe".to_string(),
            from.x.to_string(),
            from.y.to_string(),
            to.x.to_string(),
            to.y.to_string(),
            duration.as_millis().to_string(),
        ];
        self.run(&args).await?;
        Ok(())
    }

    /// Copy a local file to the device.
    pub async fn push(&self, local: &Path, remote: &str) -> Result<()> {
        let local = local.to_string_lossy();
        self.run(&["push", &*local, remote]).await?;
        Ok(())
    }

    /// Forward a local TCP port to an abstract socket on the device.
    pub async fn forward(&self, port: u16, socket_name: &str) -> Result<()> {
        let local = format!("tcp:{}", port);
        let remote = format!("localabstract:{}", socket_name);
        self.run(&["forward", local.as_str(), remote.as_str()])
            .await?;
        Ok(())
    }

    /// Start a long-running `adb shell` command.
    ///
    /// The caller owns the child and must reap it.
    pub fn shell_spawn(&self, args: &[String]) -> Result<Child> {
        debug!("adb shell {}", args.join(" "));
        std::process::Command::new(&self.program)
            .args(self.device_args())
            .arg("shell")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to spawn {} shell", self.program.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_devices() {
        let output = "\
* daemon not running; starting now at tcp:5037
* daemon started successfully
List of devices attached
R58M123ABC\tdevice
emulator-5554\toffline
0123456789\tunauthorized usb:1-1 transport_id:3

";
        let devices = parse_devices(output);
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0].serial, "R58M123ABC");
        assert!(devices[0].is_ready());
        assert!(!devices[1].is_ready());
        assert_eq!(devices[2].state, "unauthorized");
    }

    #[test]
    fn test_parse_devices_empty() {
        assert!(parse_devices("List of devices attached\n\n").is_empty());
    }

    #[test]
    fn test_parse_devices_long_format() {
        let devices = parse_devices(
            "List of devices attached\nR58M123ABC    device product:a52q model:SM_A525F\n",
        );
        assert_eq!(
            devices,
            vec![DeviceInfo {
                serial: "R58M123ABC".into(),
                state: "device".into()
            }]
        );
    }

    #[test]
    fn test_serial_is_passed_first() {
        let bridge = AdbBridge::new("adb", Some("emulator-5554".into()));
        assert_eq!(bridge.device_args(), vec!["-s", "emulator-5554"]);
        assert!(AdbBridge::new("adb", None).device_args().is_empty());
    }
}
