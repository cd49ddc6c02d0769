//! Accelerator capability provider.
//!
//! The capability is probed at most once per process and is read-only
//! afterwards. A failed probe never aborts the data layer: it yields
//! [`DeviceCapability::absent`].

use std::process::Command;
use std::sync::OnceLock;

/// What the accelerator driver on this machine offers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceCapability {
    /// Driver version `(major, minor)` of the first visible device.
    pub driver_version: Option<(i32, i32)>,
    /// Number of chip-to-chip links reported for the first device.
    pub c2c_link_count: Option<u32>,
}

impl DeviceCapability {
    /// No accelerator present, or probing failed.
    pub const fn absent() -> Self {
        Self {
            driver_version: None,
            c2c_link_count: None,
        }
    }

    /// Returns `true` if a driver was found.
    pub fn is_available(&self) -> bool {
        self.driver_version.is_some()
    }

    /// Query the driver through `nvidia-smi`.
    pub fn probe() -> Self {
        let Some(out) = command_output("nvidia-smi", &["--query-gpu=driver_version", "--format=csv"])
        else {
            return Self::absent();
        };
        let Some(driver_version) = parse_driver_version(&out) else {
            return Self::absent();
        };
        tracing::info!(major = driver_version.0, minor = driver_version.1, "driver version");

        let c2c_link_count = command_output("nvidia-smi", &["c2c", "-s", "-i", "0"])
            .and_then(|out| parse_c2c_link_count(&out));

        Self {
            driver_version: Some(driver_version),
            c2c_link_count,
        }
    }
}

/// The process-wide capability, probed on first use.
pub fn capability() -> &'static DeviceCapability {
    static CAPABILITY: OnceLock<DeviceCapability> = OnceLock::new();
    CAPABILITY.get_or_init(DeviceCapability::probe)
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

/// Parse the CSV output of `nvidia-smi --query-gpu=driver_version --format=csv`.
///
/// ```text
/// driver_version
/// 570.124.06
/// 570.124.06
/// ```
///
/// Only the first device is considered. Two-component versions (`573.24`)
/// are accepted as well.
pub fn parse_driver_version(smi_output: &str) -> Option<(i32, i32)> {
    let mut lines = smi_output.lines();
    let _header = lines.next()?;
    let first = lines.next()?.trim();
    let parts: Vec<&str> = first.split('.').collect();
    if parts.len() != 2 && parts.len() != 3 {
        return None;
    }
    let major = parts[0].parse().ok()?;
    let minor = parts[1].parse().ok()?;
    Some((major, minor))
}

/// Parse the output of `nvidia-smi c2c -s -i 0`: a header line followed by
/// one line per link.
pub fn parse_c2c_link_count(smi_output: &str) -> Option<u32> {
    let lines: Vec<&str> = smi_output.trim().lines().collect();
    if lines.len() <= 1 {
        return None;
    }
    u32::try_from(lines.len() - 1).ok()
}
