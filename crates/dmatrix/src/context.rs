//! Execution context: thread budget and device placement.

use std::fmt;

use bon::Builder;

use crate::device::DeviceCapability;
use crate::utils::resolve_threads;

/// Where a buffer lives or an operation runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Device {
    #[default]
    Cpu,
    Cuda(i32),
}

impl Device {
    #[inline]
    pub fn is_cpu(self) -> bool {
        matches!(self, Device::Cpu)
    }

    #[inline]
    pub fn is_cuda(self) -> bool {
        matches!(self, Device::Cuda(_))
    }

    /// Host data is compatible with every device; otherwise both sides must agree.
    #[inline]
    pub fn is_compatible_with(self, other: Device) -> bool {
        self.is_cpu() || other.is_cpu() || self == other
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}

/// Runtime parameters shared by every operation of the data layer.
///
/// # Example
///
/// ```
/// use dmatrix::Context;
///
/// let ctx = Context::builder().n_threads(4).build();
/// assert_eq!(ctx.threads(), 4);
/// ```
#[derive(Clone, Debug, Builder)]
pub struct Context {
    /// Worker threads per parallel region (`0` = all cores).
    #[builder(default)]
    pub n_threads: usize,
    #[builder(default)]
    pub device: Device,
}

impl Default for Context {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Context {
    /// A host context with the given thread budget.
    pub fn cpu(n_threads: usize) -> Self {
        Self::builder().n_threads(n_threads).build()
    }

    /// Resolved number of worker threads, never zero.
    #[inline]
    pub fn threads(&self) -> usize {
        resolve_threads(self.n_threads)
    }

    #[inline]
    pub fn is_cuda(&self) -> bool {
        self.device.is_cuda()
    }

    /// Request `device` against the process-wide capability probe.
    pub fn on_device(self, device: Device) -> Self {
        self.with_device(device, crate::device::capability())
    }

    /// Request `device`, falling back to the host when no accelerator driver
    /// is available.
    pub fn with_device(mut self, device: Device, capability: &DeviceCapability) -> Self {
        if device.is_cuda() && !capability.is_available() {
            tracing::warn!(%device, "no accelerator driver found, falling back to cpu");
            self.device = Device::Cpu;
        } else {
            self.device = device;
        }
        self
    }
}
