//! Accelerator memory queries.
//!
//! [`NvmlMemoryProbe`] reads free/total VRAM from the NVIDIA Management
//! Library. Initialisation is gracefully optional: on a host without NVIDIA
//! drivers the probe logs a warning once and reports
//! [`MemoryInfo::UNAVAILABLE`], which the arbiter treats as "unconstrained".

use nvml_wrapper::Nvml;
use serde::Serialize;

/// Free and total accelerator memory in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryInfo {
    pub free: u64,
    pub total: u64,
}

impl MemoryInfo {
    /// Reported when no accelerator can be queried.
    pub const UNAVAILABLE: MemoryInfo = MemoryInfo { free: 0, total: 0 };

    pub fn is_unconstrained(&self) -> bool {
        self.free == 0 && self.total == 0
    }

    pub fn free_gib(&self) -> f64 {
        self.free as f64 / BYTES_PER_GIB
    }

    pub fn total_gib(&self) -> f64 {
        self.total as f64 / BYTES_PER_GIB
    }
}

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Source of accelerator memory figures.
pub trait MemoryProbe: Send + Sync {
    /// Current memory of the device, or [`MemoryInfo::UNAVAILABLE`].
    fn memory_info(&self) -> MemoryInfo;
}

/// NVML-backed probe for a single device.
pub struct NvmlMemoryProbe {
    /// `None` when NVML could not be initialised (no drivers / no GPU).
    nvml: Option<Nvml>,
    device_index: u32,
}

impl Default for NvmlMemoryProbe {
    fn default() -> Self {
        Self::new(0)
    }
}

impl NvmlMemoryProbe {
    /// Attempt to initialise NVML for `device_index`.
    pub fn new(device_index: u32) -> Self {
        let nvml = match Nvml::init() {
            Ok(nvml) => {
                tracing::info!(device_index, "NVML initialised successfully");
                Some(nvml)
            }
            Err(e) => {
                tracing::warn!(error = %e, "NVML unavailable -- GPU memory will be treated as unconstrained");
                None
            }
        };
        Self { nvml, device_index }
    }

    pub fn is_available(&self) -> bool {
        self.nvml.is_some()
    }

    fn query(&self, nvml: &Nvml) -> Result<MemoryInfo, nvml_wrapper::error::NvmlError> {
        let device = nvml.device_by_index(self.device_index)?;
        let mem = device.memory_info()?;
        Ok(MemoryInfo {
            free: mem.free,
            total: mem.total,
        })
    }
}

impl MemoryProbe for NvmlMemoryProbe {
    fn memory_info(&self) -> MemoryInfo {
        let Some(nvml) = self.nvml.as_ref() else {
            return MemoryInfo::UNAVAILABLE;
        };
        match self.query(nvml) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(device_index = self.device_index, error = %e, "GPU memory query failed");
                MemoryInfo::UNAVAILABLE
            }
        }
    }
}
