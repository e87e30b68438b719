//! Accelerator arbitration for GPU-bound jobs.
//!
//! [`GpuArbiter`] owns the single-slot permit that serializes GPU work across
//! jobs and the headroom loop that evicts idle LLM weights until enough
//! accelerator memory is free. Memory figures come from a [`MemoryProbe`]
//! (NVML in production) and eviction goes through a [`ModelEvictor`]
//! (the Ollama client in production).

pub mod arbiter;
pub mod error;
pub mod evictor;
pub mod probe;

pub use arbiter::{GpuArbiter, GpuPermit, HeadroomConfig};
pub use error::GpuError;
pub use evictor::ModelEvictor;
pub use probe::{MemoryInfo, MemoryProbe, NvmlMemoryProbe};
