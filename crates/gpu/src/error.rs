use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    /// The permit or the memory headroom was not obtained in time.
    #[error("Timed out after {}s waiting for {resource}", .waited.as_secs())]
    ResourceTimeout {
        resource: &'static str,
        waited: Duration,
    },

    #[error("GPU arbiter is closed")]
    Closed,
}
