//! Optional Tracy instrumentation

// Re-export the profile_zone macro
pub use crate::profile_zone;

// No-op macro when tracy disabled
#[cfg(not(feature = "tracy"))]
#[macro_export]
macro_rules! profile_zone {
    ($name:expr) => {};
}

#[cfg(feature = "tracy")]
#[macro_export]
macro_rules! profile_zone {
    ($name:expr) => {
        let _tracy_zone = tracy_client::span!($name);
    };
}

/// Start the Tracy client if the feature is enabled
#[cfg(feature = "tracy")]
pub fn start_profiler() {
    tracy_client::Client::start();
    tracing::info!("Tracy profiler client started");
}

#[cfg(not(feature = "tracy"))]
pub fn start_profiler() {}

/// Mark the end of an application frame
#[cfg(feature = "tracy")]
pub fn mark_frame() {
    tracy_client::frame_mark();
}

#[cfg(not(feature = "tracy"))]
pub fn mark_frame() {}
