//! framegrab: raw BGRA screen capture with a background recording controller
//!
//! The crate has two layers:
//! - [`engine::CaptureContext`] grabs single frames of the primary display into
//!   caller memory, top-down, 4 bytes per pixel in B, G, R, A order, and never
//!   writes past the frame it promised.
//! - [`recording::RecordingController`] runs one paced capture loop on a
//!   background thread that can be paused, resumed and stopped at any time.
//!
//! Both are exported through a C ABI in [`ffi`] so the library can be loaded
//! from other languages.
//!
//! # Usage
//! ```rust,ignore
//! use framegrab::engine::CaptureContext;
//!
//! let mut context = CaptureContext::init(1920, 1080)?;
//! let mut frame = vec![0u8; context.expected_buffer_size()];
//! context.grab_frame(&mut frame)?;
//! context.release();
//! ```
//!
//! On Windows frames come from GDI. Other hosts get a synthetic display so the
//! library and its tests run anywhere.

pub mod config;
pub mod engine;
pub mod errors;
pub mod ffi;
pub mod platform;
pub mod recording;
pub mod testing;
pub mod timing;
pub mod types;

// Re-exports for convenience
pub use config::FramegrabConfig;
pub use engine::CaptureContext;
pub use errors::{CaptureError, RecordingError};
pub use recording::{ControllerState, RecordingController, RecordingStats, StartOutcome};
pub use types::{Frame, Geometry, OwnedFrame};

use std::sync::Once;

static LOGGING: Once = Once::new();

/// Initialize logging with the default `framegrab=info` filter
pub fn init_logging() {
    init_logging_with(&config::LoggingSettings::default().filter);
}

/// Initialize logging; `RUST_LOG` wins over `default_filter`.
///
/// Only the first call in a process has any effect.
pub fn init_logging_with(default_filter: &str) {
    LOGGING.call_once(|| {
        let env = env_logger::Env::default().default_filter_or(default_filter);
        let _ = env_logger::Builder::from_env(env).try_init();
    });
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        backend: platform::default_backend().name().to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Display backend used when none is supplied
    pub backend: String,
}
