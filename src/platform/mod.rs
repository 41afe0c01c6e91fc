//! Display-surface primitives
//!
//! A [`DisplayBackend`] hands out [`FrameSurface`]s: an off-screen surface of a
//! fixed geometry whose pixel memory can be refreshed from the display with a
//! single blit. Backends own all platform handles behind RAII guards so the
//! engine never touches raw resources directly.

use crate::errors::CaptureError;
use crate::types::Geometry;
use std::sync::Arc;

pub mod synthetic;
#[cfg(target_os = "windows")]
pub mod windows;

pub use synthetic::{AcquireStage, SyntheticDisplay};
#[cfg(target_os = "windows")]
pub use self::windows::GdiBackend;

/// Source of display surfaces.
pub trait DisplayBackend: Send + Sync {
    /// Short backend name for logs and `framegrab-cli info`
    fn name(&self) -> &'static str;

    /// Geometry of the primary display
    fn screen_geometry(&self) -> Result<Geometry, CaptureError>;

    /// Acquire every resource needed to capture frames of `geometry`.
    ///
    /// Either all resources are acquired or none are: a failure part-way
    /// releases whatever was already acquired before returning.
    fn open_surface(&self, geometry: Geometry) -> Result<Box<dyn FrameSurface>, CaptureError>;
}

/// An off-screen surface bound to one geometry.
///
/// Dropping the surface releases its resources in reverse acquisition order.
pub trait FrameSurface: Send {
    /// Copy the current display contents into the backing memory.
    fn blit(&mut self) -> Result<(), CaptureError>;

    /// Live view of the backing memory, exactly `geometry.buffer_size()` bytes.
    fn pixels(&self) -> &[u8];
}

/// Backend used when the caller does not supply one.
///
/// GDI on Windows; elsewhere a 1920x1080 synthetic display.
pub fn default_backend() -> Arc<dyn DisplayBackend> {
    #[cfg(target_os = "windows")]
    {
        Arc::new(GdiBackend::new())
    }

    #[cfg(not(target_os = "windows"))]
    {
        log::info!("No native display capture on this platform, using synthetic display");
        Arc::new(SyntheticDisplay::default())
    }
}
