// Windows display capture through GDI

mod gdi;

pub use gdi::GdiSurface;

use super::{DisplayBackend, FrameSurface};
use crate::errors::CaptureError;
use crate::types::Geometry;
use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

/// GDI-backed capture of the primary display
#[derive(Debug, Default, Clone, Copy)]
pub struct GdiBackend;

impl GdiBackend {
    pub fn new() -> Self {
        Self
    }
}

impl DisplayBackend for GdiBackend {
    fn name(&self) -> &'static str {
        "gdi"
    }

    fn screen_geometry(&self) -> Result<Geometry, CaptureError> {
        let (width, height) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        log::debug!("Primary display metrics: {}x{}", width, height);
        Geometry::new(width, height).map_err(|_| {
            CaptureError::ResourceAcquisitionFailure(format!(
                "GetSystemMetrics reported unusable screen size {}x{}",
                width, height
            ))
        })
    }

    fn open_surface(&self, geometry: Geometry) -> Result<Box<dyn FrameSurface>, CaptureError> {
        log::debug!("Opening GDI surface {}", geometry);
        Ok(Box::new(GdiSurface::open(geometry)?))
    }
}
