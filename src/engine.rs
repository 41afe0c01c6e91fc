//! Capture engine
//!
//! A [`CaptureContext`] is one live capture session bound to a fixed geometry.
//! It owns a [`FrameSurface`] from a display backend and copies the surface's
//! pixels into caller memory, refusing any call that could write out of bounds.
//!
//! A context is not meant for concurrent `grab_frame` calls; `&mut self`
//! enforces that inside Rust, and the FFI handle table serializes access per
//! handle at the boundary.

use crate::errors::CaptureError;
use crate::platform::{default_backend, DisplayBackend, FrameSurface};
use crate::types::Geometry;

/// One capture session: `active` until [`CaptureContext::release`], then `released`.
pub struct CaptureContext {
    geometry: Geometry,
    surface: Option<Box<dyn FrameSurface>>,
    frames_grabbed: u64,
}

impl CaptureContext {
    /// Create a context on the platform's default display backend.
    pub fn init(width: i32, height: i32) -> Result<Self, CaptureError> {
        Self::init_with(default_backend().as_ref(), width, height)
    }

    /// Create a context on `backend`.
    ///
    /// Fails with `InvalidGeometry` for non-positive dimensions, before any
    /// resource is touched; acquisition failures leave nothing allocated.
    pub fn init_with(
        backend: &dyn DisplayBackend,
        width: i32,
        height: i32,
    ) -> Result<Self, CaptureError> {
        let geometry = Geometry::new(width, height)?;
        Self::open(backend, geometry)
    }

    pub(crate) fn open(backend: &dyn DisplayBackend, geometry: Geometry) -> Result<Self, CaptureError> {
        let surface = backend.open_surface(geometry)?;

        if surface.pixels().len() != geometry.buffer_size() {
            return Err(CaptureError::ResourceAcquisitionFailure(format!(
                "{} backend returned {} bytes of pixel memory for {} (expected {})",
                backend.name(),
                surface.pixels().len(),
                geometry,
                geometry.buffer_size()
            )));
        }

        log::debug!(
            "Capture context {} ready on {} backend ({} bytes/frame)",
            geometry,
            backend.name(),
            geometry.buffer_size()
        );

        Ok(Self {
            geometry,
            surface: Some(surface),
            frames_grabbed: 0,
        })
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Exact number of bytes one `grab_frame` writes
    pub fn expected_buffer_size(&self) -> usize {
        self.geometry.buffer_size()
    }

    pub fn is_active(&self) -> bool {
        self.surface.is_some()
    }

    pub fn frames_grabbed(&self) -> u64 {
        self.frames_grabbed
    }

    /// Capture the display and copy exactly `expected_buffer_size()` bytes into `buffer`.
    ///
    /// Bytes of `buffer` beyond the frame are left untouched. On any error
    /// nothing is written.
    pub fn grab_frame(&mut self, buffer: &mut [u8]) -> Result<(), CaptureError> {
        let expected = self.geometry.buffer_size();

        let surface = self.surface.as_mut().ok_or_else(|| {
            CaptureError::PreconditionViolation("capture context has been released".to_string())
        })?;

        if buffer.len() < expected {
            return Err(CaptureError::PreconditionViolation(format!(
                "buffer holds {} bytes, {} frame needs {}",
                buffer.len(),
                self.geometry,
                expected
            )));
        }

        surface.blit()?;

        buffer[..expected].copy_from_slice(&surface.pixels()[..expected]);
        self.frames_grabbed += 1;
        Ok(())
    }

    /// Release all backing resources. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(surface) = self.surface.take() {
            drop(surface);
            log::debug!(
                "Released capture context {} after {} frames",
                self.geometry,
                self.frames_grabbed
            );
        }
    }
}

impl Drop for CaptureContext {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for CaptureContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureContext")
            .field("geometry", &self.geometry)
            .field("active", &self.is_active())
            .field("frames_grabbed", &self.frames_grabbed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::synthetic::{pattern_pixel, AcquireStage, SyntheticDisplay};

    fn display() -> SyntheticDisplay {
        SyntheticDisplay::new(Geometry::new(320, 240).unwrap())
    }

    #[test]
    fn test_init_rejects_bad_geometry_without_allocating() {
        let display = display();
        for (w, h) in [(0, 10), (10, 0), (-1, 10), (10, -7), (0, 0)] {
            let result = CaptureContext::init_with(&display, w, h);
            assert!(matches!(result, Err(CaptureError::InvalidGeometry(_))));
        }
        assert_eq!(display.live_resources(), 0);
        assert!(display.release_log().is_empty());
    }

    #[test]
    fn test_init_failure_unwinds_partial_acquisition() {
        let display = display();
        display.fail_acquisition_at(Some(AcquireStage::PixelBitmap));
        let result = CaptureContext::init_with(&display, 16, 16);
        assert!(matches!(result, Err(CaptureError::ResourceAcquisitionFailure(_))));
        assert_eq!(display.live_resources(), 0);
        assert_eq!(
            display.release_log(),
            vec![AcquireStage::CompatibleSurface, AcquireStage::DisplaySource]
        );
    }

    #[test]
    fn test_grab_frame_copies_exact_frame() {
        let display = display();
        let mut ctx = CaptureContext::init_with(&display, 4, 3).unwrap();
        let mut buffer = vec![0xABu8; ctx.expected_buffer_size() + 8];

        ctx.grab_frame(&mut buffer).unwrap();

        let geometry = ctx.geometry();
        for y in 0..3 {
            for x in 0..4 {
                let offset = geometry.pixel_offset(x, y).unwrap();
                assert_eq!(&buffer[offset..offset + 4], &pattern_pixel(x, y, 1));
            }
        }
        assert!(buffer[48..].iter().all(|b| *b == 0xAB));
        assert_eq!(ctx.frames_grabbed(), 1);
    }

    #[test]
    fn test_grab_frame_rejects_small_buffer() {
        let display = display();
        let mut ctx = CaptureContext::init_with(&display, 4, 4).unwrap();
        let mut buffer = vec![0x11u8; 63];
        let result = ctx.grab_frame(&mut buffer);
        assert!(matches!(result, Err(CaptureError::PreconditionViolation(_))));
        assert!(buffer.iter().all(|b| *b == 0x11));
        assert_eq!(display.blit_count(), 0);
    }

    #[test]
    fn test_blit_failure_copies_nothing() {
        let display = display();
        let mut ctx = CaptureContext::init_with(&display, 2, 2).unwrap();
        display.fail_blits(true);
        let mut buffer = vec![0x22u8; 16];
        assert!(matches!(
            ctx.grab_frame(&mut buffer),
            Err(CaptureError::CaptureFailure(_))
        ));
        assert!(buffer.iter().all(|b| *b == 0x22));
        assert_eq!(ctx.frames_grabbed(), 0);
    }

    #[test]
    fn test_release_is_idempotent_and_blocks_grab() {
        let display = display();
        let mut ctx = CaptureContext::init_with(&display, 8, 8).unwrap();
        ctx.release();
        ctx.release();
        assert!(!ctx.is_active());
        assert_eq!(display.live_resources(), 0);

        let mut buffer = vec![0u8; 256];
        assert!(matches!(
            ctx.grab_frame(&mut buffer),
            Err(CaptureError::PreconditionViolation(_))
        ));
        assert!(buffer.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_drop_releases_in_reverse_order() {
        let display = display();
        drop(CaptureContext::init_with(&display, 8, 8).unwrap());
        assert_eq!(
            display.release_log(),
            vec![
                AcquireStage::PixelBitmap,
                AcquireStage::CompatibleSurface,
                AcquireStage::DisplaySource
            ]
        );
    }
}
