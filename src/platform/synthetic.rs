//! In-memory display backend
//!
//! Renders a deterministic BGRA pattern instead of reading a real screen.
//! Used on hosts without a native capture path and by tests, which rely on
//! its resource accounting and fault injection.

use super::{DisplayBackend, FrameSurface};
use crate::errors::CaptureError;
use crate::types::{Geometry, BYTES_PER_PIXEL};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Resources acquired by `open_surface`, in acquisition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcquireStage {
    DisplaySource,
    CompatibleSurface,
    PixelBitmap,
}

impl AcquireStage {
    const ALL: [AcquireStage; 3] = [
        AcquireStage::DisplaySource,
        AcquireStage::CompatibleSurface,
        AcquireStage::PixelBitmap,
    ];

    fn index(self) -> usize {
        match self {
            AcquireStage::DisplaySource => 0,
            AcquireStage::CompatibleSurface => 1,
            AcquireStage::PixelBitmap => 2,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code.checked_sub(1)? as usize).copied()
    }
}

/// Colour of pixel (x, y) on the `frame`-th blit (1-based), as B, G, R, A.
pub fn pattern_pixel(x: u32, y: u32, frame: u64) -> [u8; 4] {
    let shift = (frame % 256) as u8;
    [
        (x as u8).wrapping_add(shift),
        y as u8,
        (x.wrapping_add(y)) as u8,
        0xFF,
    ]
}

#[derive(Debug)]
struct Accounting {
    live: [AtomicUsize; 3],
    // 0 = no fault, otherwise AcquireStage index + 1
    fail_stage: AtomicU8,
    fail_blits: AtomicBool,
    blits: AtomicU64,
    release_log: Mutex<Vec<AcquireStage>>,
}

/// Synthetic display with resource counters. Clones share state.
#[derive(Debug, Clone)]
pub struct SyntheticDisplay {
    screen: Geometry,
    accounting: Arc<Accounting>,
}

impl SyntheticDisplay {
    pub fn new(screen: Geometry) -> Self {
        Self {
            screen,
            accounting: Arc::new(Accounting {
                live: [AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0)],
                fail_stage: AtomicU8::new(0),
                fail_blits: AtomicBool::new(false),
                blits: AtomicU64::new(0),
                release_log: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Make the next acquisitions fail at `stage` (`None` clears the fault).
    pub fn fail_acquisition_at(&self, stage: Option<AcquireStage>) {
        let code = stage.map(|s| s.index() as u8 + 1).unwrap_or(0);
        self.accounting.fail_stage.store(code, Ordering::SeqCst);
    }

    /// Make every blit fail until cleared.
    pub fn fail_blits(&self, fail: bool) {
        self.accounting.fail_blits.store(fail, Ordering::SeqCst);
    }

    /// Number of live resources of one kind
    pub fn live(&self, stage: AcquireStage) -> usize {
        self.accounting.live[stage.index()].load(Ordering::SeqCst)
    }

    /// Number of live resources of every kind
    pub fn live_resources(&self) -> usize {
        AcquireStage::ALL.iter().map(|s| self.live(*s)).sum()
    }

    /// Successful blits across all surfaces
    pub fn blit_count(&self) -> u64 {
        self.accounting.blits.load(Ordering::SeqCst)
    }

    /// Every release so far, in the order it happened
    pub fn release_log(&self) -> Vec<AcquireStage> {
        self.accounting
            .release_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn acquire(&self, stage: AcquireStage) -> Result<Guard, CaptureError> {
        let failing = AcquireStage::from_code(self.accounting.fail_stage.load(Ordering::SeqCst));
        if failing == Some(stage) {
            return Err(CaptureError::ResourceAcquisitionFailure(format!(
                "synthetic fault injected at {:?}",
                stage
            )));
        }
        self.accounting.live[stage.index()].fetch_add(1, Ordering::SeqCst);
        Ok(Guard {
            stage,
            accounting: self.accounting.clone(),
        })
    }
}

impl Default for SyntheticDisplay {
    fn default() -> Self {
        Self::new(Geometry::FULL_HD)
    }
}

impl DisplayBackend for SyntheticDisplay {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn screen_geometry(&self) -> Result<Geometry, CaptureError> {
        Ok(self.screen)
    }

    fn open_surface(&self, geometry: Geometry) -> Result<Box<dyn FrameSurface>, CaptureError> {
        let source = self.acquire(AcquireStage::DisplaySource)?;
        let surface = self.acquire(AcquireStage::CompatibleSurface)?;
        let bitmap_guard = self.acquire(AcquireStage::PixelBitmap)?;

        let mut pixels = Vec::new();
        pixels.try_reserve_exact(geometry.buffer_size()).map_err(|e| {
            CaptureError::ResourceAcquisitionFailure(format!(
                "cannot allocate {} frame: {}",
                geometry, e
            ))
        })?;
        pixels.resize(geometry.buffer_size(), 0);

        Ok(Box::new(SyntheticSurface {
            bitmap: Bitmap {
                pixels,
                _guard: bitmap_guard,
            },
            _surface: surface,
            _source: source,
            geometry,
            frames: 0,
            accounting: self.accounting.clone(),
        }))
    }
}

#[derive(Debug)]
struct Guard {
    stage: AcquireStage,
    accounting: Arc<Accounting>,
}

impl Drop for Guard {
    fn drop(&mut self) {
        self.accounting.live[self.stage.index()].fetch_sub(1, Ordering::SeqCst);
        self.accounting
            .release_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(self.stage);
    }
}

struct Bitmap {
    pixels: Vec<u8>,
    _guard: Guard,
}

// Field order is drop order: bitmap, then surface, then source.
struct SyntheticSurface {
    bitmap: Bitmap,
    _surface: Guard,
    _source: Guard,
    geometry: Geometry,
    frames: u64,
    accounting: Arc<Accounting>,
}

impl FrameSurface for SyntheticSurface {
    fn blit(&mut self) -> Result<(), CaptureError> {
        if self.accounting.fail_blits.load(Ordering::SeqCst) {
            return Err(CaptureError::CaptureFailure(
                "synthetic blit fault injected".to_string(),
            ));
        }

        self.frames += 1;
        let width = self.geometry.width() as usize;
        for (i, px) in self.bitmap.pixels.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            let x = (i % width) as u32;
            let y = (i / width) as u32;
            px.copy_from_slice(&pattern_pixel(x, y, self.frames));
        }
        self.accounting.blits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pixels(&self) -> &[u8] {
        &self.bitmap.pixels
    }
}
