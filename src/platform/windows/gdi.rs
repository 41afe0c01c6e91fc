use crate::platform::FrameSurface;
use crate::errors::CaptureError;
use crate::types::Geometry;
use std::ffi::c_void;
use windows::Win32::Foundation::{HANDLE, HWND};
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, GdiFlush, GetDC, ReleaseDC,
    SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, CAPTUREBLT, DIB_RGB_COLORS, HBITMAP,
    HDC, HGDIOBJ, ROP_CODE, SRCCOPY,
};

/// Device context of the whole screen, returned with `ReleaseDC`.
struct ScreenDc(HDC);

impl ScreenDc {
    fn acquire() -> Result<Self, CaptureError> {
        let hdc = unsafe { GetDC(HWND::default()) };
        if hdc.is_invalid() {
            return Err(CaptureError::ResourceAcquisitionFailure(
                "GetDC returned no screen device context".to_string(),
            ));
        }
        Ok(Self(hdc))
    }
}

impl Drop for ScreenDc {
    fn drop(&mut self) {
        unsafe {
            ReleaseDC(HWND::default(), self.0);
        }
        log::debug!("Released screen DC");
    }
}

/// Memory device context compatible with the screen, deleted with `DeleteDC`.
struct MemoryDc(HDC);

impl MemoryDc {
    fn create(screen: &ScreenDc) -> Result<Self, CaptureError> {
        let hdc = unsafe { CreateCompatibleDC(screen.0) };
        if hdc.is_invalid() {
            return Err(CaptureError::ResourceAcquisitionFailure(
                "CreateCompatibleDC failed".to_string(),
            ));
        }
        Ok(Self(hdc))
    }
}

impl Drop for MemoryDc {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteDC(self.0);
        }
        log::debug!("Deleted memory DC");
    }
}

/// 32-bit top-down DIB section selected into a memory DC.
///
/// Drop deselects the bitmap before deleting it, so it must be dropped
/// before the `MemoryDc` it was selected into.
struct DibSection {
    bitmap: HBITMAP,
    previous: HGDIOBJ,
    dc: HDC,
    bits: *mut u8,
    len: usize,
}

impl DibSection {
    fn create(memory: &MemoryDc, geometry: Geometry) -> Result<Self, CaptureError> {
        let info = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: geometry.width() as i32,
                // Negative height selects top-down row order
                biHeight: -(geometry.height() as i32),
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };

        let mut bits: *mut c_void = std::ptr::null_mut();
        let bitmap = unsafe {
            CreateDIBSection(memory.0, &info, DIB_RGB_COLORS, &mut bits, HANDLE::default(), 0)
        }
        .map_err(|e| {
            CaptureError::ResourceAcquisitionFailure(format!("CreateDIBSection failed: {}", e))
        })?;

        if bitmap.is_invalid() || bits.is_null() {
            if !bitmap.is_invalid() {
                unsafe {
                    let _ = DeleteObject(HGDIOBJ(bitmap.0));
                }
            }
            return Err(CaptureError::ResourceAcquisitionFailure(
                "CreateDIBSection returned no pixel memory".to_string(),
            ));
        }

        let previous = unsafe { SelectObject(memory.0, HGDIOBJ(bitmap.0)) };

        Ok(Self {
            bitmap,
            previous,
            dc: memory.0,
            bits: bits.cast::<u8>(),
            len: geometry.buffer_size(),
        })
    }
}

impl Drop for DibSection {
    fn drop(&mut self) {
        unsafe {
            SelectObject(self.dc, self.previous);
            let _ = DeleteObject(HGDIOBJ(self.bitmap.0));
        }
        log::debug!("Deleted DIB section");
    }
}

/// Screen capture surface: screen DC, compatible memory DC and DIB section.
///
/// Fields drop in declaration order, which releases the bitmap first, then the
/// memory DC, then the screen DC.
pub struct GdiSurface {
    dib: DibSection,
    memory: MemoryDc,
    screen: ScreenDc,
    geometry: Geometry,
}

// SAFETY: GdiSurface can be sent to another thread because:
// 1. The screen DC comes from GetDC(NULL), which is not bound to a window thread
// 2. The memory DC and DIB section are owned exclusively by this value
// 3. We do NOT implement Sync; `blit` and `pixels` need `&mut`/`&` through one owner
unsafe impl Send for GdiSurface {}

impl GdiSurface {
    pub fn open(geometry: Geometry) -> Result<Self, CaptureError> {
        let screen = ScreenDc::acquire()?;
        let memory = MemoryDc::create(&screen)?;
        let dib = DibSection::create(&memory, geometry)?;
        Ok(Self {
            dib,
            memory,
            screen,
            geometry,
        })
    }
}

impl FrameSurface for GdiSurface {
    fn blit(&mut self) -> Result<(), CaptureError> {
        // CAPTUREBLT composites layered (semi-transparent) windows
        let rop = ROP_CODE(SRCCOPY.0 | CAPTUREBLT.0);
        unsafe {
            BitBlt(
                self.memory.0,
                0,
                0,
                self.geometry.width() as i32,
                self.geometry.height() as i32,
                self.screen.0,
                0,
                0,
                rop,
            )
        }
        .map_err(|e| CaptureError::CaptureFailure(format!("BitBlt failed: {}", e)))?;

        // Pending GDI batches must land in the DIB before the bits are read
        unsafe {
            let _ = GdiFlush();
        }
        Ok(())
    }

    fn pixels(&self) -> &[u8] {
        // SAFETY: `bits` points at the DIB section's pixel memory, which holds
        // exactly `len` bytes and lives until `dib` is dropped.
        unsafe { std::slice::from_raw_parts(self.dib.bits, self.dib.len) }
    }
}
