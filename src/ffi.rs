//! C ABI exported from the shared library
//!
//! Engine handles are opaque tokens, not pointers. Each one indexes a
//! process-wide table, so a released, unknown or null handle is rejected
//! instead of dereferenced. Every export catches panics and reports them as
//! failure; no panic crosses the boundary.
//!
//! Each call clears the calling thread's error code first, and a failing call
//! leaves its code behind for `framegrab_last_error`:
//!
//! | code | meaning                       |
//! |------|-------------------------------|
//! | 0    | no error                      |
//! | 1    | invalid geometry              |
//! | 2    | resource acquisition failure  |
//! | 3    | precondition violation        |
//! | 4    | capture failure               |
//! | 5    | invalid configuration         |
//! | 6    | internal error                |

use crate::config::FramegrabConfig;
use crate::engine::CaptureContext;
use crate::errors::{CaptureError, RecordingError};
use crate::recording::{RecordingController, StartOutcome};
use std::cell::Cell;
use std::collections::HashMap;
use std::ffi::{c_char, c_void, CStr};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const ERR_NONE: i32 = 0;
const ERR_INTERNAL: i32 = 6;

thread_local! {
    static LAST_ERROR: Cell<i32> = const { Cell::new(ERR_NONE) };
}

#[derive(Default)]
struct HandleTable {
    next_id: usize,
    contexts: HashMap<usize, Arc<Mutex<CaptureContext>>>,
}

lazy_static::lazy_static! {
    static ref HANDLES: Mutex<HandleTable> = Mutex::new(HandleTable {
        next_id: 1,
        contexts: HashMap::new(),
    });

    static ref CONFIG: FramegrabConfig = {
        let config = FramegrabConfig::load_or_default();
        crate::init_logging_with(&config.logging.filter);
        config
    };

    static ref CONTROLLER: RecordingController = RecordingController::from_config(&CONFIG);
}

/// Configuration the exports run with; first access starts logging with its filter
pub fn ffi_config() -> &'static FramegrabConfig {
    &CONFIG
}

/// The controller behind `start_capture`, `pause_capture` and `stop_capture`
pub fn global_controller() -> &'static RecordingController {
    &CONTROLLER
}

fn handles() -> MutexGuard<'static, HandleTable> {
    HANDLES.lock().unwrap_or_else(PoisonError::into_inner)
}

fn set_last_error(code: i32) {
    LAST_ERROR.with(|cell| cell.set(code));
}

fn fail_capture(op: &str, err: &CaptureError) {
    log::debug!("{} failed: {}", op, err);
    set_last_error(err.code());
}

fn fail_recording(op: &str, err: &RecordingError) {
    log::warn!("{} failed: {}", op, err);
    set_last_error(err.code());
}

/// Run an export body with a fresh error code and no unwinding past the boundary.
fn guarded<T>(op: &str, on_panic: T, body: impl FnOnce() -> T) -> T {
    set_last_error(ERR_NONE);
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => value,
        Err(_) => {
            log::error!("panic in {}", op);
            set_last_error(ERR_INTERNAL);
            on_panic
        }
    }
}

fn lookup(handle: *mut c_void) -> Result<Arc<Mutex<CaptureContext>>, CaptureError> {
    if handle.is_null() {
        return Err(CaptureError::PreconditionViolation("null handle".to_string()));
    }
    handles()
        .contexts
        .get(&(handle as usize))
        .cloned()
        .ok_or_else(|| {
            CaptureError::PreconditionViolation(format!(
                "unknown or released handle {:#x}",
                handle as usize
            ))
        })
}

/// Create a capture context of `width` x `height` pixels.
///
/// Returns null on failure.
#[no_mangle]
pub extern "C" fn init_engine(width: i32, height: i32) -> *mut c_void {
    guarded("init_engine", std::ptr::null_mut(), || {
        ffi_config();
        match CaptureContext::init(width, height) {
            Ok(context) => {
                let mut table = handles();
                let id = table.next_id;
                table.next_id += 1;
                table.contexts.insert(id, Arc::new(Mutex::new(context)));
                log::info!("Engine {} initialised at {}x{}", id, width, height);
                id as *mut c_void
            }
            Err(e) => {
                fail_capture("init_engine", &e);
                std::ptr::null_mut()
            }
        }
    })
}

/// Capture one frame into `buffer`.
///
/// Fails without writing when the handle is not live, `buffer` is null or
/// `buffer_capacity` is smaller than the frame.
///
/// # Safety
///
/// When non-null, `buffer` must be valid for writes of `buffer_capacity`
/// bytes for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn grab_frame(
    handle: *mut c_void,
    buffer: *mut u8,
    buffer_capacity: usize,
) -> bool {
    guarded("grab_frame", false, || {
        let context = match lookup(handle) {
            Ok(context) => context,
            Err(e) => {
                fail_capture("grab_frame", &e);
                return false;
            }
        };
        let mut context = context.lock().unwrap_or_else(PoisonError::into_inner);

        let expected = context.expected_buffer_size();
        if buffer.is_null() {
            fail_capture(
                "grab_frame",
                &CaptureError::PreconditionViolation("null buffer".to_string()),
            );
            return false;
        }
        if buffer_capacity < expected {
            fail_capture(
                "grab_frame",
                &CaptureError::PreconditionViolation(format!(
                    "buffer capacity {} below frame size {}",
                    buffer_capacity, expected
                )),
            );
            return false;
        }

        // SAFETY: buffer is non-null and the caller guarantees buffer_capacity
        // writable bytes, of which we borrow the first `expected`.
        let out = unsafe { std::slice::from_raw_parts_mut(buffer, expected) };
        match context.grab_frame(out) {
            Ok(()) => true,
            Err(e) => {
                fail_capture("grab_frame", &e);
                false
            }
        }
    })
}

/// Release a capture context. Null, unknown and already released handles are ignored.
#[no_mangle]
pub extern "C" fn release_engine(handle: *mut c_void) {
    guarded("release_engine", (), || {
        if handle.is_null() {
            return;
        }
        let removed = handles().contexts.remove(&(handle as usize));
        match removed {
            Some(context) => {
                context
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .release();
                log::info!("Engine {} released", handle as usize);
            }
            None => log::debug!("release_engine: handle {:#x} not live", handle as usize),
        }
    })
}

/// Frame size in bytes for a live handle, 0 otherwise
#[no_mangle]
pub extern "C" fn expected_buffer_size(handle: *mut c_void) -> usize {
    guarded("expected_buffer_size", 0, || match lookup(handle) {
        Ok(context) => context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .expected_buffer_size(),
        Err(e) => {
            fail_capture("expected_buffer_size", &e);
            0
        }
    })
}

/// Start recording to `output_path` (UTF-8, NUL-terminated) at `fps`.
///
/// A no-op while a session is already recording.
///
/// # Safety
///
/// When non-null, `output_path` must point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn start_capture(output_path: *const c_char, fps: i32) {
    guarded("start_capture", (), || {
        if output_path.is_null() {
            fail_capture(
                "start_capture",
                &CaptureError::PreconditionViolation("null output path".to_string()),
            );
            return;
        }
        // SAFETY: non-null, and the caller guarantees NUL termination.
        let path = match unsafe { CStr::from_ptr(output_path) }.to_str() {
            Ok(path) => path.to_string(),
            Err(e) => {
                fail_recording(
                    "start_capture",
                    &RecordingError::InvalidConfiguration(format!("output path is not UTF-8: {}", e)),
                );
                return;
            }
        };

        match global_controller().start(&path, fps) {
            Ok(StartOutcome::Started { session_id }) => {
                log::info!("start_capture: session {} recording to {}", session_id, path)
            }
            Ok(StartOutcome::AlreadyActive) => {
                log::debug!("start_capture ignored, already recording")
            }
            Err(e) => fail_recording("start_capture", &e),
        }
    })
}

/// Signal the active session to stop. A no-op when idle.
#[no_mangle]
pub extern "C" fn stop_capture() {
    guarded("stop_capture", (), || {
        if !global_controller().stop() {
            log::debug!("stop_capture ignored, not recording");
        }
    })
}

/// Pause (`true`) or resume (`false`) the active session. A no-op when idle.
#[no_mangle]
pub extern "C" fn pause_capture(pause: bool) {
    guarded("pause_capture", (), || {
        if !global_controller().pause(pause) {
            log::debug!("pause_capture ignored, not recording");
        }
    })
}

/// True while a session is recording, paused or not
#[no_mangle]
pub extern "C" fn is_capturing() -> bool {
    guarded("is_capturing", false, || global_controller().is_recording())
}

/// Error code left by the calling thread's last framegrab call
#[no_mangle]
pub extern "C" fn framegrab_last_error() -> i32 {
    LAST_ERROR.with(|cell| cell.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guarded_converts_panic() {
        let value = guarded("test", 7, || panic!("boom"));
        assert_eq!(value, 7);
        assert_eq!(framegrab_last_error(), ERR_INTERNAL);

        let value = guarded("test", 7, || 1);
        assert_eq!(value, 1);
        assert_eq!(framegrab_last_error(), ERR_NONE);
    }

    #[test]
    fn test_exports_use_loaded_config() {
        let expected = FramegrabConfig::load_or_default();
        assert_eq!(ffi_config().logging.filter, expected.logging.filter);
        assert_eq!(
            global_controller().settings().default_fps,
            expected.recording.default_fps
        );
    }

    #[test]
    fn test_lookup_rejects_unknown_handles() {
        assert!(lookup(std::ptr::null_mut()).is_err());
        assert!(lookup(usize::MAX as *mut c_void).is_err());
    }
}
