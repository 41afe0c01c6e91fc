//! Tests for the exported C ABI
//!
//! The recording exports share one process-wide controller, so tests that
//! touch it hold `CONTROLLER_LOCK`.

use framegrab::ffi::{
    expected_buffer_size, framegrab_last_error, global_controller, grab_frame, init_engine,
    is_capturing, pause_capture, release_engine, start_capture, stop_capture,
};
use framegrab::testing::wait_until;
use std::ffi::CString;
use std::sync::{Mutex, Once};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

static CONTROLLER_LOCK: Mutex<()> = Mutex::new(());
static CONFIG: Once = Once::new();

/// Point the global controller at a small capture region before first use.
fn small_region_config() {
    CONFIG.call_once(|| {
        let path = std::env::temp_dir().join(format!("framegrab-ffi-{}.toml", std::process::id()));
        std::fs::write(&path, "[capture]\nregion = [64, 48]\n").unwrap();
        std::env::set_var(framegrab::config::CONFIG_ENV_VAR, &path);
    });
}

fn lock_controller() -> std::sync::MutexGuard<'static, ()> {
    small_region_config();
    CONTROLLER_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn attempts() -> u64 {
    global_controller()
        .session_counters()
        .map(|c| c.capture_attempts)
        .unwrap_or(0)
}

#[test]
fn full_hd_grab_then_release() {
    small_region_config();
    let handle = init_engine(1920, 1080);
    assert!(!handle.is_null());
    assert_eq!(expected_buffer_size(handle), 1920 * 1080 * 4);

    let mut buffer = vec![0u8; 1920 * 1080 * 4];
    let ok = unsafe { grab_frame(handle, buffer.as_mut_ptr(), buffer.len()) };
    assert!(ok);
    assert_eq!(framegrab_last_error(), 0);

    release_engine(handle);
    let ok = unsafe { grab_frame(handle, buffer.as_mut_ptr(), buffer.len()) };
    assert!(!ok);
    assert_eq!(framegrab_last_error(), 3);
    assert_eq!(expected_buffer_size(handle), 0);

    // Releasing twice is harmless
    release_engine(handle);
}

#[test]
fn invalid_geometry_returns_null() {
    small_region_config();
    for (w, h) in [(0, 1080), (1920, 0), (-1, -1)] {
        assert!(init_engine(w, h).is_null());
        assert_eq!(framegrab_last_error(), 1);
    }
}

#[test]
fn small_or_null_buffers_are_rejected() {
    small_region_config();
    let handle = init_engine(16, 16);
    assert!(!handle.is_null());

    let mut buffer = vec![0xEEu8; 16 * 16 * 4 - 1];
    let ok = unsafe { grab_frame(handle, buffer.as_mut_ptr(), buffer.len()) };
    assert!(!ok);
    assert_eq!(framegrab_last_error(), 3);
    assert!(buffer.iter().all(|b| *b == 0xEE));

    let ok = unsafe { grab_frame(handle, std::ptr::null_mut(), 16 * 16 * 4) };
    assert!(!ok);
    assert_eq!(framegrab_last_error(), 3);

    release_engine(handle);
}

#[test]
fn null_and_unknown_handles_fail() {
    let mut buffer = vec![0u8; 64];
    assert!(!unsafe { grab_frame(std::ptr::null_mut(), buffer.as_mut_ptr(), buffer.len()) });
    assert_eq!(framegrab_last_error(), 3);

    let bogus = 0xDEAD_BEEF_usize as *mut std::ffi::c_void;
    assert!(!unsafe { grab_frame(bogus, buffer.as_mut_ptr(), buffer.len()) });
    assert!(buffer.iter().all(|b| *b == 0));

    release_engine(std::ptr::null_mut());
    release_engine(bogus);
}

#[test]
fn handles_are_independent() {
    small_region_config();
    let a = init_engine(8, 8);
    let b = init_engine(4, 4);
    assert_ne!(a, b);

    release_engine(a);
    let mut buffer = vec![0u8; 4 * 4 * 4];
    assert!(unsafe { grab_frame(b, buffer.as_mut_ptr(), buffer.len()) });
    release_engine(b);
}

#[test]
fn start_pause_stop_scenario() {
    let _guard = lock_controller();
    let dir = tempfile::tempdir().unwrap();
    let output = CString::new(dir.path().join("out.bin").to_string_lossy().as_bytes()).unwrap();

    unsafe { start_capture(output.as_ptr(), 30) };
    assert_eq!(framegrab_last_error(), 0);
    assert!(is_capturing());
    assert!(wait_until(WAIT, || attempts() >= 2));

    pause_capture(true);
    std::thread::sleep(Duration::from_millis(80));
    let paused_at = attempts();
    // Longer than one 33ms frame interval
    std::thread::sleep(Duration::from_millis(120));
    assert_eq!(attempts(), paused_at);

    pause_capture(false);
    assert!(wait_until(WAIT, || attempts() > paused_at));

    stop_capture();
    assert!(!is_capturing());
    let stats = global_controller().wait_stopped(WAIT).unwrap().unwrap();
    assert!(stats.is_clean());
    assert!(stats.frames_written >= 3);

    let bytes = std::fs::read(dir.path().join("out.bin")).unwrap();
    assert_eq!(bytes.len() as u64, stats.frames_written * 64 * 48 * 4);
}

#[test]
fn invalid_fps_and_paths_are_reported() {
    let _guard = lock_controller();

    let output = CString::new("ignored.bin").unwrap();
    unsafe { start_capture(output.as_ptr(), 0) };
    assert_eq!(framegrab_last_error(), 5);
    assert!(!is_capturing());

    unsafe { start_capture(std::ptr::null(), 30) };
    assert_eq!(framegrab_last_error(), 3);
    assert!(!is_capturing());
}

#[test]
fn out_of_state_calls_are_no_ops() {
    let _guard = lock_controller();

    stop_capture();
    pause_capture(true);
    pause_capture(false);
    assert_eq!(framegrab_last_error(), 0);
    assert!(!is_capturing());
}
