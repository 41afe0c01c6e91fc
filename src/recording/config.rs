//! Recording session parameters and statistics

use crate::config::{FailurePolicy, RecordingSettings};
use crate::types::Geometry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Everything a capture loop needs to know about its session
#[derive(Debug, Clone)]
pub(crate) struct SessionParams {
    pub session_id: String,
    pub output_path: PathBuf,
    pub fps: u32,
    pub region: Option<Geometry>,
    pub pause_poll_interval: Duration,
    pub failure_policy: FailurePolicy,
}

impl SessionParams {
    pub fn new(
        session_id: String,
        output_path: PathBuf,
        fps: u32,
        region: Option<Geometry>,
        settings: &RecordingSettings,
    ) -> Self {
        Self {
            session_id,
            output_path,
            fps,
            region,
            pause_poll_interval: Duration::from_millis(settings.pause_poll_interval_ms.max(1)),
            failure_policy: settings.failure_policy,
        }
    }
}

/// State shared between the control thread and one capture loop.
///
/// The two flags are independent; neither update needs to be combined with
/// the other, so plain atomics are enough and the control thread never
/// blocks on the loop. Counters are for observation only.
#[derive(Debug)]
pub struct SessionFlags {
    recording: AtomicBool,
    paused: AtomicBool,
    capture_attempts: AtomicU64,
    frames_written: AtomicU64,
    capture_failures: AtomicU64,
    sink_failures: AtomicU64,
}

impl SessionFlags {
    pub(crate) fn new_recording() -> Self {
        Self {
            recording: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            capture_attempts: AtomicU64::new(0),
            frames_written: AtomicU64::new(0),
            capture_failures: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub(crate) fn clear_recording(&self) {
        self.recording.store(false, Ordering::Release);
    }

    pub(crate) fn record_attempt(&self) {
        self.capture_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_written(&self) {
        self.frames_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_capture_failure(&self) -> u64 {
        self.capture_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_sink_failure(&self) -> u64 {
        self.sink_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn counters(&self) -> SessionCounters {
        SessionCounters {
            capture_attempts: self.capture_attempts.load(Ordering::Relaxed),
            frames_written: self.frames_written.load(Ordering::Relaxed),
            capture_failures: self.capture_failures.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of a live session's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounters {
    /// Capture cycles started (successful or not)
    pub capture_attempts: u64,
    /// Frames accepted by the sink, repeats included
    pub frames_written: u64,
    pub capture_failures: u64,
    pub sink_failures: u64,
}

/// Statistics returned when a capture loop exits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingStats {
    pub session_id: String,
    pub output_path: String,
    pub started_at: DateTime<Utc>,
    pub target_fps: u32,
    pub geometry: Option<Geometry>,
    /// Frames accepted by the sink, repeats included
    pub frames_written: u64,
    /// Frames re-emitted under `FailurePolicy::RepeatLast`
    pub repeated_frames: u64,
    pub capture_failures: u64,
    pub sink_failures: u64,
    /// Seconds spent paused
    pub paused_secs: f64,
    /// Recording time with pauses excluded
    pub duration_secs: f64,
    /// Average frames per second over `duration_secs`
    pub actual_fps: f64,
    /// Why the session ended early, if it did
    pub error: Option<String>,
}

impl RecordingStats {
    pub(crate) fn new(params: &SessionParams) -> Self {
        Self {
            session_id: params.session_id.clone(),
            output_path: params.output_path.to_string_lossy().to_string(),
            started_at: Utc::now(),
            target_fps: params.fps,
            geometry: None,
            frames_written: 0,
            repeated_frames: 0,
            capture_failures: 0,
            sink_failures: 0,
            paused_secs: 0.0,
            duration_secs: 0.0,
            actual_fps: 0.0,
            error: None,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }
}
