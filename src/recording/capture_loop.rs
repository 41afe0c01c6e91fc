//! The background capture loop run by a recording session

use super::config::{RecordingStats, SessionFlags, SessionParams};
use super::sink::{FrameSink, SinkFactory};
use crate::config::FailurePolicy;
use crate::engine::CaptureContext;
use crate::errors::RecordingError;
use crate::platform::DisplayBackend;
use crate::timing::{frame_interval, FramePacer, SessionClock};
use crate::types::Frame;
use std::sync::Arc;

/// Failures are logged at warn level for the first few, then only periodically.
const FAILURE_LOG_EVERY: u64 = 100;

fn should_log_failure(count: u64) -> bool {
    count <= 3 || count % FAILURE_LOG_EVERY == 0
}

/// Run one session until its `recording` flag is cleared.
///
/// Setup failures end the session on the spot: the flag is cleared so the
/// controller reports idle, and the reason is carried in the returned stats.
pub(crate) fn run(
    params: SessionParams,
    flags: Arc<SessionFlags>,
    backend: Arc<dyn DisplayBackend>,
    sink_factory: SinkFactory,
) -> RecordingStats {
    let mut stats = RecordingStats::new(&params);

    let (mut context, mut sink) = match setup(&params, backend.as_ref(), &sink_factory) {
        Ok(parts) => parts,
        Err(e) => {
            log::error!("Recording {} failed to start: {}", params.session_id, e);
            flags.clear_recording();
            stats.error = Some(e.to_string());
            return stats;
        }
    };

    let geometry = context.geometry();
    stats.geometry = Some(geometry);
    log::info!(
        "Recording {} started: {} at {} fps to {:?}",
        params.session_id,
        geometry,
        params.fps,
        params.output_path
    );

    let mut buffer = vec![0u8; geometry.buffer_size()];
    let mut have_frame = false;
    let mut sequence: u64 = 0;
    let mut clock = SessionClock::new();
    let mut pacer = FramePacer::new(frame_interval(params.fps));

    while flags.is_recording() {
        if flags.is_paused() {
            if !clock.is_paused() {
                clock.pause();
                log::debug!("Recording {} paused", params.session_id);
            }
            std::thread::sleep(params.pause_poll_interval);
            continue;
        }

        if clock.is_paused() {
            clock.resume();
            pacer.reset();
            log::debug!("Recording {} resumed", params.session_id);
        }

        flags.record_attempt();
        let emit = match context.grab_frame(&mut buffer) {
            Ok(()) => {
                have_frame = true;
                true
            }
            Err(e) => {
                stats.capture_failures += 1;
                let count = flags.record_capture_failure();
                if should_log_failure(count) {
                    log::warn!(
                        "Recording {}: frame capture failed ({} so far): {}",
                        params.session_id,
                        count,
                        e
                    );
                }
                let repeat = params.failure_policy == FailurePolicy::RepeatLast && have_frame;
                if repeat {
                    stats.repeated_frames += 1;
                }
                repeat
            }
        };

        if emit {
            sequence += 1;
            let frame = Frame {
                sequence,
                timestamp_us: clock.elapsed().as_micros() as u64,
                geometry,
                data: &buffer,
            };
            match sink.write_frame(&frame) {
                Ok(()) => {
                    stats.frames_written += 1;
                    flags.record_written();
                }
                Err(e) => {
                    stats.sink_failures += 1;
                    let count = flags.record_sink_failure();
                    if should_log_failure(count) {
                        log::warn!(
                            "Recording {}: sink rejected frame {}: {}",
                            params.session_id,
                            sequence,
                            e
                        );
                    }
                }
            }
        }

        pacer.wait();
    }

    if let Err(e) = sink.finish() {
        log::error!("Recording {}: failed to finish output: {}", params.session_id, e);
        stats.error = Some(e.to_string());
    }
    context.release();

    clock.resume();
    stats.paused_secs = clock.paused_total().as_secs_f64();
    stats.duration_secs = clock.elapsed().as_secs_f64();
    if stats.duration_secs > 0.0 {
        stats.actual_fps = stats.frames_written as f64 / stats.duration_secs;
    }

    log::info!(
        "Recording {} stopped: {} frames in {:.2}s ({:.1} fps), {} capture failures, {} sink failures",
        stats.session_id,
        stats.frames_written,
        stats.duration_secs,
        stats.actual_fps,
        stats.capture_failures,
        stats.sink_failures
    );

    stats
}

fn setup(
    params: &SessionParams,
    backend: &dyn DisplayBackend,
    sink_factory: &SinkFactory,
) -> Result<(CaptureContext, Box<dyn FrameSink>), RecordingError> {
    let geometry = match params.region {
        Some(region) => region,
        None => backend.screen_geometry()?,
    };
    let context = CaptureContext::open(backend, geometry)?;
    let sink = sink_factory(&params.output_path, geometry, params.fps)?;
    Ok((context, sink))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_log_throttle() {
        assert!(should_log_failure(1));
        assert!(should_log_failure(3));
        assert!(!should_log_failure(4));
        assert!(!should_log_failure(99));
        assert!(should_log_failure(100));
        assert!(should_log_failure(200));
    }
}
