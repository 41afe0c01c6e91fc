//! Recording controller: start, pause and stop one background capture session

use super::capture_loop;
use super::config::{RecordingStats, SessionCounters, SessionFlags, SessionParams};
use super::sink::{sink_factory_for, SinkFactory};
use crate::config::{FramegrabConfig, RecordingSettings};
use crate::errors::RecordingError;
use crate::platform::{default_backend, DisplayBackend};
use crate::types::Geometry;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

static SESSION_SEQ: AtomicU64 = AtomicU64::new(1);

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Result of [`RecordingController::start`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started { session_id: String },
    /// A session was already recording; nothing changed
    AlreadyActive,
}

/// Observable controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Recording,
    Paused,
}

struct Session {
    id: String,
    flags: Arc<SessionFlags>,
    handle: JoinHandle<RecordingStats>,
}

#[derive(Default)]
struct ControlState {
    current: Option<Session>,
    /// Sessions told to stop (or that ended themselves) whose loop has not been joined
    retired: Vec<Session>,
    /// Stats of the newest session joined by `reap_finished`, until a wait collects them
    reaped: Option<RecordingStats>,
}

impl ControlState {
    /// Move the current session to `retired` if its loop cleared its own flag.
    fn retire_if_ended(&mut self) {
        let ended = self
            .current
            .as_ref()
            .is_some_and(|session| !session.flags.is_recording());
        if ended {
            if let Some(session) = self.current.take() {
                log::debug!("Session {} ended on its own", session.id);
                self.retired.push(session);
            }
        }
    }

    /// Join every retired loop that has already exited.
    fn reap_finished(&mut self) {
        let (finished, running): (Vec<Session>, Vec<Session>) = std::mem::take(&mut self.retired)
            .into_iter()
            .partition(|session| session.handle.is_finished());
        self.retired = running;

        for session in finished {
            match session.handle.join() {
                Ok(stats) => {
                    log::debug!(
                        "Reaped session {}: {} frames in {:.2}s",
                        stats.session_id,
                        stats.frames_written,
                        stats.duration_secs
                    );
                    self.reaped = Some(stats);
                }
                Err(_) => log::error!("Capture loop for {} panicked", session.id),
            }
        }
    }

    fn active_flags(&self) -> Option<&Arc<SessionFlags>> {
        self.current
            .as_ref()
            .map(|session| &session.flags)
            .filter(|flags| flags.is_recording())
    }
}

/// Owns at most one recording session at a time.
///
/// Control calls are cheap and never wait on the capture loop; only
/// [`RecordingController::stop_and_wait`] and
/// [`RecordingController::wait_stopped`] block, and only up to their timeout.
pub struct RecordingController {
    settings: RecordingSettings,
    region: Option<Geometry>,
    backend: Arc<dyn DisplayBackend>,
    sink_factory: SinkFactory,
    control: Mutex<ControlState>,
}

impl RecordingController {
    /// Controller on the default display backend with the configured sink
    pub fn new(settings: RecordingSettings) -> Self {
        let sink_factory = sink_factory_for(settings.sink);
        Self {
            settings,
            region: None,
            backend: default_backend(),
            sink_factory,
            control: Mutex::new(ControlState::default()),
        }
    }

    /// Controller honouring every section of `config` that applies to recording
    pub fn from_config(config: &FramegrabConfig) -> Self {
        let region = config
            .capture
            .region
            .and_then(|[w, h]| Geometry::new(w as i32, h as i32).ok());
        Self::new(config.recording.clone()).with_region(region)
    }

    pub fn with_backend(mut self, backend: Arc<dyn DisplayBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_sink_factory(mut self, sink_factory: SinkFactory) -> Self {
        self.sink_factory = sink_factory;
        self
    }

    /// Capture this size instead of the full primary display
    pub fn with_region(mut self, region: Option<Geometry>) -> Self {
        self.region = region;
        self
    }

    pub fn settings(&self) -> &RecordingSettings {
        &self.settings
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn lock_control(&self) -> MutexGuard<'_, ControlState> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start recording to `output` at `fps` frames per second.
    ///
    /// Returns `AlreadyActive` without side effects when a session is
    /// recording. The loop sets itself up in the background; setup failures
    /// end the session and show up in its stats.
    pub fn start<P: AsRef<Path>>(&self, output: P, fps: i32) -> Result<StartOutcome, RecordingError> {
        if fps <= 0 {
            return Err(RecordingError::InvalidConfiguration(format!(
                "frame rate must be positive, got {}",
                fps
            )));
        }
        let output_path: PathBuf = output.as_ref().to_path_buf();
        if output_path.as_os_str().is_empty() {
            return Err(RecordingError::InvalidConfiguration(
                "output path is empty".to_string(),
            ));
        }

        let mut control = self.lock_control();
        control.retire_if_ended();
        control.reap_finished();
        if let Some(session) = &control.current {
            log::info!("Recording already active (session {})", session.id);
            return Ok(StartOutcome::AlreadyActive);
        }

        let session_id = format!(
            "rec_{}_{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            SESSION_SEQ.fetch_add(1, Ordering::Relaxed)
        );
        let params = SessionParams::new(
            session_id.clone(),
            output_path,
            fps as u32,
            self.region,
            &self.settings,
        );
        let flags = Arc::new(SessionFlags::new_recording());

        let loop_flags = flags.clone();
        let backend = self.backend.clone();
        let sink_factory = self.sink_factory.clone();
        let handle = std::thread::Builder::new()
            .name("framegrab-capture".to_string())
            .spawn(move || capture_loop::run(params, loop_flags, backend, sink_factory))
            .map_err(|e| RecordingError::SpawnFailed(format!("capture thread: {}", e)))?;

        control.current = Some(Session {
            id: session_id.clone(),
            flags,
            handle,
        });

        Ok(StartOutcome::Started { session_id })
    }

    /// Pause (`true`) or resume (`false`) the active session.
    ///
    /// Returns `false` when no session is recording.
    pub fn pause(&self, paused: bool) -> bool {
        let control = self.lock_control();
        match control.active_flags() {
            Some(flags) => {
                flags.set_paused(paused);
                log::info!("Recording {}", if paused { "paused" } else { "resumed" });
                true
            }
            None => false,
        }
    }

    /// Signal the active session to stop. Does not wait for the loop to exit.
    ///
    /// A paused session stays paused; its loop sees the cleared flag on the
    /// next poll and exits without capturing again.
    ///
    /// Returns `false` when no session was recording.
    pub fn stop(&self) -> bool {
        let mut control = self.lock_control();
        control.retire_if_ended();
        control.reap_finished();
        match control.current.take() {
            Some(session) => {
                session.flags.clear_recording();
                log::info!("Stopping recording {}", session.id);
                control.retired.push(session);
                true
            }
            None => false,
        }
    }

    /// Stop the active session and wait up to `timeout` for every loop to exit.
    ///
    /// Returns the stats of the most recent session joined, if any.
    pub fn stop_and_wait(&self, timeout: Duration) -> Result<Option<RecordingStats>, RecordingError> {
        self.stop();
        self.wait_stopped(timeout)
    }

    /// Wait up to `timeout` for the controller to go idle and join every
    /// finished loop, without signalling anything.
    ///
    /// On `Timeout` unjoined loops are kept so a later call can retry.
    pub fn wait_stopped(&self, timeout: Duration) -> Result<Option<RecordingStats>, RecordingError> {
        let deadline = Instant::now() + timeout;

        let (pending, reaped) = loop {
            {
                let mut control = self.lock_control();
                control.retire_if_ended();
                if control.current.is_none() {
                    break (std::mem::take(&mut control.retired), control.reaped.take());
                }
            }
            if Instant::now() >= deadline {
                return Err(RecordingError::Timeout);
            }
            std::thread::sleep(JOIN_POLL_INTERVAL);
        };

        // Reaped sessions are older than anything still pending.
        Ok(self.join_sessions(pending, deadline)?.or(reaped))
    }

    fn join_sessions(
        &self,
        sessions: Vec<Session>,
        deadline: Instant,
    ) -> Result<Option<RecordingStats>, RecordingError> {
        // Sessions are retired in start order, so the last slot is the newest.
        let mut pending: Vec<Option<Session>> = sessions.into_iter().map(Some).collect();
        let mut results: Vec<Option<RecordingStats>> = vec![None; pending.len()];

        loop {
            for (slot, result) in pending.iter_mut().zip(results.iter_mut()) {
                let finished = slot.as_ref().is_some_and(|s| s.handle.is_finished());
                if !finished {
                    continue;
                }
                if let Some(session) = slot.take() {
                    match session.handle.join() {
                        Ok(stats) => *result = Some(stats),
                        Err(_) => log::error!("Capture loop for {} panicked", session.id),
                    }
                }
            }

            if pending.iter().all(Option::is_none) {
                return Ok(results.into_iter().flatten().last());
            }
            if Instant::now() >= deadline {
                let remaining: Vec<Session> = pending.into_iter().flatten().collect();
                log::warn!("{} capture loop(s) still running after timeout", remaining.len());
                self.lock_control().retired.extend(remaining);
                return Err(RecordingError::Timeout);
            }
            std::thread::sleep(JOIN_POLL_INTERVAL);
        }
    }

    pub fn state(&self) -> ControllerState {
        let control = self.lock_control();
        match control.active_flags() {
            Some(flags) if flags.is_paused() => ControllerState::Paused,
            Some(_) => ControllerState::Recording,
            None => ControllerState::Idle,
        }
    }

    /// True while a session is recording, paused or not
    pub fn is_recording(&self) -> bool {
        self.state() != ControllerState::Idle
    }

    /// Counters of the active session
    pub fn session_counters(&self) -> Option<SessionCounters> {
        self.lock_control().active_flags().map(|flags| flags.counters())
    }

    /// Loops told to stop that have not been joined yet
    pub fn unjoined_loops(&self) -> usize {
        self.lock_control().retired.len()
    }

    /// Id of the active session
    pub fn session_id(&self) -> Option<String> {
        let control = self.lock_control();
        control
            .current
            .as_ref()
            .filter(|session| session.flags.is_recording())
            .map(|session| session.id.clone())
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        if self.stop() {
            if let Err(e) = self.wait_stopped(Duration::from_secs(2)) {
                log::warn!("Capture loop did not exit on drop: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for RecordingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingController")
            .field("backend", &self.backend.name())
            .field("region", &self.region)
            .field("state", &self.state())
            .finish()
    }
}
