//! Screen recording for framegrab
//!
//! A [`RecordingController`] runs at most one capture session on a background
//! thread. The thread owns its own [`CaptureContext`](crate::engine::CaptureContext),
//! paces frames at the requested rate and hands each one to a [`FrameSink`].
//!
//! # Example
//! ```rust,ignore
//! use framegrab::recording::RecordingController;
//! use framegrab::config::RecordingSettings;
//! use std::time::Duration;
//!
//! let controller = RecordingController::new(RecordingSettings::default());
//! controller.start("capture.bgra", 30)?;
//! controller.pause(true);
//! controller.pause(false);
//! let stats = controller.stop_and_wait(Duration::from_secs(2))?;
//! ```

mod capture_loop;
mod config;
mod controller;
pub mod sink;

pub use config::{RecordingStats, SessionCounters, SessionFlags};
pub use controller::{ControllerState, RecordingController, StartOutcome};
pub use sink::{sink_factory_for, ChannelSink, FrameSink, NullSink, RawFileSink, SinkFactory};
