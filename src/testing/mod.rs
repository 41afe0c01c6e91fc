//! Testing utilities for framegrab
//!
//! Wraps the synthetic display and channel sinks into helpers that let tests
//! drive a [`RecordingController`](crate::recording::RecordingController)
//! without a real screen or output file.

use crate::errors::RecordingError;
use crate::recording::{ChannelSink, FrameSink, SinkFactory};
use crate::types::{Geometry, OwnedFrame};
use crossbeam_channel::Receiver;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub use crate::platform::synthetic::{pattern_pixel, AcquireStage, SyntheticDisplay};

/// Sink factory whose sinks all feed one queue.
///
/// Counts how often the factory was called, which is how many capture loops
/// got far enough to create a sink.
pub struct CollectingSinks {
    receiver: Receiver<OwnedFrame>,
    sender: crossbeam_channel::Sender<OwnedFrame>,
    created: Arc<AtomicUsize>,
    fail_creation: Arc<Mutex<Option<String>>>,
}

impl CollectingSinks {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
        Self {
            receiver,
            sender,
            created: Arc::new(AtomicUsize::new(0)),
            fail_creation: Arc::new(Mutex::new(None)),
        }
    }

    pub fn factory(&self) -> SinkFactory {
        let sender = self.sender.clone();
        let created = self.created.clone();
        let fail_creation = self.fail_creation.clone();
        Arc::new(
            move |_: &Path, _: Geometry, _: u32| -> Result<Box<dyn FrameSink>, RecordingError> {
                if let Some(reason) = fail_creation.lock().ok().and_then(|g| g.clone()) {
                    return Err(RecordingError::Sink(reason));
                }
                created.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(ChannelSink::new(sender.clone())))
            },
        )
    }

    /// Make the next sink creations fail with `reason`
    pub fn fail_creation(&self, reason: Option<&str>) {
        if let Ok(mut guard) = self.fail_creation.lock() {
            *guard = reason.map(str::to_string);
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn receiver(&self) -> &Receiver<OwnedFrame> {
        &self.receiver
    }

    /// Everything queued so far
    pub fn drain(&self) -> Vec<OwnedFrame> {
        self.receiver.try_iter().collect()
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}
