//! Frame sinks: where the capture loop hands each frame
//!
//! Video encoding is outside this crate. A sink is the seam where an encoder
//! plugs in; the sinks here cover raw output, discarding, and a queued handoff
//! to another thread.

use crate::config::SinkKind;
use crate::errors::RecordingError;
use crate::types::{Frame, Geometry, OwnedFrame};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

/// Consumer of captured frames.
///
/// Called only from the capture loop thread. `finish` is called exactly once,
/// when the session ends.
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &Frame<'_>) -> Result<(), RecordingError>;

    fn finish(&mut self) -> Result<(), RecordingError> {
        Ok(())
    }
}

/// Builds the sink for a session from its output path, geometry and frame rate.
pub type SinkFactory = Arc<
    dyn Fn(&Path, Geometry, u32) -> Result<Box<dyn FrameSink>, RecordingError> + Send + Sync,
>;

/// Factory for the configured sink kind
pub fn sink_factory_for(kind: SinkKind) -> SinkFactory {
    match kind {
        SinkKind::Raw => Arc::new(
            |path: &Path, geometry: Geometry, _fps: u32| -> Result<Box<dyn FrameSink>, RecordingError> {
                Ok(Box::new(RawFileSink::create(path, geometry)?))
            },
        ),
        SinkKind::Null => Arc::new(
            |_: &Path, _: Geometry, _: u32| -> Result<Box<dyn FrameSink>, RecordingError> {
                Ok(Box::new(NullSink))
            },
        ),
    }
}

/// Appends each frame's BGRA bytes to a file, back to back.
pub struct RawFileSink {
    writer: BufWriter<File>,
    geometry: Geometry,
    frames: u64,
    bytes_written: u64,
}

impl RawFileSink {
    pub fn create<P: AsRef<Path>>(path: P, geometry: Geometry) -> Result<Self, RecordingError> {
        let file = File::create(path.as_ref()).map_err(|e| {
            RecordingError::IoError(format!(
                "Failed to create output file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;
        log::info!("Writing raw {} BGRA frames to {:?}", geometry, path.as_ref());
        Ok(Self {
            writer: BufWriter::new(file),
            geometry,
            frames: 0,
            bytes_written: 0,
        })
    }
}

impl FrameSink for RawFileSink {
    fn write_frame(&mut self, frame: &Frame<'_>) -> Result<(), RecordingError> {
        if frame.geometry != self.geometry {
            return Err(RecordingError::Sink(format!(
                "Frame geometry {} doesn't match output geometry {}",
                frame.geometry, self.geometry
            )));
        }
        self.writer.write_all(frame.data)?;
        self.frames += 1;
        self.bytes_written += frame.data.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RecordingError> {
        self.writer.flush()?;
        log::info!(
            "Raw output finalized: {} frames, {} bytes",
            self.frames,
            self.bytes_written
        );
        Ok(())
    }
}

/// Accepts and discards every frame.
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn write_frame(&mut self, _frame: &Frame<'_>) -> Result<(), RecordingError> {
        Ok(())
    }
}

/// Queues owned copies of frames on a bounded channel.
///
/// A full queue drops the frame instead of stalling the capture loop; the
/// drop is reported as a sink failure. Dropping the sink disconnects the
/// channel, which tells the consumer the session is over.
pub struct ChannelSink {
    sender: Sender<OwnedFrame>,
    dropped: u64,
}

impl ChannelSink {
    pub fn new(sender: Sender<OwnedFrame>) -> Self {
        Self { sender, dropped: 0 }
    }

    /// A sink and the receiving end of its queue
    pub fn bounded(capacity: usize) -> (Self, Receiver<OwnedFrame>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (Self::new(tx), rx)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl FrameSink for ChannelSink {
    fn write_frame(&mut self, frame: &Frame<'_>) -> Result<(), RecordingError> {
        match self.sender.try_send(frame.to_owned_frame()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                Err(RecordingError::Sink(format!(
                    "queue full, dropped frame {}",
                    frame.sequence
                )))
            }
            Err(TrySendError::Disconnected(_)) => Err(RecordingError::Sink(
                "frame consumer disconnected".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(geometry: Geometry, data: &[u8], sequence: u64) -> Frame<'_> {
        Frame {
            sequence,
            timestamp_us: sequence * 1000,
            geometry,
            data,
        }
    }

    #[test]
    fn test_raw_sink_appends_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let geometry = Geometry::new(2, 2).unwrap();

        let mut sink = RawFileSink::create(&path, geometry).unwrap();
        sink.write_frame(&frame(geometry, &[1u8; 16], 1)).unwrap();
        sink.write_frame(&frame(geometry, &[2u8; 16], 2)).unwrap();
        sink.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 32);
        assert!(bytes[..16].iter().all(|b| *b == 1));
        assert!(bytes[16..].iter().all(|b| *b == 2));
    }

    #[test]
    fn test_raw_sink_rejects_geometry_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink =
            RawFileSink::create(dir.path().join("out.bin"), Geometry::new(2, 2).unwrap()).unwrap();
        let other = Geometry::new(1, 1).unwrap();
        assert!(matches!(
            sink.write_frame(&frame(other, &[0u8; 4], 1)),
            Err(RecordingError::Sink(_))
        ));
    }

    #[test]
    fn test_raw_sink_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.bin");
        assert!(matches!(
            RawFileSink::create(path, Geometry::new(1, 1).unwrap()),
            Err(RecordingError::IoError(_))
        ));
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let geometry = Geometry::new(1, 1).unwrap();
        let (mut sink, rx) = ChannelSink::bounded(1);

        sink.write_frame(&frame(geometry, &[9u8; 4], 1)).unwrap();
        assert!(sink.write_frame(&frame(geometry, &[9u8; 4], 2)).is_err());
        assert_eq!(sink.dropped(), 1);

        let received = rx.try_recv().unwrap();
        assert_eq!(received.sequence, 1);
        assert_eq!(received.pixel(0, 0), Some([9, 9, 9, 9]));
    }

    #[test]
    fn test_channel_sink_reports_disconnect() {
        let geometry = Geometry::new(1, 1).unwrap();
        let (mut sink, rx) = ChannelSink::bounded(4);
        drop(rx);
        assert!(sink.write_frame(&frame(geometry, &[0u8; 4], 1)).is_err());
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn test_null_factory() {
        let factory = sink_factory_for(SinkKind::Null);
        let geometry = Geometry::new(1, 1).unwrap();
        let mut sink = factory(Path::new("ignored"), geometry, 30).unwrap();
        sink.write_frame(&frame(geometry, &[0u8; 4], 1)).unwrap();
        sink.finish().unwrap();
    }
}
