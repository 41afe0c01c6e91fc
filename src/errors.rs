use std::fmt;

/// Failures reported by the capture engine.
///
/// None of these are retried internally. At the foreign boundary they collapse
/// to a boolean plus a per-thread error code (see [`CaptureError::code`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    InvalidGeometry(String),
    ResourceAcquisitionFailure(String),
    PreconditionViolation(String),
    CaptureFailure(String),
}

impl CaptureError {
    /// Stable numeric code exposed through `framegrab_last_error`.
    pub fn code(&self) -> i32 {
        match self {
            CaptureError::InvalidGeometry(_) => 1,
            CaptureError::ResourceAcquisitionFailure(_) => 2,
            CaptureError::PreconditionViolation(_) => 3,
            CaptureError::CaptureFailure(_) => 4,
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CaptureError::InvalidGeometry(msg) => write!(f, "Invalid geometry: {}", msg),
            CaptureError::ResourceAcquisitionFailure(msg) => {
                write!(f, "Resource acquisition failure: {}", msg)
            }
            CaptureError::PreconditionViolation(msg) => {
                write!(f, "Precondition violation: {}", msg)
            }
            CaptureError::CaptureFailure(msg) => write!(f, "Capture failure: {}", msg),
        }
    }
}

impl std::error::Error for CaptureError {}

/// Failures reported by the recording controller and its sinks.
#[derive(Debug)]
pub enum RecordingError {
    InvalidConfiguration(String),
    SpawnFailed(String),
    Timeout,
    Sink(String),
    IoError(String),
    Capture(CaptureError),
}

impl RecordingError {
    pub fn code(&self) -> i32 {
        match self {
            RecordingError::InvalidConfiguration(_) => 5,
            RecordingError::Capture(e) => e.code(),
            _ => 6,
        }
    }
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordingError::InvalidConfiguration(msg) => {
                write!(f, "Invalid configuration: {}", msg)
            }
            RecordingError::SpawnFailed(msg) => write!(f, "Failed to spawn capture loop: {}", msg),
            RecordingError::Timeout => write!(f, "Timed out waiting for capture loop to exit"),
            RecordingError::Sink(msg) => write!(f, "Sink error: {}", msg),
            RecordingError::IoError(msg) => write!(f, "IO error: {}", msg),
            RecordingError::Capture(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RecordingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecordingError::Capture(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CaptureError> for RecordingError {
    fn from(err: CaptureError) -> Self {
        RecordingError::Capture(err)
    }
}

impl From<std::io::Error> for RecordingError {
    fn from(err: std::io::Error) -> Self {
        RecordingError::IoError(err.to_string())
    }
}
