//! Error types for the twostream-core library.
//!
//! Every variant aborts the sample or pass in progress; nothing at this
//! layer degrades silently or retries.

// ---- External crate imports ----
use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Main error type for the twostream-core library.
#[derive(Error, Debug)]
pub enum CoreError {
    // ---- I/O and Serialization Errors ----
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ---- Sampling Errors ----
    /// The window does not fit into the video (or leaves no room for the
    /// requested number of evaluation samples).
    #[error(
        "Window of {window} frames does not fit video '{video_id}' with {frame_count} frames"
    )]
    InvalidWindow {
        video_id: String,
        frame_count: u32,
        window: u32,
    },

    /// A frame of a clip could not be loaded. Never replaced by a blank frame.
    #[error("Missing frame {frame_index} for video '{video_id}'")]
    MissingFrame { video_id: String, frame_index: u32 },

    // ---- Aggregation Errors ----
    #[error("Shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("No score vectors to combine")]
    EmptyStreams,

    #[error("No videos recorded; nothing to finalize")]
    EmptyAccumulator,

    #[error("Video '{video_id}' recorded with label {existing}, got {found}")]
    LabelConflict {
        video_id: String,
        existing: usize,
        found: usize,
    },

    // ---- Input Errors ----
    #[error("Invalid dataset mode '{0}' (expected train or evaluate)")]
    InvalidMode(String),

    #[error("Split parse error at line {line}: {reason}")]
    SplitParse { line: usize, reason: String },

    #[error("Video '{0}' has no entry in the frame count table")]
    UnknownVideo(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ---- Execution Errors ----
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    // ---- External Collaborator Errors ----
    #[error("Model error: {0}")]
    Model(String),
}

/// Result type for twostream-core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_frame_message_names_video_and_frame() {
        let err = CoreError::MissingFrame {
            video_id: "v_42".to_string(),
            frame_index: 7,
        };
        assert_eq!(err.to_string(), "Missing frame 7 for video 'v_42'");
    }

    #[test]
    fn split_parse_message_carries_line_number() {
        let err = CoreError::SplitParse {
            line: 3,
            reason: "label is not an integer".to_string(),
        };
        assert!(err.to_string().contains("line 3"));
    }
}
