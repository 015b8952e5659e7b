// Domain errors - Merge failure taxonomy and boundary codes

use std::fmt;

/// Prefix of the machine-parseable clip marker carried by clip failures
pub const CLIP_ERROR_MARKER_PREFIX: &str = "CLIP_ERROR_INDEX_";

/// Terminal outcome of a failed merge request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// Malformed caller input, detected before any I/O
    InvalidRequest(String),
    /// A specific input clip could not be opened or demuxed
    ClipUnreadable { index: usize },
    /// Muxer, encoder or I/O fault while producing the output
    WriteFailure(String),
    /// Caller-initiated abort
    Cancelled,
    /// Feature intentionally absent
    NotImplemented(String),
}

impl MergeError {
    /// Boundary error code
    pub fn code(&self) -> &'static str {
        match self {
            MergeError::InvalidRequest(_) => "INVALID_ARGS",
            MergeError::ClipUnreadable { .. } => "MERGE_ERROR",
            MergeError::WriteFailure(_) => "EXPORT_FAILED",
            MergeError::Cancelled => "EXPORT_CANCELLED",
            MergeError::NotImplemented(_) => "NOT_IMPLEMENTED",
        }
    }

    pub fn clip_index(&self) -> Option<usize> {
        match self {
            MergeError::ClipUnreadable { index } => Some(*index),
            _ => None,
        }
    }

    /// `CLIP_ERROR_INDEX_<i>` for clip failures
    pub fn marker(&self) -> Option<String> {
        self.clip_index()
            .map(|index| format!("{}{}", CLIP_ERROR_MARKER_PREFIX, index))
    }

    /// Recover the clip index from any message carrying a clip marker
    pub fn parse_clip_marker(message: &str) -> Option<usize> {
        let start = message.find(CLIP_ERROR_MARKER_PREFIX)? + CLIP_ERROR_MARKER_PREFIX.len();
        let digits: String = message[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            MergeError::ClipUnreadable { index } => write!(
                f,
                "Clip {} could not be read ({}{})",
                index, CLIP_ERROR_MARKER_PREFIX, index
            ),
            MergeError::WriteFailure(msg) => write!(f, "Failed to write merged output: {}", msg),
            MergeError::Cancelled => write!(f, "Merge cancelled"),
            MergeError::NotImplemented(feature) => write!(f, "Not implemented: {}", feature),
        }
    }
}

impl std::error::Error for MergeError {}
