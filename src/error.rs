//! Error taxonomy for the visualization engine.
//!
//! Mapping and empty-bundle errors are recovered inside a tick; only
//! configuration and loading errors ever reach the caller.

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A timestamp mapped past the end of the analysis frames.
    #[error("analysis frame {index} out of range ({frames} frames available)")]
    MappingOutOfRange { index: usize, frames: usize },

    /// The bundle carries no data of the named kind (beats, chroma, MFCC, samples).
    #[error("feature bundle has no {0}")]
    EmptyBundle(&'static str),

    /// Unknown mode or color scheme; the previous value stays active.
    #[error("invalid {field}: {value:?}")]
    InvalidConfiguration { field: &'static str, value: String },

    #[error("invalid feature bundle: {0}")]
    InvalidBundle(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl EngineError {
    /// True for errors a tick recovers from by skipping feature-dependent output.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::MappingOutOfRange { .. } | EngineError::EmptyBundle(_)
        )
    }
}
