//! Error type shared by every fallible operation of the crate.

use thiserror::Error;

/// Errors raised by bitmap access, palette construction, quantization and
/// the copy pipeline.
///
/// Geometry and format violations are detected before any pixel is touched,
/// so an `Err` never leaves a half-written buffer behind (cancellation is the
/// one exception, and it is reported through
/// [`CopyOutcome::Canceled`](crate::CopyOutcome::Canceled) rather than as an
/// error by the public pipeline functions).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DrawingError {
    /// Bad rectangle, size/stride mismatch or another out-of-range argument.
    #[error("Argument out of range: {0}")]
    ArgumentOutOfRange(String),

    /// A palette index that the palette or the pixel format cannot hold.
    #[error("Color index {index} is out of range (max {max})")]
    IndexOutOfRange { index: u32, max: u32 },

    /// Wrong-direction access or an operation the pixel format lacks.
    #[error("Operation not supported: {0}")]
    NotSupported(&'static str),

    /// The object is in a state that does not allow the operation.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The bitmap data was accessed after it had been disposed.
    #[error("Bitmap data has been disposed")]
    Disposed,

    /// Cancellation was observed.
    #[error("Operation canceled")]
    Canceled,
}

impl DrawingError {
    pub(crate) fn out_of_range(message: impl Into<String>) -> Self {
        DrawingError::ArgumentOutOfRange(message.into())
    }

    pub(crate) fn invalid_operation(message: impl Into<String>) -> Self {
        DrawingError::InvalidOperation(message.into())
    }
}

impl From<enough::StopReason> for DrawingError {
    fn from(_: enough::StopReason) -> Self {
        DrawingError::Canceled
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = DrawingError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_out_of_range_message() {
        let error = DrawingError::IndexOutOfRange { index: 16, max: 15 };
        assert_eq!(error.to_string(), "Color index 16 is out of range (max 15)");
    }

    #[test]
    fn test_not_supported_message() {
        let error = DrawingError::NotSupported("bitmap data is write-only");
        assert_eq!(
            error.to_string(),
            "Operation not supported: bitmap data is write-only"
        );
    }

    #[test]
    fn test_helpers_build_expected_variants() {
        assert_eq!(
            DrawingError::out_of_range("stride"),
            DrawingError::ArgumentOutOfRange("stride".to_string())
        );
        assert_eq!(
            DrawingError::invalid_operation("palette too large"),
            DrawingError::InvalidOperation("palette too large".to_string())
        );
    }

    #[test]
    fn test_stop_reason_is_cancellation() {
        assert_eq!(
            DrawingError::from(enough::StopReason::Cancelled),
            DrawingError::Canceled
        );
    }
}
