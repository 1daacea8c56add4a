//! Graphics error types.

use thiserror::Error;

use crate::resources::StreamRange;

/// Errors that can occur in the graphics system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// A stream was asked to write more data than its slot holds.
    ///
    /// This is a sizing misconfiguration. The renderer treats it as fatal.
    #[error(
        "{stream} buffer capacity exceeded: element {element_index} does not fit in {capacity} bytes (written so far: {range:?})"
    )]
    CapacityExceeded {
        /// Name of the stream that overflowed.
        stream: &'static str,
        /// Capacity of one slot in bytes.
        capacity: u64,
        /// Index of the first element that did not fit.
        element_index: usize,
        /// Range written before the overflow.
        range: StreamRange,
    },
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}
