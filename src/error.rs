//! Error types for the Sampled Values subscriber.

use thiserror::Error;

/// Result type alias for SV operations.
pub type Result<T> = std::result::Result<T, SvError>;

/// Sampled Values subscriber error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SvError {
    /// The configured network interface does not exist
    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    /// Raw capture requires privileges the process does not hold
    #[error("Permission denied on interface {0}")]
    PermissionDenied(String),

    /// Other configuration problem detected when opening the source
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No interface has been selected yet
    #[error("No interface configured")]
    NotConfigured,

    /// Operation not allowed in the current receiver state
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    /// Device failure during an open capture
    #[error("Capture error: {message}")]
    Capture {
        /// Description from the capture backend
        message: String,
        /// Whether the capture loop may retry
        transient: bool,
    },

    /// Malformed SV frame
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Out-of-bounds data block access
    #[error("Range error: {0}")]
    Range(#[from] RangeError),

    /// Channel closed
    #[error("Channel closed")]
    ChannelClosed,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SvError {
    /// Create a transient capture error.
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
            transient: true,
        }
    }

    /// Create a fatal capture error.
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
            transient: false,
        }
    }

    /// Check if this error was caused by receiver configuration.
    ///
    /// These are reported by `start()` and can be fixed by reconfiguring.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InterfaceNotFound(_)
                | Self::PermissionDenied(_)
                | Self::Configuration(_)
                | Self::NotConfigured
        )
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Capture { transient: true, .. })
    }

    /// Check if this error ends a running capture.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Capture {
                transient: false,
                ..
            } | Self::ChannelClosed
                | Self::Internal(_)
        )
    }
}

/// Decoding failure for a single frame.
///
/// Offsets are relative to the start of the buffer handed to the decoder
/// stage that failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Frame shorter than its fixed headers
    #[error("Frame too short: {length} bytes, need {required}")]
    FrameTooShort { length: usize, required: usize },

    /// EtherType is not Sampled Values
    #[error("Not a Sampled Values frame (EtherType 0x{ether_type:04X})")]
    NotSampledValues { ether_type: u16 },

    /// Length field that can never be valid
    #[error("Invalid length at offset {offset}")]
    InvalidLength { offset: usize },

    /// Buffer ends inside a tag or length field
    #[error("Truncated tag/length at offset {offset}")]
    TruncatedLength { offset: usize },

    /// Tag that cannot appear in an SV PDU (e.g. multi-byte tag form)
    #[error("Invalid tag 0x{found:02X} at offset {offset}")]
    InvalidTag { offset: usize, found: u8 },

    /// Mandatory element carries the wrong tag
    #[error("Unexpected tag 0x{found:02X} at offset {offset}, expected 0x{expected:02X}")]
    UnexpectedTag { offset: usize, expected: u8, found: u8 },

    /// Declared length larger than the bytes remaining
    #[error("Length overrun at offset {offset}: declared {declared}, available {available}")]
    LengthOverrun {
        offset: usize,
        declared: usize,
        available: usize,
    },

    /// Field content that does not fit its type
    #[error("Invalid value for {field} at offset {offset}")]
    InvalidValue { field: &'static str, offset: usize },
}

/// Data block read outside the declared data length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Read of {width} bytes at offset {offset} exceeds data length {length}")]
pub struct RangeError {
    /// Requested byte offset
    pub offset: usize,
    /// Width of the requested value in bytes
    pub width: usize,
    /// Declared data block length
    pub length: usize,
}
