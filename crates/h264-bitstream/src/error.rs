//! Error types for H.264/AVC bitstream parsing.

use thiserror::Error;

/// The kind of parameter set a slice header referenced but could not find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSetKind {
    Sps,
    Pps,
    SubsetSps,
}

impl std::fmt::Display for ParamSetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamSetKind::Sps => write!(f, "SPS"),
            ParamSetKind::Pps => write!(f, "PPS"),
            ParamSetKind::SubsetSps => write!(f, "Subset SPS"),
        }
    }
}

/// AVC parsing error types.
///
/// Every variant here is recoverable by the caller: a failure to parse one
/// NAL unit does not poison the parser for the rest of the stream (see
/// `BitstreamParser`, which skips and continues).
#[derive(Debug, Error)]
pub enum AvcError {
    /// The bit reader ran past the end of the buffer.
    #[error("out of data: needed {needed} more bit(s), {remaining} remaining")]
    OutOfData { needed: usize, remaining: usize },

    /// A parsed field violated a standard-defined range.
    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// A slice header referenced a parameter set that has not been seen yet.
    #[error("missing {kind} with id {id}")]
    MissingParameterSet { kind: ParamSetKind, id: u32 },

    /// The framer expected a start code and did not find one.
    #[error("no NAL unit start code found")]
    InvalidStartCode,

    /// `rbsp_trailing_bits()` expected a stop bit that was not present.
    #[error("malformed RBSP: {0}")]
    MalformedRbsp(&'static str),

    /// The NAL unit type is recognized but its payload is not decoded.
    #[error("unsupported NAL unit payload: {0}")]
    Unsupported(&'static str),
}

/// Result type alias for AVC parsing operations.
pub type Result<T> = std::result::Result<T, AvcError>;
