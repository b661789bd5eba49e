///
/// Error raised by the encoder or the decoder
///
/// Failures are never conflated with a zero-length success, every operation
/// that can fail returns a distinct variant here.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FountainError {
    /// The transfer length is zero or exceeds the 946 270 874 880 bytes
    /// allowed by RFC 6330
    InvalidObjectSize(u64),
    /// The transport parameters are not usable, e.g. a block needs more
    /// source symbols than the largest tabulated K' or the symbol alignment
    /// does not divide the symbol size
    InvalidParameters(String),
    /// The operation references a source block number >= Z
    UnknownBlock(u8),
    /// The encoding symbol identifier does not fit in 20 bits
    EsiOutOfRange(u32),
    /// The output buffer cannot hold a full symbol or block
    BufferTooSmall {
        /// Number of bytes the operation needs
        needed: usize,
        /// Number of bytes the caller provided
        available: usize,
    },
    /// The (SBN, ESI) pair was already received, the symbol is dropped
    DuplicateSymbol,
    /// Not enough symbols received yet to attempt decoding the block
    NeedMoreSymbols {
        /// Number of symbols received so far
        received: usize,
        /// Minimum number of symbols the block needs
        needed: usize,
    },
    /// Inactivation decoding did not converge despite enough received rows
    DecodeFailure,
    /// The precode constraint system is singular. This cannot happen for the
    /// tabulated K' values and denotes an implementation bug
    PrecodeFailure,
}

///
pub type Result<T> = std::result::Result<T, FountainError>;

impl std::fmt::Display for FountainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FountainError::InvalidObjectSize(size) => {
                write!(f, "invalid object size of {} bytes", size)
            }
            FountainError::InvalidParameters(msg) => write!(f, "invalid parameters: {}", msg),
            FountainError::UnknownBlock(sbn) => write!(f, "unknown source block {}", sbn),
            FountainError::EsiOutOfRange(esi) => write!(f, "esi {} out of range", esi),
            FountainError::BufferTooSmall { needed, available } => {
                write!(f, "buffer of {} bytes, {} needed", available, needed)
            }
            FountainError::DuplicateSymbol => write!(f, "symbol already received"),
            FountainError::NeedMoreSymbols { received, needed } => {
                write!(f, "{} symbols received, at least {} needed", received, needed)
            }
            FountainError::DecodeFailure => write!(f, "decoding did not converge"),
            FountainError::PrecodeFailure => write!(f, "precode constraint matrix is singular"),
        }
    }
}

impl std::error::Error for FountainError {}
