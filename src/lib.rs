//! # FountainQ - RaptorQ Forward Error Correction
//!
//! Implementation of the RaptorQ fountain code in pure RUST
//!
//! RaptorQ is a systematic code: the first K encoding symbols of each source
//! block are the source symbols themselves. Any set of slightly more than K
//! received symbols, source or repair in any mix, recovers the block with
//! overwhelming probability.
//!
//! # RFC
//!
//! | RFC      | Title      | Link       |
//! | ------------- | ------------- | ------------- |
//! | RFC 6330 | RaptorQ Forward Error Correction Scheme for Object Delivery | <https://www.rfc-editor.org/rfc/rfc6330.html> |
//! | RFC 5052 | Forward Error Correction (FEC) Building Block | <https://www.rfc-editor.org/rfc/rfc5052> |
//!

#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(test, deny(warnings))]

mod codec;
mod common;
mod tools;

mod objectdec;
mod objectenc;

///
/// Encode an object into source and repair symbols
///
pub mod encoder {
    pub use crate::codec::solver::SolverKind;
    pub use crate::objectenc::BlockRef;
    pub use crate::objectenc::BlockRefIter;
    pub use crate::objectenc::Encoder;
    pub use crate::objectenc::EncoderConfig;
    pub use crate::objectenc::SymbolRef;
    pub use crate::objectenc::SymbolRefIter;
}

/// Re-construct an object from received encoding symbols
pub mod decoder {
    pub use crate::codec::solver::SolverKind;
    pub use crate::objectdec::Decoder;
}

/// Object Transmission Information and symbol identifiers
pub mod oti {
    pub use crate::common::oti::ObjectTransmissionInformation;
    pub use crate::common::oti::PayloadId;
    pub use crate::common::oti::MAX_ESI;
    pub use crate::common::oti::MAX_SOURCE_BLOCKS;
    pub use crate::common::oti::MAX_TRANSFER_LENGTH;
}

pub use crate::tools::error;
