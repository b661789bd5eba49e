use crate::common::partition::Partition;
use crate::tools::error::{FountainError, Result};
#[cfg(feature = "serde_support")]
use serde::{Deserialize, Serialize};

/// Maximum transfer length (F) of a single object, in bytes
pub const MAX_TRANSFER_LENGTH: u64 = 946_270_874_880;

/// Maximum Encoding Symbol ID
pub const MAX_ESI: u32 = (1 << 20) - 1;

/// Maximum number of source blocks (Z)
pub const MAX_SOURCE_BLOCKS: u32 = 256;

///
/// Symbol identifier carried with every encoding symbol
///
/// Packs on the wire as a 32-bit FEC Payload ID
/// <https://www.rfc-editor.org/rfc/rfc6330.html#section-3.2>
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     SBN       |               Encoding Symbol ID              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct PayloadId {
    /// Source Block Number
    pub sbn: u8,
    /// Encoding Symbol ID, 24 bits on the wire, values above [`MAX_ESI`]
    /// are rejected by the codec
    pub esi: u32,
}

impl PayloadId {
    /// Create a payload identifier for a symbol of a block
    pub fn new(sbn: u8, esi: u32) -> PayloadId {
        PayloadId { sbn, esi }
    }

    /// Pack to the 32-bit wire representation
    pub fn pack(&self) -> u32 {
        ((self.sbn as u32) << 24) | (self.esi & 0x00FF_FFFF)
    }

    /// Unpack from the 32-bit wire representation
    pub fn unpack(id: u32) -> PayloadId {
        PayloadId {
            sbn: (id >> 24) as u8,
            esi: id & 0x00FF_FFFF,
        }
    }
}

///
/// Object Transmission Information
/// <https://www.rfc-editor.org/rfc/rfc6330.html#section-3.3>
///
/// The five transport parameters fixed for the lifetime of one
/// encode/decode session
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct ObjectTransmissionInformation {
    transfer_length: u64,
    symbol_size: u16,
    source_blocks: u16,
    sub_blocks: u16,
    symbol_alignment: u8,
}

impl ObjectTransmissionInformation {
    /// Create transport parameters from explicit values
    pub fn new(
        transfer_length: u64,
        symbol_size: u16,
        source_blocks: u16,
        sub_blocks: u16,
        symbol_alignment: u8,
    ) -> Result<ObjectTransmissionInformation> {
        let oti = ObjectTransmissionInformation {
            transfer_length,
            symbol_size,
            source_blocks,
            sub_blocks,
            symbol_alignment,
        };
        oti.validate()?;
        Ok(oti)
    }

    fn validate(&self) -> Result<()> {
        if self.transfer_length == 0 || self.transfer_length > MAX_TRANSFER_LENGTH {
            return Err(FountainError::InvalidObjectSize(self.transfer_length));
        }

        if self.symbol_size == 0 {
            return Err(FountainError::InvalidParameters(
                "symbol size is 0".to_owned(),
            ));
        }

        if self.symbol_alignment == 0
            || !self.symbol_alignment.is_power_of_two()
            || self.symbol_size % self.symbol_alignment as u16 != 0
        {
            return Err(FountainError::InvalidParameters(format!(
                "alignment {} does not divide symbol size {}",
                self.symbol_alignment, self.symbol_size
            )));
        }

        if self.source_blocks == 0 || self.source_blocks as u32 > MAX_SOURCE_BLOCKS {
            return Err(FountainError::InvalidParameters(format!(
                "{} source blocks",
                self.source_blocks
            )));
        }

        if self.sub_blocks == 0 {
            return Err(FountainError::InvalidParameters("0 sub-blocks".to_owned()));
        }

        Ok(())
    }

    /// Create transport parameters from the two OTI integers emitted by an
    /// encoder
    pub fn from_oti(common: u64, scheme_specific: u32) -> Result<ObjectTransmissionInformation> {
        let transfer_length = (common >> 24) & 0x00FF_FFFF_FFFF;
        let symbol_size = common as u16;
        let source_blocks = match (scheme_specific >> 24) as u16 {
            // Z = 256 wraps to 0 in its 8-bit field
            0 => 256,
            z => z,
        };
        let sub_blocks = (scheme_specific >> 8) as u16;
        let symbol_alignment = scheme_specific as u8;

        ObjectTransmissionInformation::new(
            transfer_length,
            symbol_size,
            source_blocks,
            sub_blocks,
            symbol_alignment,
        )
    }

    /// Common FEC OTI, `[F:40 | reserved:8 | T:16]`
    pub fn oti_common(&self) -> u64 {
        ((self.transfer_length & 0x00FF_FFFF_FFFF) << 24) | self.symbol_size as u64
    }

    /// Scheme-specific FEC OTI, `[Z:8 | N:16 | Al:8]`
    pub fn oti_scheme_specific(&self) -> u32 {
        ((self.source_blocks as u32 & 0xFF) << 24)
            | ((self.sub_blocks as u32) << 8)
            | self.symbol_alignment as u32
    }

    /// Transfer length of the object (F), in bytes
    pub fn transfer_length(&self) -> u64 {
        self.transfer_length
    }

    /// Symbol size (T), in bytes
    pub fn symbol_size(&self) -> u16 {
        self.symbol_size
    }

    /// Number of source blocks (Z)
    pub fn source_blocks(&self) -> u16 {
        self.source_blocks
    }

    /// Number of sub-blocks per block (N)
    pub fn sub_blocks(&self) -> u16 {
        self.sub_blocks
    }

    /// Symbol alignment (Al), in bytes
    pub fn symbol_alignment(&self) -> u8 {
        self.symbol_alignment
    }

    /// Total number of source symbols of the object, `Kt = ceil(F/T)`
    pub fn total_symbols(&self) -> u64 {
        num_integer::div_ceil(self.transfer_length, self.symbol_size as u64)
    }

    /// Partition of the `Kt` source symbols into Z source blocks
    pub fn block_partition(&self) -> Partition {
        Partition::new(self.total_symbols(), self.source_blocks as u32)
    }

    /// Number of source symbols of block `sbn`
    pub fn symbols(&self, sbn: u8) -> Result<u16> {
        let part = self.block_partition();
        if (sbn as u32) >= part.nb_groups() {
            return Err(FountainError::UnknownBlock(sbn));
        }
        Ok(part.size_of(sbn as u32) as u16)
    }

    /// Offset in the object, in bytes, where block `sbn` starts
    pub fn block_offset(&self, sbn: u8) -> u64 {
        self.block_partition().offset_of(sbn as u32) * self.symbol_size as u64
    }

    /// Bytes of the object covered by block `sbn`. The last block of the
    /// object may cover less than `K * T` bytes.
    pub fn block_bytes(&self, sbn: u8) -> Result<u64> {
        let symbols = self.symbols(sbn)? as u64;
        let start = self.block_offset(sbn);
        let end = std::cmp::min(start + symbols * self.symbol_size as u64, self.transfer_length);
        Ok(end - start)
    }
}
