//! RaptorQ object decoder
//!
//! Collects encoding symbols per source block and rebuilds the object. A
//! block handle is created on the first symbol received for its SBN. Blocks
//! decode independently: the whole object is only written once every block
//! decoded, but individual blocks can be drained early with
//! [`Decoder::decode_block`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::codec::blockdec::BlockDecoder;
use crate::codec::interleaver::Interleaver;
use crate::codec::solver::SolverKind;
use crate::common::oti::{ObjectTransmissionInformation, PayloadId};
use crate::tools::error::{FountainError, Result};

///
/// RaptorQ decoder of one object
///
/// ```
/// use fountainq::decoder::Decoder;
/// use fountainq::oti::ObjectTransmissionInformation;
///
/// let oti = ObjectTransmissionInformation::new(12, 4, 1, 1, 1).unwrap();
/// let decoder = Decoder::new(oti);
/// decoder.add_symbol(0, 0, &[1, 2, 3, 4]).unwrap();
/// decoder.add_symbol(0, 1, &[5, 6, 7, 8]).unwrap();
/// decoder.add_symbol(0, 2, &[9, 10, 11, 12]).unwrap();
///
/// let mut object = vec![0u8; 12];
/// assert_eq!(decoder.decode(&mut object).unwrap(), 12);
/// ```
///
pub struct Decoder {
    oti: ObjectTransmissionInformation,
    solver: SolverKind,
    blocks: Mutex<BTreeMap<u8, Arc<Mutex<BlockDecoder>>>>,
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Decoder {{ oti: {:?} }}", self.oti)
    }
}

impl Decoder {
    /// Create a decoder from known transport parameters
    pub fn new(oti: ObjectTransmissionInformation) -> Decoder {
        Decoder {
            oti,
            solver: SolverKind::Inactivation,
            blocks: Mutex::new(BTreeMap::new()),
        }
    }

    /// Create a decoder from the two OTI integers emitted by the encoder
    pub fn from_oti(common: u64, scheme_specific: u32) -> Result<Decoder> {
        Ok(Decoder::new(ObjectTransmissionInformation::from_oti(
            common,
            scheme_specific,
        )?))
    }

    /// Select the strategy used to factor the decoding matrices
    pub fn with_solver(mut self, solver: SolverKind) -> Decoder {
        self.solver = solver;
        self
    }

    /// The transport parameters of this decoder
    pub fn oti(&self) -> ObjectTransmissionInformation {
        self.oti
    }

    /// Number of source blocks (Z)
    pub fn blocks(&self) -> u16 {
        self.oti.source_blocks()
    }

    /// Number of source symbols of block `sbn`
    pub fn symbols(&self, sbn: u8) -> Result<u16> {
        self.oti.symbols(sbn)
    }

    /// Size of block `sbn` in bytes, padding included
    pub fn block_size(&self, sbn: u8) -> Result<usize> {
        let symbols = self.oti.symbols(sbn)? as usize;
        Ok(symbols * self.oti.symbol_size() as usize)
    }

    /// Symbol size (T) in bytes
    pub fn symbol_size(&self) -> u16 {
        self.oti.symbol_size()
    }

    fn block_handle(&self, sbn: u8) -> Result<Arc<Mutex<BlockDecoder>>> {
        let nb_symbols = self.oti.symbols(sbn)? as u32;

        let mut blocks = self.blocks.lock().unwrap();
        if let Some(handle) = blocks.get(&sbn) {
            return Ok(handle.clone());
        }
        let handle = Arc::new(Mutex::new(BlockDecoder::new(
            nb_symbols,
            self.oti.symbol_size(),
            self.solver,
        )?));
        blocks.insert(sbn, handle.clone());
        Ok(handle)
    }

    /// Store one received encoding symbol. Returns false when the (SBN,
    /// ESI) pair was already received, receiving twice is idempotent.
    pub fn add_symbol(&self, sbn: u8, esi: u32, payload: &[u8]) -> Result<bool> {
        let handle = self.block_handle(sbn)?;
        let mut decoder = handle.lock().unwrap();
        decoder.push(esi, payload)
    }

    /// Like [`Decoder::add_symbol`] with the packed 32-bit symbol identifier
    pub fn add_symbol_id(&self, id: u32, payload: &[u8]) -> Result<bool> {
        let payload_id = PayloadId::unpack(id);
        self.add_symbol(payload_id.sbn, payload_id.esi, payload)
    }

    /// SBNs that already decoded successfully
    pub fn decoded_blocks(&self) -> Vec<u8> {
        let blocks = self.blocks.lock().unwrap();
        blocks
            .iter()
            .filter(|(_, handle)| handle.lock().unwrap().decoded())
            .map(|(sbn, _)| *sbn)
            .collect()
    }

    /// Decode a single block and write its bytes into `out`, returning the
    /// number of bytes written. The tail block of the object writes less
    /// than its padded size.
    pub fn decode_block(&self, sbn: u8, out: &mut [u8]) -> Result<usize> {
        let nb_bytes = self.oti.block_bytes(sbn)? as usize;
        if out.len() < nb_bytes {
            return Err(FountainError::BufferTooSmall {
                needed: nb_bytes,
                available: out.len(),
            });
        }

        let nb_symbols = self.oti.symbols(sbn)? as u32;
        let handle = {
            let blocks = self.blocks.lock().unwrap();
            blocks.get(&sbn).cloned()
        };
        let Some(handle) = handle else {
            return Err(FountainError::NeedMoreSymbols {
                received: 0,
                needed: nb_symbols as usize,
            });
        };

        let mut decoder = handle.lock().unwrap();
        decoder.decode()?;

        let interleaver = Interleaver::new(
            nb_symbols,
            self.oti.symbol_size(),
            self.oti.symbol_alignment(),
            self.oti.sub_blocks(),
        );
        for esi in 0..nb_symbols {
            if let Some(symbol) = decoder.source_symbol(esi) {
                interleaver.scatter(symbol, esi, &mut out[..nb_bytes]);
            }
        }
        Ok(nb_bytes)
    }

    /// Decode the whole object into `out`, returning the number of bytes
    /// written. Fails without touching `out` beyond already-decoded blocks
    /// if any block cannot decode yet.
    pub fn decode(&self, out: &mut [u8]) -> Result<usize> {
        let transfer_length = self.oti.transfer_length() as usize;
        if out.len() < transfer_length {
            return Err(FountainError::BufferTooSmall {
                needed: transfer_length,
                available: out.len(),
            });
        }

        let mut written = 0usize;
        for sbn in 0..self.oti.source_blocks() {
            let start = self.oti.block_offset(sbn as u8) as usize;
            let nb_bytes = self.oti.block_bytes(sbn as u8)? as usize;
            written += self.decode_block(sbn as u8, &mut out[start..start + nb_bytes])?;
        }
        Ok(written)
    }

    /// Drop the state of block `sbn`, received symbols included
    pub fn free(&self, sbn: u8) {
        let mut blocks = self.blocks.lock().unwrap();
        blocks.remove(&sbn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oti(transfer_length: u64, symbol_size: u16) -> ObjectTransmissionInformation {
        ObjectTransmissionInformation::new(transfer_length, symbol_size, 1, 1, 1).unwrap()
    }

    #[test]
    pub fn source_only_round_trip() {
        crate::tests::init();
        let data: Vec<u8> = (0..40u8).collect();
        let decoder = Decoder::new(oti(40, 8));

        for esi in 0..5u32 {
            let accepted = decoder
                .add_symbol(0, esi, &data[esi as usize * 8..(esi as usize + 1) * 8])
                .unwrap();
            assert!(accepted);
        }

        let mut out = vec![0u8; 40];
        assert_eq!(decoder.decode(&mut out).unwrap(), 40);
        assert_eq!(out, data);
    }

    #[test]
    pub fn unknown_block_is_rejected() {
        crate::tests::init();
        let decoder = Decoder::new(oti(40, 8));
        assert_eq!(
            decoder.add_symbol(1, 0, &[0u8; 8]),
            Err(FountainError::UnknownBlock(1))
        );
    }

    #[test]
    pub fn decode_without_symbols_needs_more() {
        crate::tests::init();
        let decoder = Decoder::new(oti(40, 8));
        let mut out = vec![0u8; 40];
        assert_eq!(
            decoder.decode(&mut out),
            Err(FountainError::NeedMoreSymbols {
                received: 0,
                needed: 5
            })
        );
    }

    #[test]
    pub fn short_output_buffer_is_rejected() {
        crate::tests::init();
        let decoder = Decoder::new(oti(40, 8));
        let mut out = vec![0u8; 10];
        assert_eq!(
            decoder.decode(&mut out),
            Err(FountainError::BufferTooSmall {
                needed: 40,
                available: 10
            })
        );
    }

    #[test]
    pub fn duplicate_symbol_is_idempotent() {
        crate::tests::init();
        let decoder = Decoder::new(oti(16, 8));
        assert!(decoder.add_symbol(0, 0, &[1u8; 8]).unwrap());
        assert!(!decoder.add_symbol(0, 0, &[1u8; 8]).unwrap());
    }

    #[test]
    pub fn oti_round_trip_constructs_the_same_decoder() {
        crate::tests::init();
        let reference = ObjectTransmissionInformation::new(12345, 64, 3, 1, 4).unwrap();
        let decoder = Decoder::from_oti(
            reference.oti_common(),
            reference.oti_scheme_specific(),
        )
        .unwrap();
        assert_eq!(decoder.blocks(), 3);
        assert_eq!(decoder.symbol_size(), 64);
        assert_eq!(decoder.oti(), reference);
    }

    #[test]
    pub fn tail_block_truncates_to_transfer_length() {
        crate::tests::init();
        // 41 bytes in 6 symbols of 8, last symbol is 1 byte of data
        let data: Vec<u8> = (0..41u8).collect();
        let decoder = Decoder::new(oti(41, 8));

        for esi in 0..6u32 {
            let mut symbol = vec![0u8; 8];
            let start = esi as usize * 8;
            let end = std::cmp::min(start + 8, 41);
            symbol[..end - start].copy_from_slice(&data[start..end]);
            decoder.add_symbol(0, esi, &symbol).unwrap();
        }

        let mut out = vec![0u8; 41];
        assert_eq!(decoder.decode(&mut out).unwrap(), 41);
        assert_eq!(out, data);
    }
}
