//! Sub-block interleaver of RFC 6330 section 4.4.1.2
//!
//! Each source block is split into N sub-blocks of whole sub-symbols. A
//! symbol concatenates one sub-symbol of every sub-block, so contiguous
//! regions of the object end up strided across the symbols of the block.
//! The mapping is pure address arithmetic, no copy of the object is made.

use crate::common::partition::Partition;

#[derive(Clone, Debug)]
pub struct Interleaver {
    nb_symbols: usize,
    symbol_size: usize,
    // byte width of each of the N sub-blocks' sub-symbols
    sub_symbol_sizes: Vec<usize>,
}

impl Interleaver {
    /// Interleaver of one block of `nb_symbols` symbols
    pub fn new(nb_symbols: u32, symbol_size: u16, symbol_alignment: u8, sub_blocks: u16) -> Interleaver {
        let units = (symbol_size / symbol_alignment as u16) as u64;
        let part = Partition::new(units, sub_blocks as u32);

        let mut sub_symbol_sizes = Vec::with_capacity(sub_blocks as usize);
        for j in 0..part.nb_groups() {
            sub_symbol_sizes.push(part.size_of(j) as usize * symbol_alignment as usize);
        }
        debug_assert_eq!(
            sub_symbol_sizes.iter().sum::<usize>(),
            symbol_size as usize
        );

        Interleaver {
            nb_symbols: nb_symbols as usize,
            symbol_size: symbol_size as usize,
            sub_symbol_sizes,
        }
    }

    /// Offset, relative to the start of the block, of byte `offset` of
    /// symbol `esi`
    pub fn byte_offset(&self, esi: u32, offset: usize) -> usize {
        debug_assert!(offset < self.symbol_size);
        let esi = esi as usize;

        // locate the sub-block this byte belongs to
        let mut sub_block_start = 0usize;
        let mut within_symbol = 0usize;
        for size in self.sub_symbol_sizes.iter() {
            if offset < within_symbol + size {
                return sub_block_start + esi * size + (offset - within_symbol);
            }
            within_symbol += size;
            sub_block_start += self.nb_symbols * size;
        }
        unreachable!();
    }

    /// Read symbol `esi` out of the block region. Bytes past the end of the
    /// region (the tail of the last block) read as zero padding.
    pub fn gather(&self, block: &[u8], esi: u32) -> Vec<u8> {
        let mut symbol = vec![0u8; self.symbol_size];
        let esi = esi as usize;

        let mut sub_block_start = 0usize;
        let mut within_symbol = 0usize;
        for size in self.sub_symbol_sizes.iter() {
            let from = sub_block_start + esi * size;
            for i in 0..*size {
                if let Some(byte) = block.get(from + i) {
                    symbol[within_symbol + i] = *byte;
                }
            }
            within_symbol += size;
            sub_block_start += self.nb_symbols * size;
        }
        symbol
    }

    /// Write symbol `esi` back into the block region. Bytes past the end of
    /// the region are padding and are dropped.
    pub fn scatter(&self, symbol: &[u8], esi: u32, block: &mut [u8]) {
        debug_assert_eq!(symbol.len(), self.symbol_size);
        let esi = esi as usize;

        let mut sub_block_start = 0usize;
        let mut within_symbol = 0usize;
        for size in self.sub_symbol_sizes.iter() {
            let to = sub_block_start + esi * size;
            for i in 0..*size {
                if let Some(byte) = block.get_mut(to + i) {
                    *byte = symbol[within_symbol + i];
                }
            }
            within_symbol += size;
            sub_block_start += self.nb_symbols * size;
        }
    }
}
