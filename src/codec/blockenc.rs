//! Per-block encoder
//!
//! Holds the gathered source symbols of one block and produces encoding
//! symbols. Source symbols (ESI < K) are returned as-is, the code is
//! systematic; repair symbols need the intermediate symbols, computed once
//! with the precode solver and reused for every request afterwards.

use super::interleaver::Interleaver;
use super::precode::{intermediate_symbols, lt_encode};
use super::solver::SolverKind;
use super::tables::PrecodeParams;
use crate::tools::error::Result;

#[derive(Debug)]
pub struct BlockEncoder {
    params: PrecodeParams,
    nb_source_symbols: u32,
    symbol_size: usize,
    // K' symbols: the K gathered source symbols plus K' - K zero padding
    source: Vec<Vec<u8>>,
    solver: SolverKind,
}

impl BlockEncoder {
    /// Build the encoder of one block from its region of the object
    pub fn new(
        block: &[u8],
        nb_source_symbols: u32,
        interleaver: &Interleaver,
        symbol_size: u16,
        solver: SolverKind,
    ) -> Result<BlockEncoder> {
        let params = PrecodeParams::for_block(nb_source_symbols)?;

        let mut source = Vec::with_capacity(params.kprime as usize);
        for esi in 0..nb_source_symbols {
            source.push(interleaver.gather(block, esi));
        }
        source.resize(params.kprime as usize, vec![0u8; symbol_size as usize]);

        Ok(BlockEncoder {
            params,
            nb_source_symbols,
            symbol_size: symbol_size as usize,
            source,
            solver,
        })
    }

    /// Solve the precode system of this block
    pub fn compute_intermediate(&self) -> Result<Vec<Vec<u8>>> {
        log::debug!(
            "precompute intermediate symbols K={} K'={}",
            self.nb_source_symbols,
            self.params.kprime
        );
        intermediate_symbols(&self.params, &self.source, self.symbol_size, self.solver)
    }

    /// A source symbol, straight from the object
    pub fn source_symbol(&self, esi: u32) -> &[u8] {
        debug_assert!(esi < self.nb_source_symbols);
        &self.source[esi as usize]
    }

    /// A repair symbol, LT-expanded from the intermediate symbols
    pub fn repair_symbol(&self, intermediate: &[Vec<u8>], esi: u32) -> Vec<u8> {
        debug_assert!(esi >= self.nb_source_symbols);
        let isi = esi + (self.params.kprime - self.nb_source_symbols);
        lt_encode(&self.params, intermediate, isi)
    }
}
