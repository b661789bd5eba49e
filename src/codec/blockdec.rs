//! Per-block decoder
//!
//! Accumulates received (ESI, payload) pairs and, once at least K rows are
//! available, rebuilds the intermediate symbols by stacking the LT row of
//! every received symbol on top of the precode constraints. Receiving is
//! monotone: symbols are only added, duplicates are dropped, and a decoded
//! block keeps its symbols forever.

use std::collections::HashSet;

use super::precode::{add_constraint_rows, lt_encode, lt_row};
use super::solver::{new_solver, SolverKind};
use super::tables::PrecodeParams;
use crate::common::oti::MAX_ESI;
use crate::tools::error::{FountainError, Result};

// extra symbols beyond K after which a failed solve is a decode failure
// rather than a request for more symbols
const DECODE_OVERHEAD: usize = 2;

#[derive(Debug)]
pub struct BlockDecoder {
    params: PrecodeParams,
    nb_source_symbols: u32,
    symbol_size: usize,
    received: Vec<(u32, Vec<u8>)>,
    seen: HashSet<u32>,
    solver: SolverKind,
    // source symbols of the block, regenerated on a successful decode
    source: Option<Vec<Vec<u8>>>,
}

impl BlockDecoder {
    pub fn new(
        nb_source_symbols: u32,
        symbol_size: u16,
        solver: SolverKind,
    ) -> Result<BlockDecoder> {
        Ok(BlockDecoder {
            params: PrecodeParams::for_block(nb_source_symbols)?,
            nb_source_symbols,
            symbol_size: symbol_size as usize,
            received: Vec::new(),
            seen: HashSet::new(),
            solver,
            source: None,
        })
    }

    /// Store one received encoding symbol. Returns false when the ESI was
    /// already received, adding twice leaves the decoder unchanged.
    pub fn push(&mut self, esi: u32, payload: &[u8]) -> Result<bool> {
        if esi > MAX_ESI {
            return Err(FountainError::EsiOutOfRange(esi));
        }
        if payload.len() != self.symbol_size {
            return Err(FountainError::InvalidParameters(format!(
                "symbol of {} bytes, expected {}",
                payload.len(),
                self.symbol_size
            )));
        }

        if !self.seen.insert(esi) {
            log::debug!("esi {} already received", esi);
            return Ok(false);
        }
        self.received.push((esi, payload.to_vec()));
        Ok(true)
    }

    pub fn decoded(&self) -> bool {
        self.source.is_some()
    }

    pub fn nb_received(&self) -> usize {
        self.received.len()
    }

    /// Attempt to rebuild the source symbols of the block
    pub fn decode(&mut self) -> Result<()> {
        if self.source.is_some() {
            return Ok(());
        }

        let k = self.nb_source_symbols;
        if self.received.len() < k as usize {
            return Err(FountainError::NeedMoreSymbols {
                received: self.received.len(),
                needed: k as usize,
            });
        }

        let params = &self.params;
        let mut solver = new_solver(self.solver, params.l() as usize, params.p() as usize);
        add_constraint_rows(params, self.symbol_size, solver.as_mut());

        // the padding symbols K..K' are known to be zero
        for isi in k..params.kprime {
            solver.add_row(lt_row(params, isi), vec![0u8; self.symbol_size]);
        }

        for (esi, payload) in self.received.iter() {
            // repair ESIs sit above the padding in ISI space
            let isi = if *esi < k {
                *esi
            } else {
                *esi + (params.kprime - k)
            };
            solver.add_row(lt_row(params, isi), payload.clone());
        }

        if let Err(err) = solver.solve() {
            if self.received.len() >= k as usize + DECODE_OVERHEAD {
                log::warn!(
                    "block does not decode with {} of {} symbols",
                    self.received.len(),
                    k
                );
                return Err(FountainError::DecodeFailure);
            }
            log::debug!("{} symbols are not enough: {}", self.received.len(), err);
            return Err(FountainError::NeedMoreSymbols {
                received: self.received.len(),
                needed: k as usize + 1,
            });
        }

        let intermediate = solver.extract();
        let source = (0..k)
            .map(|isi| lt_encode(params, &intermediate, isi))
            .collect();
        self.source = Some(source);
        Ok(())
    }

    /// A rebuilt source symbol, only after a successful `decode`
    pub fn source_symbol(&self, esi: u32) -> Option<&[u8]> {
        self.source
            .as_ref()
            .and_then(|symbols| symbols.get(esi as usize))
            .map(|symbol| symbol.as_slice())
    }
}
