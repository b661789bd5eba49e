//! RaptorQ object encoder
//!
//! Splits the object into Z source blocks and serves encoding symbols per
//! block. Block state is created lazily: the first request for a block (or
//! an explicit precompute) builds its handle, inserts it in the registry and
//! schedules the precode solve of that block in the background. Symbol
//! requests for source ESIs read the object directly, repair ESIs wait for
//! the intermediate symbols of the block.
//!
//! Locking is two-level and strictly ordered: the registry mutex protects
//! the SBN map and is never held across a solve, each block handle carries
//! its own mutex guarding the solver state. Workers hold shared-ownership
//! references, dropping the encoder while a background solve runs is safe.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::codec::blockenc::BlockEncoder;
use crate::codec::interleaver::Interleaver;
use crate::codec::solver::SolverKind;
use crate::codec::tables::{self, PrecodeParams};
use crate::common::oti::{ObjectTransmissionInformation, PayloadId, MAX_ESI, MAX_SOURCE_BLOCKS};
use crate::tools::error::{FountainError, Result};

///
/// Configuration of the `Encoder`
///
#[derive(Clone, Debug)]
pub struct EncoderConfig {
    /// Symbol size (T) in bytes, every encoding symbol has this size
    pub symbol_size: u16,
    /// Symbol alignment (Al) in bytes, must divide the symbol size
    pub symbol_alignment: u8,
    /// Smallest sub-symbol the interleaver may produce, in bytes.
    /// Equal to the symbol size, sub-blocking is disabled.
    pub min_sub_symbol_size: u16,
    /// Working memory target (WS) for decoding one block, in bytes. Bounds
    /// the block size and with it the number of source blocks.
    pub max_memory: usize,
    /// Strategy used to factor the precode matrix
    pub solver: SolverKind,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfig {
            symbol_size: 1280,
            symbol_alignment: 4,
            min_sub_symbol_size: 1280,
            max_memory: 4 * 1024 * 1024,
            solver: SolverKind::Inactivation,
        }
    }
}

///
/// RaptorQ encoder of one object
///
/// ```
/// use fountainq::encoder::{Encoder, EncoderConfig};
///
/// let data = vec![0xA5u8; 4096];
/// let config = EncoderConfig {
///     symbol_size: 64,
///     ..Default::default()
/// };
/// let encoder = Encoder::new(&data, config).unwrap();
/// let mut symbol = vec![0u8; 64];
/// encoder.encode(0, 0, &mut symbol).unwrap();
/// assert_eq!(&symbol[..], &data[0..64]);
/// ```
///
pub struct Encoder {
    shared: Arc<EncoderShared>,
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Encoder {{ oti: {:?} }}", self.shared.oti)
    }
}

struct EncoderShared {
    oti: ObjectTransmissionInformation,
    data: Vec<u8>,
    solver: SolverKind,
    blocks: Mutex<BTreeMap<u8, Arc<LockedEncoder>>>,
}

/// One block handle: the gathered source symbols plus the lazily computed
/// intermediate symbols behind their own lock
#[derive(Debug)]
struct LockedEncoder {
    encoder: BlockEncoder,
    busy: Mutex<()>,
    intermediate: OnceLock<Result<Arc<Vec<Vec<u8>>>>>,
}

impl LockedEncoder {
    fn new(encoder: BlockEncoder) -> LockedEncoder {
        LockedEncoder {
            encoder,
            busy: Mutex::new(()),
            intermediate: OnceLock::new(),
        }
    }

    /// Solve the block under the handle lock, first caller wins
    fn generate(&self) {
        if self.intermediate.get().is_some() {
            return;
        }
        let result = self.encoder.compute_intermediate().map(Arc::new);
        if let Err(err) = result.as_ref() {
            // recorded on the handle, the next encode surfaces it
            log::error!("background precompute failed: {}", err);
        }
        let _ = self.intermediate.set(result);
    }

    /// Wait for the intermediate symbols, computing them if nobody else is
    fn intermediate(&self) -> Result<Arc<Vec<Vec<u8>>>> {
        if let Some(result) = self.intermediate.get() {
            return result.clone();
        }
        let _guard = self.busy.lock().unwrap();
        self.generate();
        self.intermediate.get().unwrap().clone()
    }

    /// Solve unless another worker already owns the block. Contended
    /// handles are skipped, the owner finishes the job.
    fn try_generate(&self) {
        if let Ok(_guard) = self.busy.try_lock() {
            self.generate();
        }
    }
}

impl EncoderShared {
    fn interleaver(&self, nb_symbols: u32) -> Interleaver {
        Interleaver::new(
            nb_symbols,
            self.oti.symbol_size(),
            self.oti.symbol_alignment(),
            self.oti.sub_blocks(),
        )
    }

    fn block_region(&self, sbn: u8) -> &[u8] {
        let start = self.oti.block_offset(sbn) as usize;
        let end = std::cmp::min(
            start + self.oti.block_partition().size_of(sbn as u32) as usize
                * self.oti.symbol_size() as usize,
            self.data.len(),
        );
        &self.data[start..end]
    }

    /// Look up or create the handle of a block. Creation happens outside
    /// the registry lock. When `schedule` is set, inserting kicks off a
    /// background solve of the block.
    fn block_handle(self: &Arc<Self>, sbn: u8, schedule: bool) -> Result<Arc<LockedEncoder>> {
        {
            let blocks = self.blocks.lock().unwrap();
            if let Some(handle) = blocks.get(&sbn) {
                return Ok(handle.clone());
            }
        }

        let nb_symbols = self.oti.symbols(sbn)? as u32;
        let candidate = Arc::new(LockedEncoder::new(BlockEncoder::new(
            self.block_region(sbn),
            nb_symbols,
            &self.interleaver(nb_symbols),
            self.oti.symbol_size(),
            self.solver,
        )?));

        let handle = {
            let mut blocks = self.blocks.lock().unwrap();
            blocks.entry(sbn).or_insert(candidate).clone()
        };

        if schedule {
            let worker = handle.clone();
            std::thread::spawn(move || worker.try_generate());
        }

        Ok(handle)
    }

    /// Worker loop of `precompute`: claim SBNs from the shared counter and
    /// solve the unclaimed ones
    fn precompute_worker(self: &Arc<Self>, next_sbn: &AtomicU32) {
        loop {
            let sbn = next_sbn.fetch_add(1, Ordering::Relaxed);
            if sbn >= self.oti.source_blocks() as u32 {
                return;
            }
            match self.block_handle(sbn as u8, false) {
                Ok(handle) => handle.try_generate(),
                Err(err) => log::error!("cannot precompute block {}: {}", sbn, err),
            }
        }
    }

    fn precompute_all(self: Arc<Self>, threads: usize) {
        let nb_workers = match threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        };

        let next_sbn = Arc::new(AtomicU32::new(0));
        let mut workers = Vec::with_capacity(nb_workers - 1);
        for _ in 1..nb_workers {
            let shared = self.clone();
            let counter = next_sbn.clone();
            workers.push(std::thread::spawn(move || {
                shared.precompute_worker(&counter)
            }));
        }

        self.precompute_worker(&next_sbn);

        for worker in workers {
            worker.join().ok();
        }
    }
}

impl Encoder {
    /// Create an encoder over a read-only object
    ///
    /// The number of source blocks (Z) and sub-blocks (N) are derived from
    /// the symbol size, the sub-symbol floor and the working-memory target,
    /// following RFC 6330 section 4.3.
    pub fn new(data: &[u8], config: EncoderConfig) -> Result<Encoder> {
        let (source_blocks, sub_blocks) = derive_partitioning(data.len() as u64, &config)?;
        let oti = ObjectTransmissionInformation::new(
            data.len() as u64,
            config.symbol_size,
            source_blocks,
            sub_blocks,
            config.symbol_alignment,
        )?;
        log::debug!(
            "F={} T={} Z={} N={} Al={}",
            data.len(),
            config.symbol_size,
            source_blocks,
            sub_blocks,
            config.symbol_alignment
        );

        Ok(Encoder {
            shared: Arc::new(EncoderShared {
                oti,
                data: data.to_vec(),
                solver: config.solver,
                blocks: Mutex::new(BTreeMap::new()),
            }),
        })
    }

    /// The transport parameters of this encoder
    pub fn oti(&self) -> ObjectTransmissionInformation {
        self.shared.oti
    }

    /// Common FEC OTI to hand to the decoder
    pub fn oti_common(&self) -> u64 {
        self.shared.oti.oti_common()
    }

    /// Scheme-specific FEC OTI to hand to the decoder
    pub fn oti_scheme_specific(&self) -> u32 {
        self.shared.oti.oti_scheme_specific()
    }

    /// Number of source blocks (Z)
    pub fn blocks(&self) -> u16 {
        self.shared.oti.source_blocks()
    }

    /// Number of source symbols of block `sbn`
    pub fn symbols(&self, sbn: u8) -> Result<u16> {
        self.shared.oti.symbols(sbn)
    }

    /// Size of block `sbn` in bytes, padding included
    pub fn block_size(&self, sbn: u8) -> Result<usize> {
        let symbols = self.shared.oti.symbols(sbn)? as usize;
        Ok(symbols * self.shared.oti.symbol_size() as usize)
    }

    /// Symbol size (T) in bytes
    pub fn symbol_size(&self) -> u16 {
        self.shared.oti.symbol_size()
    }

    /// Number of repair symbols block `sbn` can still produce
    pub fn max_repair(&self, sbn: u8) -> Result<u32> {
        let symbols = self.shared.oti.symbols(sbn)? as u32;
        Ok(MAX_ESI + 1 - symbols)
    }

    /// Write encoding symbol (`sbn`, `esi`) into `out`, returning the
    /// number of bytes written
    pub fn encode(&self, sbn: u8, esi: u32, out: &mut [u8]) -> Result<usize> {
        let nb_symbols = self.shared.oti.symbols(sbn)? as u32;
        if esi > MAX_ESI {
            return Err(FountainError::EsiOutOfRange(esi));
        }
        let symbol_size = self.shared.oti.symbol_size() as usize;
        if out.len() < symbol_size {
            return Err(FountainError::BufferTooSmall {
                needed: symbol_size,
                available: out.len(),
            });
        }

        let handle = self.shared.block_handle(sbn, true)?;
        if esi < nb_symbols {
            out[..symbol_size].copy_from_slice(handle.encoder.source_symbol(esi));
        } else {
            let intermediate = handle.intermediate()?;
            let symbol = handle.encoder.repair_symbol(&intermediate, esi);
            out[..symbol_size].copy_from_slice(&symbol);
        }
        Ok(symbol_size)
    }

    /// Like [`Encoder::encode`] with the packed 32-bit symbol identifier
    pub fn encode_id(&self, id: u32, out: &mut [u8]) -> Result<usize> {
        let payload_id = PayloadId::unpack(id);
        self.encode(payload_id.sbn, payload_id.esi, out)
    }

    /// Solve the precode system of every block with up to `threads` workers
    /// (0 selects the hardware concurrency). The background variant returns
    /// immediately, the work continues even if the encoder is dropped.
    pub fn precompute(&self, threads: usize, background: bool) {
        let shared = self.shared.clone();
        if background {
            std::thread::spawn(move || shared.precompute_all(threads));
        } else {
            shared.precompute_all(threads);
        }
    }

    /// Upper bound of the memory one block solve takes, to size the number
    /// of concurrent precomputations
    pub fn precompute_max_memory(&self) -> usize {
        let Ok(symbols) = self.shared.oti.symbols(0) else {
            return 0;
        };
        let Ok(params) = PrecodeParams::for_block(symbols as u32) else {
            return 0;
        };
        let l = params.l() as usize;
        // matrices A and X, plus the D symbol vector
        l * l * 2 + self.shared.oti.symbol_size() as usize * l
    }

    /// Drop the cached state of block `sbn`
    pub fn free(&self, sbn: u8) {
        let mut blocks = self.shared.blocks.lock().unwrap();
        blocks.remove(&sbn);
    }

    /// Iterate over the source blocks of the object
    pub fn iter(&self) -> BlockRefIter<'_> {
        BlockRefIter {
            encoder: self,
            sbn: 0,
            nb_blocks: self.blocks(),
        }
    }
}

/// Derive (Z, N) from the transfer length and the encoder configuration,
/// RFC 6330 section 4.3
fn derive_partitioning(transfer_length: u64, config: &EncoderConfig) -> Result<(u16, u16)> {
    let t = config.symbol_size as u64;
    let al = config.symbol_alignment as u64;
    if t == 0 || al == 0 || t % al != 0 {
        return Err(FountainError::InvalidParameters(format!(
            "alignment {} does not divide symbol size {}",
            al, t
        )));
    }
    if (config.min_sub_symbol_size as u64) < al {
        return Err(FountainError::InvalidParameters(
            "sub-symbol floor below the symbol alignment".to_owned(),
        ));
    }

    let kt = num_integer::div_ceil(transfer_length, t);
    // a sub-symbol floor at or above the symbol size disables sub-blocking
    let n_max = std::cmp::max(t / config.min_sub_symbol_size as u64, 1);

    // largest block, in symbols, that fits the working memory when split
    // into n sub-blocks
    let kl = |n: u64| -> Option<u32> {
        let sub_symbol = al * num_integer::div_ceil(t, al * n);
        tables::max_kprime_at_most(config.max_memory as u64 / sub_symbol)
    };

    let Some(kl_max) = kl(n_max) else {
        return Err(FountainError::InvalidParameters(
            "working memory too small for a single symbol".to_owned(),
        ));
    };

    let source_blocks = num_integer::div_ceil(kt, kl_max as u64);
    if source_blocks > MAX_SOURCE_BLOCKS as u64 {
        return Err(FountainError::InvalidParameters(format!(
            "object needs {} source blocks, max is {}",
            source_blocks, MAX_SOURCE_BLOCKS
        )));
    }
    let source_blocks = std::cmp::max(source_blocks, 1);

    let symbols_per_block = num_integer::div_ceil(kt, source_blocks);
    let sub_blocks = (1..=n_max)
        .find(|n| kl(*n).map(|k| symbols_per_block <= k as u64).unwrap_or(false))
        .unwrap_or(n_max);

    Ok((source_blocks as u16, sub_blocks as u16))
}

///
/// Lazy, restartable view over the blocks of an encoder
///
#[derive(Debug)]
pub struct BlockRefIter<'a> {
    encoder: &'a Encoder,
    sbn: u16,
    nb_blocks: u16,
}

impl<'a> Iterator for BlockRefIter<'a> {
    type Item = BlockRef<'a>;

    fn next(&mut self) -> Option<BlockRef<'a>> {
        if self.sbn >= self.nb_blocks {
            return None;
        }
        let sbn = self.sbn as u8;
        self.sbn += 1;
        Some(BlockRef {
            encoder: self.encoder,
            sbn,
        })
    }
}

///
/// One source block of the encoder
///
#[derive(Clone, Copy, Debug)]
pub struct BlockRef<'a> {
    encoder: &'a Encoder,
    sbn: u8,
}

impl<'a> BlockRef<'a> {
    /// Source Block Number
    pub fn sbn(&self) -> u8 {
        self.sbn
    }

    /// Number of source symbols of this block
    pub fn nb_source_symbols(&self) -> u16 {
        self.encoder.symbols(self.sbn).unwrap_or(0)
    }

    /// Iterator over the source symbols of the block
    pub fn source_symbols(&self) -> SymbolRefIter<'a> {
        SymbolRefIter {
            encoder: self.encoder,
            sbn: self.sbn,
            esi: 0,
            end: self.nb_source_symbols() as u32,
        }
    }

    /// Iterator over the first `nb` repair symbols of the block
    pub fn repair_symbols(&self, nb: u32) -> SymbolRefIter<'a> {
        let k = self.nb_source_symbols() as u32;
        let nb = std::cmp::min(nb, MAX_ESI + 1 - k);
        SymbolRefIter {
            encoder: self.encoder,
            sbn: self.sbn,
            esi: k,
            end: k + nb,
        }
    }
}

///
/// Lazy, restartable view over a range of encoding symbols
///
#[derive(Debug)]
pub struct SymbolRefIter<'a> {
    encoder: &'a Encoder,
    sbn: u8,
    esi: u32,
    end: u32,
}

impl<'a> Iterator for SymbolRefIter<'a> {
    type Item = SymbolRef<'a>;

    fn next(&mut self) -> Option<SymbolRef<'a>> {
        if self.esi >= self.end {
            return None;
        }
        let esi = self.esi;
        self.esi += 1;
        Some(SymbolRef {
            encoder: self.encoder,
            sbn: self.sbn,
            esi,
        })
    }
}

///
/// One encoding symbol, not yet materialized
///
#[derive(Clone, Copy, Debug)]
pub struct SymbolRef<'a> {
    encoder: &'a Encoder,
    sbn: u8,
    esi: u32,
}

impl SymbolRef<'_> {
    /// Identifier of this symbol
    pub fn payload_id(&self) -> PayloadId {
        PayloadId::new(self.sbn, self.esi)
    }

    /// Write the symbol into `out`
    pub fn encode_into(&self, out: &mut [u8]) -> Result<usize> {
        self.encoder.encode(self.sbn, self.esi, out)
    }

    /// Materialize the symbol
    pub fn data(&self) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.encoder.symbol_size() as usize];
        self.encoder.encode(self.sbn, self.esi, &mut out)?;
        Ok(out)
    }
}
