//! Precode constraint system of RFC 6330 section 5.3.3
//!
//! The L intermediate symbols of a block satisfy S LDPC and H HDPC
//! relations and reproduce the K' padded source symbols through the LT
//! expansion. Encoding solves that system once per block, decoding solves
//! the same system with the LT rows of the received symbols instead.

use super::gf256;
use super::rand::rand;
use super::solver::{new_solver, LinearSystem, SolverKind};
use super::tables::PrecodeParams;
use super::tuple::tuple;
use crate::tools::error::{FountainError, Result};

/// The H HDPC rows, each of length L
///
/// MT x GAMMA of section 5.3.3.3, built with a right-to-left alpha
/// accumulation instead of a dense product:
/// `(MT x GAMMA)[r][c] = MT[r][c] + alpha * (MT x GAMMA)[r][c + 1]`
pub fn hdpc_rows(params: &PrecodeParams) -> Vec<Vec<u8>> {
    let l = params.l() as usize;
    let h = params.h as usize;
    let span = (params.kprime + params.s) as usize;

    let mut rows = vec![vec![0u8; l]; h];
    let mut acc = vec![0u8; h];

    for col in (0..span).rev() {
        for (r, row) in rows.iter_mut().enumerate() {
            let mt = if col == span - 1 {
                gf256::exp(r)
            } else {
                let a = rand(col as u32 + 1, 6, params.h);
                let b = (a + rand(col as u32 + 1, 7, params.h - 1) + 1) % params.h;
                (r as u32 == a || r as u32 == b) as u8
            };
            acc[r] = gf256::mul(acc[r], 2) ^ mt;
            row[col] = acc[r];
        }
    }

    for (r, row) in rows.iter_mut().enumerate() {
        // identity over the HDPC intermediate symbols C[K'+S..L]
        row[span + r] = 1;
    }

    rows
}

/// The S LDPC rows, each of length L, section 5.3.3.3
pub fn ldpc_rows(params: &PrecodeParams) -> Vec<Vec<u8>> {
    let l = params.l() as usize;
    let s = params.s as usize;
    let b = params.b() as usize;
    let w = params.w as usize;
    let p = params.p() as usize;

    let mut rows = vec![vec![0u8; l]; s];

    // circulant part over the B LT-only symbols
    for i in 0..b {
        let a = 1 + i / s;
        let mut pos = i % s;
        rows[pos][i] ^= 1;
        pos = (pos + a) % s;
        rows[pos][i] ^= 1;
        pos = (pos + a) % s;
        rows[pos][i] ^= 1;
    }

    for (i, row) in rows.iter_mut().enumerate() {
        // identity over the LDPC intermediate symbols C[B..B+S]
        row[b + i] = 1;
        // PI part
        row[w + i % p] ^= 1;
        row[w + (i + 1) % p] ^= 1;
    }

    rows
}

/// The LT row of internal symbol `isi`, length L, section 5.3.5.3
pub fn lt_row(params: &PrecodeParams, isi: u32) -> Vec<u8> {
    let mut row = vec![0u8; params.l() as usize];
    lt_visit(params, isi, |col| row[col] ^= 1);
    row
}

/// LT-expand `isi` against the intermediate symbols
pub fn lt_encode(params: &PrecodeParams, intermediate: &[Vec<u8>], isi: u32) -> Vec<u8> {
    let mut symbol = vec![0u8; intermediate[0].len()];
    lt_visit(params, isi, |col| {
        gf256::add_assign(&mut symbol, &intermediate[col])
    });
    symbol
}

/// Walk the intermediate-symbol indices of the LT expansion of `isi`
fn lt_visit<F: FnMut(usize)>(params: &PrecodeParams, isi: u32, mut visit: F) {
    let t = tuple(params, isi);
    let w = params.w;
    let p = params.p();
    let p1 = params.p1();

    let mut b = t.b;
    visit(b as usize);
    for _ in 1..t.d {
        b = (b + t.a) % w;
        visit(b as usize);
    }

    let mut b1 = t.b1;
    while b1 >= p {
        b1 = (b1 + t.a1) % p1;
    }
    visit((w + b1) as usize);
    for _ in 1..t.d1 {
        b1 = (b1 + t.a1) % p1;
        while b1 >= p {
            b1 = (b1 + t.a1) % p1;
        }
        visit((w + b1) as usize);
    }
}

/// Solve for the L intermediate symbols of a block
///
/// `source` holds the K' padded source symbols. The returned vector
/// satisfies every precode constraint and `lt_encode(c, isi) == source[isi]`
/// for isi < K'.
pub fn intermediate_symbols(
    params: &PrecodeParams,
    source: &[Vec<u8>],
    symbol_size: usize,
    kind: SolverKind,
) -> Result<Vec<Vec<u8>>> {
    debug_assert_eq!(source.len(), params.kprime as usize);

    let l = params.l() as usize;
    let mut solver = new_solver(kind, l, params.p() as usize);
    add_constraint_rows(params, symbol_size, solver.as_mut());

    for (isi, symbol) in source.iter().enumerate() {
        debug_assert_eq!(symbol.len(), symbol_size);
        solver.add_row(lt_row(params, isi as u32), symbol.clone());
    }

    solver.solve().map_err(|_| {
        log::error!("precode matrix is singular for K'={}", params.kprime);
        FountainError::PrecodeFailure
    })?;
    Ok(solver.extract())
}

/// Append the H HDPC and S LDPC rows with zero right-hand sides
pub fn add_constraint_rows(
    params: &PrecodeParams,
    symbol_size: usize,
    solver: &mut dyn LinearSystem,
) {
    for row in hdpc_rows(params) {
        solver.add_row(row, vec![0u8; symbol_size]);
    }
    for row in ldpc_rows(params) {
        solver.add_row(row, vec![0u8; symbol_size]);
    }
}
