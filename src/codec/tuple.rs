//! Tuple generator of RFC 6330 section 5.3.5.4
//!
//! Maps an Internal Symbol ID to the (d, a, b, d1, a1, b1) tuple driving the
//! LT expansion of the corresponding encoding symbol. Pure and stable: the
//! same (K', X) always yields the same tuple.

use super::rand::{deg, rand};
use super::tables::PrecodeParams;

/// The (d, a, b, d1, a1, b1) tuple of one encoding symbol
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tuple {
    /// LT degree
    pub d: u32,
    /// LT stride
    pub a: u32,
    /// LT start index
    pub b: u32,
    /// PI degree, 2 or 3
    pub d1: u32,
    /// PI stride
    pub a1: u32,
    /// PI start index
    pub b1: u32,
}

/// Tuple\[K', X\]
pub fn tuple(params: &PrecodeParams, internal_symbol_id: u32) -> Tuple {
    let j = params.j;
    let w = params.w;
    let p1 = params.p1();

    let mut a = 53591 + j * 997;
    if a % 2 == 0 {
        a += 1;
    }
    let b = 10267 * (j + 1);

    let y = (b as u64 + internal_symbol_id as u64 * a as u64) as u32;
    let v = rand(y, 0, 1 << 20);

    let d = deg(v, w);
    let a = 1 + rand(y, 1, w - 1);
    let b = rand(y, 2, w);

    let d1 = if d < 4 {
        2 + rand(internal_symbol_id, 3, 2)
    } else {
        2
    };
    let a1 = 1 + rand(internal_symbol_id, 4, p1 - 1);
    let b1 = rand(internal_symbol_id, 5, p1);

    Tuple {
        d,
        a,
        b,
        d1,
        a1,
        b1,
    }
}
