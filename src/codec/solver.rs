//! Linear-system solvers for the precode and decoding matrices
//!
//! Both the encoder and the decoder reduce to solving `A * C = D` where A
//! stacks constraint and LT rows and D carries the matching symbols. The
//! production path is inactivation decoding, section 5.4.2: the P
//! permanently-inactive columns start outside the sparse phase, surplus
//! columns of multi-degree pivot rows are inactivated as they appear, and
//! the dense residual system over the inactivated columns is eliminated in
//! GF(256). A plain Gauss-Jordan variant is kept as a fallback, it computes
//! the same solution with a worse operation count.

use super::gf256;
use super::matrix::{borrow_two, DenseOctetMatrix};
use crate::tools::error::{FountainError, Result};

/// Strategy used to factor the decoding matrix
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverKind {
    /// Inactivation decoding, section 5.4.2
    Inactivation,
    /// Dense Gauss-Jordan elimination
    GaussJordan,
}

/// A linear system over GF(256), fed row by row and solved once
pub trait LinearSystem: std::fmt::Debug + Send {
    /// Append one equation: `coefficients * C = rhs`
    fn add_row(&mut self, coefficients: Vec<u8>, rhs: Vec<u8>);
    /// Factor the system. Fails if it has no unique solution.
    fn solve(&mut self) -> Result<()>;
    /// Take the solution vector, in natural column order. Empty before a
    /// successful `solve`.
    fn extract(&mut self) -> Vec<Vec<u8>>;
}

/// Build a solver for `nb_unknowns` intermediate symbols, of which the last
/// `pi_columns` are permanently inactive
pub fn new_solver(
    kind: SolverKind,
    nb_unknowns: usize,
    pi_columns: usize,
) -> Box<dyn LinearSystem> {
    match kind {
        SolverKind::Inactivation => Box::new(InactivationDecoder::new(nb_unknowns, pi_columns)),
        SolverKind::GaussJordan => Box::new(GaussJordanDecoder::new(nb_unknowns)),
    }
}

pub struct InactivationDecoder {
    a: DenseOctetMatrix,
    d: Vec<Vec<u8>>,
    // original degree of each row, ties on the sparse phase prefer rows
    // that started sparse so the dense HDPC rows are taken last
    density: Vec<usize>,
    pi_columns: usize,
    col_order: Vec<usize>,
    solution: Vec<Vec<u8>>,
}

impl std::fmt::Debug for InactivationDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InactivationDecoder {:?}", self.a)
    }
}

impl InactivationDecoder {
    pub fn new(nb_unknowns: usize, pi_columns: usize) -> InactivationDecoder {
        debug_assert!(pi_columns < nb_unknowns);
        InactivationDecoder {
            a: DenseOctetMatrix::new(nb_unknowns),
            d: Vec::new(),
            density: Vec::new(),
            pi_columns,
            col_order: (0..nb_unknowns).collect(),
            solution: Vec::new(),
        }
    }

    fn swap_columns(&mut self, x: usize, y: usize) {
        self.a.swap_columns(x, y);
        self.col_order.swap(x, y);
    }

    fn swap_rows(&mut self, x: usize, y: usize) {
        self.a.swap_rows(x, y);
        self.d.swap(x, y);
        self.density.swap(x, y);
    }

    /// Sparse triangulation phase. Returns (i, u): the number of pivots
    /// placed on the sparse diagonal and the number of inactivated columns.
    fn first_phase(&mut self) -> Result<(usize, usize)> {
        let l = self.a.width();
        let m = self.a.height();

        let mut i = 0usize;
        let mut u = self.pi_columns;

        // non-zero count of every row inside the active window
        let mut weights: Vec<usize> = (0..m).map(|r| self.a.count_nonzero(r, 0..l - u)).collect();

        while i + u < l {
            // choose the row with the smallest active degree r >= 1,
            // breaking ties towards the row that was sparsest on entry
            let chosen = (i..m)
                .filter(|r| weights[*r] > 0)
                .min_by_key(|r| (weights[*r], self.density[*r]));
            let Some(chosen) = chosen else {
                log::debug!("sparse phase exhausted at i={} u={} of {}", i, u, l);
                return Err(FountainError::DecodeFailure);
            };

            self.swap_rows(i, chosen);
            weights.swap(i, chosen);

            let cols = self.a.nonzero_columns(i, i..l - u);
            debug_assert_eq!(cols.len(), weights[i]);

            // pivot on the first non-zero column
            self.swap_columns(i, cols[0]);

            // inactivate the other r - 1 columns: move them to the left
            // boundary of U. Processed right-to-left so the pending swaps
            // never alias.
            for col in cols.iter().skip(1).rev() {
                u += 1;
                self.swap_columns(*col, l - u);
                // every row loses this column from its active window
                for (r, w) in weights.iter_mut().enumerate().take(m).skip(i + 1) {
                    if self.a.get(r, l - u) != 0 {
                        *w -= 1;
                    }
                }
            }
            weights[i] = 1;

            // clear the pivot column below the diagonal
            let beta = self.a.get(i, i);
            for row in i + 1..m {
                let alpha = self.a.get(row, i);
                if alpha == 0 {
                    continue;
                }
                let coef = gf256::div(alpha, beta);
                self.a.fma_rows(row, i, coef);
                fma_symbols(&mut self.d, row, i, coef);
                weights[row] = self.a.count_nonzero(row, i + 1..l - u);
            }

            i += 1;
        }

        Ok((i, u))
    }

    /// Gauss-Jordan elimination of the u inactivated columns over the rows
    /// below the sparse diagonal
    fn second_phase(&mut self, i: usize, u: usize) -> Result<()> {
        let l = self.a.width();
        let m = self.a.height();

        for (step, col) in (l - u..l).enumerate() {
            let target = i + step;
            let pivot = (target..m).find(|r| self.a.get(*r, col) != 0);
            let Some(pivot) = pivot else {
                log::debug!("inactivated system is rank deficient at column {}", col);
                return Err(FountainError::DecodeFailure);
            };
            self.swap_rows(target, pivot);

            let beta = self.a.get(target, col);
            if beta != 1 {
                self.a.mul_row(target, gf256::inv(beta));
                gf256::mul_assign_scalar(&mut self.d[target], gf256::inv(beta));
            }

            for row in i..m {
                if row == target {
                    continue;
                }
                let alpha = self.a.get(row, col);
                if alpha != 0 {
                    self.a.fma_rows(row, target, alpha);
                    fma_symbols(&mut self.d, row, target, alpha);
                }
            }
        }

        Ok(())
    }

    /// Fold the solved inactivated symbols into the first i equations, then
    /// walk the sparse diagonal bottom-up
    fn back_substitution(&mut self, i: usize, u: usize) {
        let l = self.a.width();

        for row in 0..i {
            for (step, col) in (l - u..l).enumerate() {
                let alpha = self.a.get(row, col);
                if alpha != 0 {
                    fma_symbols(&mut self.d, row, i + step, alpha);
                    self.a.set(row, col, 0);
                }
            }
        }

        for row in (0..i).rev() {
            for col in row + 1..i {
                let alpha = self.a.get(row, col);
                if alpha != 0 {
                    fma_symbols(&mut self.d, row, col, alpha);
                    self.a.set(row, col, 0);
                }
            }
            let beta = self.a.get(row, row);
            if beta != 1 {
                gf256::mul_assign_scalar(&mut self.d[row], gf256::inv(beta));
            }
        }
    }
}

impl LinearSystem for InactivationDecoder {
    fn add_row(&mut self, coefficients: Vec<u8>, rhs: Vec<u8>) {
        self.density
            .push(coefficients.iter().filter(|v| **v != 0).count());
        self.a.push_row(coefficients);
        self.d.push(rhs);
    }

    fn solve(&mut self) -> Result<()> {
        let l = self.a.width();
        if self.a.height() < l {
            return Err(FountainError::DecodeFailure);
        }

        let (i, u) = self.first_phase()?;
        debug_assert_eq!(i + u, l);
        self.second_phase(i, u)?;
        self.back_substitution(i, u);

        // undo the column permutation
        let mut solution = vec![Vec::new(); l];
        for (pos, orig) in self.col_order.iter().enumerate() {
            solution[*orig] = std::mem::take(&mut self.d[pos]);
        }
        self.solution = solution;
        Ok(())
    }

    fn extract(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.solution)
    }
}

pub struct GaussJordanDecoder {
    a: DenseOctetMatrix,
    d: Vec<Vec<u8>>,
    solution: Vec<Vec<u8>>,
}

impl std::fmt::Debug for GaussJordanDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GaussJordanDecoder {:?}", self.a)
    }
}

impl GaussJordanDecoder {
    pub fn new(nb_unknowns: usize) -> GaussJordanDecoder {
        GaussJordanDecoder {
            a: DenseOctetMatrix::new(nb_unknowns),
            d: Vec::new(),
            solution: Vec::new(),
        }
    }
}

impl LinearSystem for GaussJordanDecoder {
    fn add_row(&mut self, coefficients: Vec<u8>, rhs: Vec<u8>) {
        self.a.push_row(coefficients);
        self.d.push(rhs);
    }

    fn solve(&mut self) -> Result<()> {
        let l = self.a.width();
        let m = self.a.height();
        if m < l {
            return Err(FountainError::DecodeFailure);
        }

        for col in 0..l {
            let pivot = (col..m).find(|r| self.a.get(*r, col) != 0);
            let Some(pivot) = pivot else {
                return Err(FountainError::DecodeFailure);
            };
            self.a.swap_rows(col, pivot);
            self.d.swap(col, pivot);

            let beta = self.a.get(col, col);
            if beta != 1 {
                self.a.mul_row(col, gf256::inv(beta));
                gf256::mul_assign_scalar(&mut self.d[col], gf256::inv(beta));
            }

            for row in 0..m {
                if row == col {
                    continue;
                }
                let alpha = self.a.get(row, col);
                if alpha != 0 {
                    self.a.fma_rows(row, col, alpha);
                    fma_symbols(&mut self.d, row, col, alpha);
                }
            }
        }

        self.solution = self.d.drain(..l).collect();
        Ok(())
    }

    fn extract(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.solution)
    }
}

/// d\[dest\] += d\[src\] * scalar
fn fma_symbols(d: &mut [Vec<u8>], dest: usize, src: usize, scalar: u8) {
    let (dst, src) = borrow_two(d, dest, src);
    gf256::fused_add_mul_scalar(dst, src, scalar);
}
