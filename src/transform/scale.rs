//! Diagonal and row-norm equilibration

use super::expect_square;
use crate::array::{Array, MemLocation};
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::sparse::{SparseMatrix, SparseStorage};

/// Equilibration strategy for [`scale`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScaleKind {
    /// Symmetric scaling `D^(-1/2) A D^(-1/2)` so diagonal magnitudes
    /// become one.
    UnitDiag,
    /// Row scaling so every row has unit 2-norm.
    UnitRowNorm,
}

/// Scale a square host CSR matrix in place, returning the per-row scaling
/// factors that were applied.
///
/// `UnitDiag` multiplies entry `(i, j)` by `s_i * s_j` with
/// `s_i = 1 / sqrt(|a_ii|)`; `UnitRowNorm` multiplies row `i` by
/// `s_i = 1 / ||row_i||_2`. Solvers scale once up front and fold the
/// factors back into the solution afterwards.
///
/// # Errors
/// * [`MissingDiagonal`](crate::error::Error::MissingDiagonal) when
///   `UnitDiag` meets a row whose diagonal is absent or exactly zero
/// * [`InvalidArgument`](crate::error::Error::InvalidArgument) when
///   `UnitRowNorm` meets an empty row
pub fn scale<R: Runtime>(a: &mut SparseMatrix<R>, kind: ScaleKind) -> Result<Array<R>> {
    let format = a.format();
    let csr = match a {
        SparseMatrix::Csr(csr) => csr,
        _ => {
            return Err(Error::UnsupportedFormat {
                format,
                op: "scale",
            })
        }
    };
    if csr.location() != MemLocation::Host {
        return Err(Error::UnsupportedLocation {
            op: "scale",
            required: "host",
        });
    }
    let n = expect_square(csr)?;
    let device = csr.values().device().clone();

    crate::dispatch_dtype!(csr.dtype(), T => {
        let factors = {
            let (row_ptrs, cols, vals) = csr.host_views::<T>("scale")?;
            let mut s = vec![0.0f64; n];
            for r in 0..n {
                let lo = row_ptrs[r] as usize;
                let hi = row_ptrs[r + 1] as usize;
                match kind {
                    ScaleKind::UnitDiag => {
                        let d = (lo..hi)
                            .find(|&p| cols[p] as usize == r)
                            .map(|p| vals[p].to_f64())
                            .unwrap_or(0.0);
                        if d == 0.0 {
                            return Err(Error::MissingDiagonal { row: r });
                        }
                        s[r] = 1.0 / d.abs().sqrt();
                    }
                    ScaleKind::UnitRowNorm => {
                        let norm2: f64 = vals[lo..hi].iter().map(|v| {
                            let x = v.to_f64();
                            x * x
                        }).sum();
                        if norm2 == 0.0 {
                            return Err(Error::InvalidArgument {
                                arg: "a",
                                reason: format!("row {r} has no nonzero entries"),
                            });
                        }
                        s[r] = 1.0 / norm2.sqrt();
                    }
                }
            }

            let mut scaled = vals.to_vec();
            for r in 0..n {
                for p in row_ptrs[r] as usize..row_ptrs[r + 1] as usize {
                    let factor = match kind {
                        ScaleKind::UnitDiag => s[r] * s[cols[p] as usize],
                        ScaleKind::UnitRowNorm => s[r],
                    };
                    scaled[p] = T::from_f64(scaled[p].to_f64() * factor);
                }
            }

            csr.update_values(Array::from_slice(&scaled, MemLocation::Host, &device)?)?;
            s
        };

        let typed: Vec<T> = factors.iter().map(|&v| T::from_f64(v)).collect();
        Array::from_slice(&typed, MemLocation::Host, &device)
    }, "scale")
}
