//! Symbolic level-of-fill pattern expansion
//!
//! Implements the level-sum rule used by ILU(k): original entries carry
//! level 0, and a position (i, j) reachable through a pivot k gets
//! `level(i,k) + level(k,j) + 1`. Entries whose minimal level stays within
//! the requested bound join the pattern with a zero value; the fixed-point
//! sweeps then compute their numeric content.

use std::collections::HashMap;

use crate::array::MemLocation;
use crate::dtype::Element;
use crate::error::Result;
use crate::runtime::Runtime;
use crate::sparse::{CsrData, SparseStorage};

/// Expand the pattern of a square host CSR matrix with all fill positions
/// of level at most `levels`.
///
/// The returned matrix keeps `a`'s values on the original positions and
/// stores explicit zeros on fill positions, with sorted columns per row.
/// With `levels == 0` the pattern is unchanged.
pub(crate) fn fill_pattern<R: Runtime>(a: &CsrData<R>, levels: usize) -> Result<CsrData<R>> {
    let n = a.nrows();
    let device = a.values().device().clone();

    crate::dispatch_dtype!(a.dtype(), T => {
        let (row_ptrs, cols, vals) = a.host_views::<T>("fill_pattern")?;

        // level map per row, seeded with the original entries at level 0
        let mut level: Vec<HashMap<usize, usize>> = vec![HashMap::new(); n];
        for r in 0..n {
            for p in row_ptrs[r] as usize..row_ptrs[r + 1] as usize {
                level[r].insert(cols[p] as usize, 0);
            }
        }

        if levels > 0 {
            for i in 0..n {
                let mut pivots: Vec<usize> =
                    level[i].keys().filter(|&&k| k < i).copied().collect();
                pivots.sort_unstable();
                let mut cursor = 0;
                while cursor < pivots.len() {
                    let k = pivots[cursor];
                    cursor += 1;
                    let lev_ik = level[i][&k];
                    let row_k: Vec<(usize, usize)> = level[k]
                        .iter()
                        .filter(|&(&j, _)| j > k)
                        .map(|(&j, &lev)| (j, lev))
                        .collect();
                    for (j, lev_kj) in row_k {
                        let candidate = lev_ik + lev_kj + 1;
                        if candidate > levels {
                            continue;
                        }
                        let entry = level[i].entry(j).or_insert(usize::MAX);
                        if candidate < *entry {
                            let was_new = *entry == usize::MAX;
                            *entry = candidate;
                            // a new sub-diagonal entry becomes a pivot too
                            if was_new && j < i {
                                let pos = pivots.binary_search(&j).unwrap_or_else(|e| e);
                                if pos >= cursor {
                                    pivots.insert(pos, j);
                                }
                            }
                        }
                    }
                }
            }
        }

        let mut out_ptrs = vec![0i64; n + 1];
        let mut out_cols = Vec::new();
        let mut out_vals = Vec::new();
        for r in 0..n {
            let mut row: Vec<usize> = level[r].keys().copied().collect();
            row.sort_unstable();
            let lo = row_ptrs[r] as usize;
            let hi = row_ptrs[r + 1] as usize;
            for c in row {
                out_cols.push(c as i64);
                let original = (lo..hi).find(|&p| cols[p] as usize == c);
                out_vals.push(match original {
                    Some(p) => vals[p],
                    None => T::zero(),
                });
            }
            out_ptrs[r + 1] = out_cols.len() as i64;
        }

        log::debug!(
            "fill_pattern: level {} grew nnz {} -> {}",
            levels,
            cols.len(),
            out_cols.len()
        );
        CsrData::from_slices(&out_ptrs, &out_cols, &out_vals, a.shape(), MemLocation::Host, &device)
    }, "fill_pattern")
}
