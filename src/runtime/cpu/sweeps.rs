//! Fixed-point factorization and block-relaxation sweeps for the CPU backend
//!
//! The factorization kernels walk one coordinate entry at a time and merge
//! the two sorted dependency rows, subtracting matched products as they go.
//! The last matched product always involves the entry being recomputed, so
//! it is added back after the walk and the cursor positions left behind
//! identify both the write target and the pivot.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::{typed_view, CpuClient, CpuRuntime};
use crate::array::Array;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::ops::SweepOps;
use crate::runtime::RuntimeClient;
use crate::sparse::{CooData, CsrData, SparseStorage};

struct FactorViews<'a, T> {
    row_ptrs: &'a [i64],
    cols: &'a [i64],
    vals: &'a [T],
}

fn factor_views<'a, T: Element>(
    m: &'a CsrData<CpuRuntime>,
    op: &'static str,
) -> Result<FactorViews<'a, T>> {
    Ok(FactorViews {
        row_ptrs: typed_view::<i64>(m.row_ptrs(), op)?,
        cols: typed_view::<i64>(m.col_indices(), op)?,
        vals: typed_view::<T>(m.values(), op)?,
    })
}

impl SweepOps<CpuRuntime> for CpuClient {
    fn parilu_sweep(
        &self,
        a: &CooData<CpuRuntime>,
        l: &CsrData<CpuRuntime>,
        ut: &CsrData<CpuRuntime>,
    ) -> Result<(Array<CpuRuntime>, Array<CpuRuntime>)> {
        if a.dtype() != l.dtype() || a.dtype() != ut.dtype() {
            return Err(Error::DTypeMismatch {
                lhs: a.dtype(),
                rhs: if a.dtype() != l.dtype() { l.dtype() } else { ut.dtype() },
            });
        }
        crate::dispatch_dtype!(a.dtype(), T => {
            let rows = typed_view::<i64>(a.row_indices(), "parilu_sweep")?;
            let cols = typed_view::<i64>(a.col_indices(), "parilu_sweep")?;
            let avals = typed_view::<T>(a.values(), "parilu_sweep")?;
            let lv = factor_views::<T>(l, "parilu_sweep")?;
            let uv = factor_views::<T>(ut, "parilu_sweep")?;

            // (true, pos, v) updates L values, (false, pos, v) updates Uᵀ.
            let entry = |k: usize| -> (bool, usize, f64) {
                let i = rows[k] as usize;
                let j = cols[k] as usize;
                let mut s = avals[k].to_f64();
                let mut sp = 0.0f64;

                let mut il = lv.row_ptrs[i] as usize;
                let il_end = lv.row_ptrs[i + 1] as usize;
                let mut iu = uv.row_ptrs[j] as usize;
                let iu_end = uv.row_ptrs[j + 1] as usize;
                while il < il_end && iu < iu_end {
                    let jl = lv.cols[il];
                    let ju = uv.cols[iu];
                    if jl < ju {
                        il += 1;
                    } else if ju < jl {
                        iu += 1;
                    } else {
                        sp = lv.vals[il].to_f64() * uv.vals[iu].to_f64();
                        s -= sp;
                        il += 1;
                        iu += 1;
                    }
                }
                s += sp; // the last match was the entry itself

                if i > j {
                    debug_assert_eq!(lv.cols[il - 1] as usize, j);
                    (true, il - 1, s / uv.vals[iu - 1].to_f64())
                } else {
                    debug_assert_eq!(uv.cols[iu - 1] as usize, i);
                    (false, iu - 1, s)
                }
            };

            #[cfg(feature = "rayon")]
            let updates: Vec<(bool, usize, f64)> =
                (0..avals.len()).into_par_iter().map(entry).collect();
            #[cfg(not(feature = "rayon"))]
            let updates: Vec<(bool, usize, f64)> = (0..avals.len()).map(entry).collect();

            let mut new_l = lv.vals.to_vec();
            let mut new_ut = uv.vals.to_vec();
            for (lower, pos, v) in updates {
                if lower {
                    new_l[pos] = T::from_f64(v);
                } else {
                    new_ut[pos] = T::from_f64(v);
                }
            }
            Ok((
                Array::from_slice(&new_l, l.values().location(), self.device())?,
                Array::from_slice(&new_ut, ut.values().location(), self.device())?,
            ))
        }, "parilu_sweep")
    }

    fn paric_sweep(
        &self,
        a: &CooData<CpuRuntime>,
        l: &CsrData<CpuRuntime>,
    ) -> Result<Array<CpuRuntime>> {
        if a.dtype() != l.dtype() {
            return Err(Error::DTypeMismatch {
                lhs: a.dtype(),
                rhs: l.dtype(),
            });
        }
        crate::dispatch_dtype!(a.dtype(), T => {
            let rows = typed_view::<i64>(a.row_indices(), "paric_sweep")?;
            let cols = typed_view::<i64>(a.col_indices(), "paric_sweep")?;
            let avals = typed_view::<T>(a.values(), "paric_sweep")?;
            let lv = factor_views::<T>(l, "paric_sweep")?;

            let entry = |k: usize| -> Result<(usize, f64)> {
                let i = rows[k] as usize;
                let j = cols[k] as usize;
                let mut s = avals[k].to_f64();
                let mut sp = 0.0f64;

                let mut ii = lv.row_ptrs[i] as usize;
                let ii_end = lv.row_ptrs[i + 1] as usize;
                let mut ij = lv.row_ptrs[j] as usize;
                let ij_end = lv.row_ptrs[j + 1] as usize;
                while ii < ii_end && ij < ij_end {
                    let ci = lv.cols[ii];
                    let cj = lv.cols[ij];
                    if ci < cj {
                        ii += 1;
                    } else if cj < ci {
                        ij += 1;
                    } else {
                        sp = lv.vals[ii].to_f64() * lv.vals[ij].to_f64();
                        s -= sp;
                        ii += 1;
                        ij += 1;
                    }
                }
                s += sp;

                debug_assert_eq!(lv.cols[ii - 1] as usize, j);
                if i == j {
                    if s <= 0.0 {
                        return Err(Error::NotPositiveDefinite { row: i });
                    }
                    Ok((ii - 1, s.sqrt()))
                } else {
                    Ok((ii - 1, s / lv.vals[ij - 1].to_f64()))
                }
            };

            #[cfg(feature = "rayon")]
            let updates: Vec<(usize, f64)> = (0..avals.len())
                .into_par_iter()
                .map(entry)
                .collect::<Result<_>>()?;
            #[cfg(not(feature = "rayon"))]
            let updates: Vec<(usize, f64)> =
                (0..avals.len()).map(entry).collect::<Result<_>>()?;

            let mut new_l = lv.vals.to_vec();
            for (pos, v) in updates {
                new_l[pos] = T::from_f64(v);
            }
            Array::from_slice(&new_l, l.values().location(), self.device())
        }, "paric_sweep")
    }

    fn bajac_overlap_sweep(
        &self,
        parts: &[(CsrData<CpuRuntime>, CsrData<CpuRuntime>)],
        diag: &Array<CpuRuntime>,
        b: &Array<CpuRuntime>,
        x: &Array<CpuRuntime>,
        localiter: usize,
    ) -> Result<Array<CpuRuntime>> {
        let n = b.len();
        if diag.len() != n || x.len() != n {
            return Err(Error::ShapeMismatch {
                expected: vec![n],
                got: vec![if diag.len() != n { diag.len() } else { x.len() }],
            });
        }
        crate::dispatch_dtype!(b.dtype(), T => {
            let d = typed_view::<T>(diag, "bajac_overlap_sweep")?;
            let rhs = typed_view::<T>(b, "bajac_overlap_sweep")?;
            let seed = typed_view::<T>(x, "bajac_overlap_sweep")?;

            let mut cur: Vec<f64> = seed.iter().map(|v| v.to_f64()).collect();
            let mut next = vec![0.0f64; n];
            let mut z = vec![0.0f64; n];

            for (dmat, rmat) in parts {
                let dv = factor_views::<T>(dmat, "bajac_overlap_sweep")?;
                let rv = factor_views::<T>(rmat, "bajac_overlap_sweep")?;

                // off-block contribution, frozen at the entering iterate
                let freeze = |r: usize| -> f64 {
                    let mut acc = rhs[r].to_f64();
                    for pos in rv.row_ptrs[r] as usize..rv.row_ptrs[r + 1] as usize {
                        acc -= rv.vals[pos].to_f64() * cur[rv.cols[pos] as usize];
                    }
                    acc
                };
                #[cfg(feature = "rayon")]
                {
                    z.par_iter_mut().enumerate().for_each(|(r, slot)| *slot = freeze(r));
                }
                #[cfg(not(feature = "rayon"))]
                {
                    for (r, slot) in z.iter_mut().enumerate() {
                        *slot = freeze(r);
                    }
                }

                for _ in 0..localiter {
                    let refine = |r: usize| -> f64 {
                        let mut sum = 0.0f64;
                        for pos in dv.row_ptrs[r] as usize..dv.row_ptrs[r + 1] as usize {
                            let c = dv.cols[pos] as usize;
                            if c != r {
                                sum += dv.vals[pos].to_f64() * cur[c];
                            }
                        }
                        (z[r] - sum) / d[r].to_f64()
                    };
                    #[cfg(feature = "rayon")]
                    {
                        next.par_iter_mut().enumerate().for_each(|(r, slot)| *slot = refine(r));
                    }
                    #[cfg(not(feature = "rayon"))]
                    {
                        for (r, slot) in next.iter_mut().enumerate() {
                            *slot = refine(r);
                        }
                    }
                    std::mem::swap(&mut cur, &mut next);
                }
            }

            let out: Vec<T> = cur.iter().map(|&v| T::from_f64(v)).collect();
            Array::from_slice(&out, x.location(), self.device())
        }, "bajac_overlap_sweep")
    }

    fn jacobi_select_update(
        &self,
        a: &CsrData<CpuRuntime>,
        indices: &Array<CpuRuntime>,
        b: &Array<CpuRuntime>,
        x: &Array<CpuRuntime>,
    ) -> Result<Array<CpuRuntime>> {
        let n = a.nrows();
        if b.len() != n || x.len() != n {
            return Err(Error::ShapeMismatch {
                expected: vec![n],
                got: vec![if b.len() != n { b.len() } else { x.len() }],
            });
        }
        crate::dispatch_dtype!(a.dtype(), T => {
            let av = factor_views::<T>(a, "jacobi_select_update")?;
            let idx = typed_view::<i64>(indices, "jacobi_select_update")?;
            let rhs = typed_view::<T>(b, "jacobi_select_update")?;
            let seed = typed_view::<T>(x, "jacobi_select_update")?;

            let mut cur: Vec<f64> = seed.iter().map(|v| v.to_f64()).collect();
            // updates are ordered and see each other, so no parallel form
            for &raw in idx {
                let r = raw as usize;
                if raw < 0 || r >= n {
                    return Err(Error::IndexOutOfBounds {
                        index: raw.max(0) as usize,
                        size: n,
                    });
                }
                let mut sum = 0.0f64;
                let mut dval = None;
                for pos in av.row_ptrs[r] as usize..av.row_ptrs[r + 1] as usize {
                    let c = av.cols[pos] as usize;
                    if c == r {
                        dval = Some(av.vals[pos].to_f64());
                    } else {
                        sum += av.vals[pos].to_f64() * cur[c];
                    }
                }
                match dval {
                    Some(d) if d != 0.0 => cur[r] = (rhs[r].to_f64() - sum) / d,
                    _ => return Err(Error::MissingDiagonal { row: r }),
                }
            }

            let out: Vec<T> = cur.iter().map(|&v| T::from_f64(v)).collect();
            Array::from_slice(&out, x.location(), self.device())
        }, "jacobi_select_update")
    }
}
