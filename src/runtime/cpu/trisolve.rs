//! Triangular solves for the CPU backend
//!
//! Exact substitution runs sequentially row by row in f64 working precision.
//! The sweep approximation is row-parallel: each sweep reads the previous
//! iterate and writes a fresh one.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::{typed_view, CpuClient, CpuRuntime};
use crate::array::Array;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::ops::TriangularOps;
use crate::runtime::RuntimeClient;
use crate::sparse::{CsrData, SparseStorage};

fn check_system(
    factor: &CsrData<CpuRuntime>,
    b: &Array<CpuRuntime>,
    op: &'static str,
) -> Result<usize> {
    let [nrows, ncols] = factor.shape();
    if nrows != ncols {
        return Err(Error::ShapeMismatch {
            expected: vec![nrows, nrows],
            got: vec![nrows, ncols],
        });
    }
    if b.len() != nrows {
        return Err(Error::ShapeMismatch {
            expected: vec![nrows],
            got: vec![b.len()],
        });
    }
    if b.dtype() != factor.dtype() {
        return Err(Error::DTypeMismatch {
            lhs: factor.dtype(),
            rhs: b.dtype(),
        });
    }
    let _ = op;
    Ok(nrows)
}

impl TriangularOps<CpuRuntime> for CpuClient {
    fn trisolve_lower(
        &self,
        l: &CsrData<CpuRuntime>,
        b: &Array<CpuRuntime>,
        unit_diagonal: bool,
    ) -> Result<Array<CpuRuntime>> {
        let n = check_system(l, b, "trisolve_lower")?;
        crate::dispatch_dtype!(l.dtype(), T => {
            let row_ptrs = typed_view::<i64>(l.row_ptrs(), "trisolve_lower")?;
            let cols = typed_view::<i64>(l.col_indices(), "trisolve_lower")?;
            let vals = typed_view::<T>(l.values(), "trisolve_lower")?;
            let rhs = typed_view::<T>(b, "trisolve_lower")?;

            let mut x = vec![0.0f64; n];
            for r in 0..n {
                let mut sum = 0.0f64;
                let mut diag = None;
                for pos in row_ptrs[r] as usize..row_ptrs[r + 1] as usize {
                    let c = cols[pos] as usize;
                    if c < r {
                        sum += vals[pos].to_f64() * x[c];
                    } else if c == r {
                        diag = Some(vals[pos].to_f64());
                    }
                }
                x[r] = if unit_diagonal {
                    rhs[r].to_f64() - sum
                } else {
                    match diag {
                        Some(d) if d != 0.0 => (rhs[r].to_f64() - sum) / d,
                        _ => return Err(Error::MissingDiagonal { row: r }),
                    }
                };
            }
            let out: Vec<T> = x.iter().map(|&v| T::from_f64(v)).collect();
            Array::from_slice(&out, b.location(), self.device())
        }, "trisolve_lower")
    }

    fn trisolve_upper(
        &self,
        u: &CsrData<CpuRuntime>,
        b: &Array<CpuRuntime>,
    ) -> Result<Array<CpuRuntime>> {
        let n = check_system(u, b, "trisolve_upper")?;
        crate::dispatch_dtype!(u.dtype(), T => {
            let row_ptrs = typed_view::<i64>(u.row_ptrs(), "trisolve_upper")?;
            let cols = typed_view::<i64>(u.col_indices(), "trisolve_upper")?;
            let vals = typed_view::<T>(u.values(), "trisolve_upper")?;
            let rhs = typed_view::<T>(b, "trisolve_upper")?;

            let mut x = vec![0.0f64; n];
            for r in (0..n).rev() {
                let mut sum = 0.0f64;
                let mut diag = None;
                for pos in row_ptrs[r] as usize..row_ptrs[r + 1] as usize {
                    let c = cols[pos] as usize;
                    if c > r {
                        sum += vals[pos].to_f64() * x[c];
                    } else if c == r {
                        diag = Some(vals[pos].to_f64());
                    }
                }
                match diag {
                    Some(d) if d != 0.0 => x[r] = (rhs[r].to_f64() - sum) / d,
                    _ => return Err(Error::MissingDiagonal { row: r }),
                }
            }
            let out: Vec<T> = x.iter().map(|&v| T::from_f64(v)).collect();
            Array::from_slice(&out, b.location(), self.device())
        }, "trisolve_upper")
    }

    fn jacobi_trisolve_sweeps(
        &self,
        factor: &CsrData<CpuRuntime>,
        diag: &Array<CpuRuntime>,
        b: &Array<CpuRuntime>,
        x0: &Array<CpuRuntime>,
        iters: usize,
    ) -> Result<Array<CpuRuntime>> {
        let n = check_system(factor, b, "jacobi_trisolve_sweeps")?;
        if diag.len() != n || x0.len() != n {
            return Err(Error::ShapeMismatch {
                expected: vec![n],
                got: vec![if diag.len() != n { diag.len() } else { x0.len() }],
            });
        }
        crate::dispatch_dtype!(factor.dtype(), T => {
            let row_ptrs = typed_view::<i64>(factor.row_ptrs(), "jacobi_trisolve_sweeps")?;
            let cols = typed_view::<i64>(factor.col_indices(), "jacobi_trisolve_sweeps")?;
            let vals = typed_view::<T>(factor.values(), "jacobi_trisolve_sweeps")?;
            let d = typed_view::<T>(diag, "jacobi_trisolve_sweeps")?;
            let rhs = typed_view::<T>(b, "jacobi_trisolve_sweeps")?;
            let seed = typed_view::<T>(x0, "jacobi_trisolve_sweeps")?;

            let mut cur: Vec<f64> = seed.iter().map(|v| v.to_f64()).collect();
            let mut next = vec![0.0f64; n];
            for _ in 0..iters {
                let sweep = |r: usize| -> f64 {
                    let mut sum = 0.0f64;
                    for pos in row_ptrs[r] as usize..row_ptrs[r + 1] as usize {
                        let c = cols[pos] as usize;
                        if c != r {
                            sum += vals[pos].to_f64() * cur[c];
                        }
                    }
                    (rhs[r].to_f64() - sum) / d[r].to_f64()
                };
                #[cfg(feature = "rayon")]
                {
                    next.par_iter_mut()
                        .enumerate()
                        .for_each(|(r, slot)| *slot = sweep(r));
                }
                #[cfg(not(feature = "rayon"))]
                {
                    for (r, slot) in next.iter_mut().enumerate() {
                        *slot = sweep(r);
                    }
                }
                std::mem::swap(&mut cur, &mut next);
            }
            let out: Vec<T> = cur.iter().map(|&v| T::from_f64(v)).collect();
            Array::from_slice(&out, b.location(), self.device())
        }, "jacobi_trisolve_sweeps")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::MemLocation;
    use crate::runtime::cpu::CpuDevice;

    fn setup() -> (CpuClient, CpuDevice) {
        let device = CpuDevice::new();
        (CpuClient::new(device.clone()), device)
    }

    /// L = [[2, 0], [1, 3]], b = [2, 7] → x = [1, 2]
    #[test]
    fn forward_substitution() {
        let (client, device) = setup();
        let l = CsrData::from_slices(
            &[0, 1, 3],
            &[0, 0, 1],
            &[2.0f64, 1.0, 3.0],
            [2, 2],
            MemLocation::Host,
            &device,
        )
        .unwrap();
        let b = Array::from_slice(&[2.0f64, 7.0], MemLocation::Host, &device).unwrap();
        let x = client.trisolve_lower(&l, &b, false).unwrap();
        assert_eq!(x.to_vec::<f64>().unwrap(), vec![1.0, 2.0]);
    }

    /// Unit-diagonal mode ignores the stored diagonal entirely.
    #[test]
    fn forward_substitution_unit_diagonal() {
        let (client, device) = setup();
        let l = CsrData::from_slices(
            &[0, 1, 3],
            &[0, 0, 1],
            &[5.0f64, 1.0, 5.0],
            [2, 2],
            MemLocation::Host,
            &device,
        )
        .unwrap();
        let b = Array::from_slice(&[2.0f64, 7.0], MemLocation::Host, &device).unwrap();
        let x = client.trisolve_lower(&l, &b, true).unwrap();
        assert_eq!(x.to_vec::<f64>().unwrap(), vec![2.0, 5.0]);
    }

    /// U = [[2, 1], [0, 4]], b = [4, 8] → x = [1, 2]
    #[test]
    fn backward_substitution() {
        let (client, device) = setup();
        let u = CsrData::from_slices(
            &[0, 2, 3],
            &[0, 1, 1],
            &[2.0f64, 1.0, 4.0],
            [2, 2],
            MemLocation::Host,
            &device,
        )
        .unwrap();
        let b = Array::from_slice(&[4.0f64, 8.0], MemLocation::Host, &device).unwrap();
        let x = client.trisolve_upper(&u, &b).unwrap();
        assert_eq!(x.to_vec::<f64>().unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn missing_diagonal_is_reported() {
        let (client, device) = setup();
        // second row has no diagonal entry
        let u = CsrData::from_slices(
            &[0, 2, 2],
            &[0, 1],
            &[2.0f64, 1.0],
            [2, 2],
            MemLocation::Host,
            &device,
        )
        .unwrap();
        let b = Array::from_slice(&[4.0f64, 8.0], MemLocation::Host, &device).unwrap();
        assert!(matches!(
            client.trisolve_upper(&u, &b),
            Err(Error::MissingDiagonal { row: 1 })
        ));
    }

    /// Enough sweeps on a triangular system reproduce the exact solve.
    #[test]
    fn sweeps_converge_to_substitution() {
        let (client, device) = setup();
        let l = CsrData::from_slices(
            &[0, 1, 3, 5],
            &[0, 0, 1, 1, 2],
            &[4.0f64, 1.0, 4.0, 1.0, 4.0],
            [3, 3],
            MemLocation::Host,
            &device,
        )
        .unwrap();
        let b = Array::from_slice(&[4.0f64, 9.0, 10.0], MemLocation::Host, &device).unwrap();
        let exact = client.trisolve_lower(&l, &b, false).unwrap().to_vec::<f64>().unwrap();

        let diag = l.diagonal::<f64>().unwrap();
        let x0 = Array::zeros(3, crate::dtype::DType::F64, MemLocation::Host, &device).unwrap();
        // a strictly triangular sweep reaches the fixed point in n iterations
        let approx = client
            .jacobi_trisolve_sweeps(&l, &diag, &b, &x0, 3)
            .unwrap()
            .to_vec::<f64>()
            .unwrap();
        for (a, e) in approx.iter().zip(exact.iter()) {
            assert!((a - e).abs() < 1e-12, "{a} vs {e}");
        }
    }
}
