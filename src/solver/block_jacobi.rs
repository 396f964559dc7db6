//! Block-asynchronous Jacobi over staggered overlapping decompositions.

use super::common;
use super::{SolverParams, SolverStatus};
use crate::array::{Array, MemLocation};
use crate::error::{Error, Result};
use crate::ops::SparsrOps;
use crate::precond::stage_host_csr;
use crate::runtime::{Runtime, RuntimeClient};
use crate::sparse::{SparseMatrix, SparseStorage};
use crate::transform;

/// Decomposition knobs for [`block_async_jacobi`].
#[derive(Debug, Clone, Copy)]
pub struct BlockAsyncConfig {
    /// Number of staggered block decompositions, a power of two in `[1, 128]`.
    pub matrices: usize,
    /// Rows per diagonal block; must be divisible by `matrices`.
    pub blocksize: usize,
    /// Jacobi sweeps against each diagonal block per round.
    pub localiter: usize,
}

/// Block-asynchronous Jacobi relaxation.
///
/// The matrix splits into `matrices` block-diagonal/remainder pairs whose
/// block boundaries are staggered by `blocksize / matrices` rows, so every
/// row couple sits inside some pair's diagonal block. Each round runs the
/// fused overlap kernel: per pair, the off-block contribution is frozen and
/// the iterate refined with `localiter` local Jacobi sweeps. The global
/// residual is only evaluated at the `verbose` stride (and once at the
/// end), so rounds in between need no synchronization.
pub fn block_async_jacobi<R, C>(
    client: &C,
    a: &SparseMatrix<R>,
    b: &Array<R>,
    x: &mut Array<R>,
    params: &mut SolverParams,
    config: &BlockAsyncConfig,
) -> Result<SolverStatus>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
{
    // configuration is rejected before anything is staged or allocated
    if config.matrices == 0 || config.matrices > 128 || !config.matrices.is_power_of_two() {
        return Err(Error::UnsupportedConfiguration {
            param: "matrices",
            value: config.matrices,
            allowed: "powers of two in [1, 128]",
        });
    }
    let n = common::validate_operator(a, "block_async_jacobi")?;
    if config.blocksize == 0 || config.blocksize > n {
        return Err(Error::InvalidArgument {
            arg: "blocksize",
            reason: format!("must be in [1, {n}] for this system"),
        });
    }
    if config.blocksize % config.matrices != 0 {
        return Err(Error::InvalidArgument {
            arg: "blocksize",
            reason: format!("must be divisible by matrices = {}", config.matrices),
        });
    }
    let overlap = config.blocksize / config.matrices;

    // build every staggered decomposition once on the host, move each pair
    // to the device once
    let device = client.device();
    let staged = stage_host_csr(a, "block_async_jacobi")?;
    let diag = crate::dispatch_dtype!(staged.dtype(), T => {
        staged.diagonal::<T>()
    }, "block_async_jacobi")?
    .to_location(MemLocation::Device, device)?;
    let host = SparseMatrix::Csr(staged);

    let mut parts = Vec::with_capacity(config.matrices);
    for i in 0..config.matrices {
        let (d, r) = transform::split(i * overlap, config.blocksize, &host)?;
        parts.push((
            d.to_location(MemLocation::Device, device)?,
            r.to_location(MemLocation::Device, device)?,
        ));
    }
    log::debug!(
        "block_async_jacobi: {} decompositions, blocksize {}, overlap {overlap}",
        config.matrices,
        config.blocksize
    );

    let (state, _r0) = common::begin(client, a, b, x, params, "block_async_jacobi")?;
    if state.converged(params.init_res) {
        return common::finish(client, a, b, x, params, &state, Some(SolverStatus::Success));
    }

    while params.numiter < params.maxiter {
        *x = client.bajac_overlap_sweep(&parts, &diag, b, x, config.localiter)?;
        params.numiter += 1;

        if params.verbose > 0 && params.numiter % params.verbose == 0 {
            let r = client.spmv(-1.0, a, x, 1.0, b)?;
            params.spmv_count += 1;
            let res = client.nrm2(&r)?;
            params.iter_res = res;
            params.res_vec.push(res);
            params.timing.push(state.started.elapsed().as_secs_f64());
            log::debug!("round {:>5}: residual {res:.6e}", params.numiter);
            if state.converged(res) {
                return common::finish(client, a, b, x, params, &state, Some(SolverStatus::Success));
            }
        }
    }

    common::finish(client, a, b, x, params, &state, None)
}
