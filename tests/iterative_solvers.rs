//! Integration tests for the iterative solver drivers: the stopping rule,
//! Krylov methods on symmetric and nonsymmetric operators, the relaxation
//! schemes, multi-RHS block CG and the run feedback every driver reports.

mod common;

use common::*;
use sparsr::precond::{PrecondKind, PrecondParams, Preconditioner};
use sparsr::prelude::*;
use sparsr::solver::{
    self, BlockAsyncConfig, Method, OverlapJacobiConfig, SolverParams, SolverStatus,
};

/// Right-hand side with a known solution: `b = A·x_exact` on the device.
fn rhs_for(
    client: &CpuClient,
    device: &CpuDevice,
    a: &SparseMatrix<CpuRuntime>,
    x_exact: &[f64],
) -> Array<CpuRuntime> {
    let xe = device_vec(device, x_exact);
    let zero = device_vec(device, &vec![0.0; x_exact.len()]);
    client
        .spmv(1.0, a, &xe, 0.0, &zero)
        .expect("spmv should succeed")
}

/// True relative residual `‖b − A·x‖ / ‖b‖`, recomputed from scratch.
fn relative_residual(
    client: &CpuClient,
    a: &SparseMatrix<CpuRuntime>,
    b: &Array<CpuRuntime>,
    x: &Array<CpuRuntime>,
) -> f64 {
    let r = client.spmv(-1.0, a, x, 1.0, b).expect("spmv should succeed");
    let rnorm = client.nrm2(&r).expect("nrm2 should succeed");
    let bnorm = client.nrm2(b).expect("nrm2 should succeed");
    rnorm / bnorm
}

/// Cyclic shift permutation: row `i` holds a single 1 in column `(i+1) mod n`.
fn cyclic_shift(n: usize, device: &CpuDevice) -> SparseMatrix<CpuRuntime> {
    let ptrs: Vec<i64> = (0..=n as i64).collect();
    let cols: Vec<i64> = (0..n).map(|i| ((i + 1) % n) as i64).collect();
    let vals = vec![1.0f64; n];
    let csr = CsrData::from_slices(&ptrs, &cols, &vals, [n, n], MemLocation::Host, device)
        .expect("matrix creation should succeed");
    to_device_operator(&csr, device)
}

/// Negative definite diagonal, `a_ii = -2`.
fn negative_diag(n: usize, device: &CpuDevice) -> SparseMatrix<CpuRuntime> {
    let ptrs: Vec<i64> = (0..=n as i64).collect();
    let cols: Vec<i64> = (0..n as i64).collect();
    let vals = vec![-2.0f64; n];
    let csr = CsrData::from_slices(&ptrs, &cols, &vals, [n, n], MemLocation::Host, device)
        .expect("matrix creation should succeed");
    to_device_operator(&csr, device)
}

// ============================================================================
// Stopping rule
// ============================================================================

#[test]
fn test_stopping_rule_tracks_the_relative_floor() {
    let n = 32;
    let (client, device) = create_cpu_client();
    let a = to_device_operator(&laplacian_1d(n, &device), &device);
    let b = rhs_for(&client, &device, &a, &vec![1.0; n]);
    let mut x = device_vec(&device, &vec![0.0; n]);

    let mut params = SolverParams {
        rtol: 1e-10,
        ..SolverParams::default()
    };
    let mut pre = Preconditioner::identity();
    let status = solver::pcg(&client, &a, &b, &mut x, &mut params, &mut pre)
        .expect("solve should succeed");

    assert_eq!(status, SolverStatus::Success);
    assert_eq!(params.info, SolverStatus::Success);
    assert!(params.numiter > 0);
    // one SpMV for the entry residual, one per iteration
    assert_eq!(params.spmv_count, params.numiter + 1);
    assert!(
        relative_residual(&client, &a, &b, &x) <= 1e-9,
        "converged run must sit below the relative floor"
    );
    let got = x.to_vec::<f64>().expect("readback should succeed");
    assert_allclose_f64(&got, &vec![1.0; n], 0.0, 1e-7, "pcg solution");
}

#[test]
fn test_exhausted_budget_is_not_success() {
    let (client, device) = create_cpu_client();
    let a = to_device_operator(&laplacian_2d(10, &device), &device);
    let b = device_vec(&device, &vec![1.0; 100]);
    let mut x = device_vec(&device, &vec![0.0; 100]);

    let mut params = SolverParams {
        maxiter: 1,
        rtol: 1e-10,
        ..SolverParams::default()
    };
    let mut pre = Preconditioner::identity();
    let status = solver::pcg(&client, &a, &b, &mut x, &mut params, &mut pre)
        .expect("solve should succeed");

    // the first steepest-descent step overshoots on this system:
    // α = 100/40, ‖r₁‖² = 100 − 2·α·40 + α²·48 = 200 > ‖r₀‖² = 100
    assert!(!status.is_success());
    assert!(matches!(
        status,
        SolverStatus::Diverged | SolverStatus::SlowConvergence
    ));
    assert_eq!(params.numiter, 1);
    assert!(params.final_res > params.init_res);
    assert!(
        (params.final_res * params.final_res - 200.0).abs() < 1e-9,
        "first-step residual should be √200, got {}",
        params.final_res
    );
}

#[test]
fn test_an_indefinite_operator_is_flagged_before_any_update() {
    let n = 6;
    let (client, device) = create_cpu_client();
    let a = negative_diag(n, &device);
    let b = device_vec(&device, &vec![1.0; n]);
    let mut x = device_vec(&device, &vec![0.0; n]);

    let mut params = SolverParams::default();
    let mut pre = Preconditioner::identity();
    let status = solver::pcg(&client, &a, &b, &mut x, &mut params, &mut pre)
        .expect("solve should return a status, not an error");

    assert_eq!(status, SolverStatus::NotPositiveDefinite);
    assert_eq!(params.info, SolverStatus::NotPositiveDefinite);
    assert_eq!(params.numiter, 0);
    // entry residual plus the curvature probe, nothing else
    assert_eq!(params.spmv_count, 2);
    let got = x.to_vec::<f64>().expect("readback should succeed");
    assert!(got.iter().all(|v| *v == 0.0), "iterate must be untouched");
}

// ============================================================================
// Krylov methods
// ============================================================================

#[test]
fn test_preconditioned_cg_solves_the_five_point_stencil() {
    let (client, device) = create_cpu_client();
    let a = to_device_operator(&laplacian_2d(10, &device), &device);
    let b = device_vec(&device, &vec![1.0; 100]);
    let mut x = device_vec(&device, &vec![0.0; 100]);

    let mut pre = Preconditioner::new(PrecondParams::with_kind(PrecondKind::Jacobi));
    pre.setup(&client, &a).expect("setup should succeed");
    assert!(pre.is_ready());

    let mut params = SolverParams {
        rtol: 1e-8,
        maxiter: 10_000,
        ..SolverParams::default()
    };
    let status = solver::pcg(&client, &a, &b, &mut x, &mut params, &mut pre)
        .expect("solve should succeed");

    assert_eq!(status, SolverStatus::Success);
    assert!(params.numiter > 0 && params.numiter < 200);
    assert!(
        relative_residual(&client, &a, &b, &x) <= 2e-8,
        "readback residual must confirm the reported convergence"
    );
}

#[test]
fn test_cgs_and_bicgstab_handle_the_convection_stencil() {
    let n = 24;
    let (client, device) = create_cpu_client();
    let a = to_device_operator(&nonsymmetric_tridiag(n, &device), &device);
    let b = rhs_for(&client, &device, &a, &vec![1.0; n]);

    type Driver = fn(
        &CpuClient,
        &SparseMatrix<CpuRuntime>,
        &Array<CpuRuntime>,
        &mut Array<CpuRuntime>,
        &mut SolverParams,
        &mut Preconditioner<CpuRuntime>,
    ) -> Result<SolverStatus>;
    let runs: [(&str, Driver); 2] = [("pcgs", solver::pcgs), ("bicgstab", solver::bicgstab)];

    for (name, driver) in runs {
        let mut x = device_vec(&device, &vec![0.0; n]);
        let mut params = SolverParams {
            rtol: 1e-10,
            ..SolverParams::default()
        };
        let mut pre = Preconditioner::identity();
        let status =
            driver(&client, &a, &b, &mut x, &mut params, &mut pre).expect("solve should succeed");

        assert_eq!(status, SolverStatus::Success, "{name} should converge");
        assert_eq!(params.info, status);
        let got = x.to_vec::<f64>().expect("readback should succeed");
        assert_allclose_f64(&got, &vec![1.0; n], 0.0, 1e-6, name);
    }
}

#[test]
fn test_dispatcher_routes_every_method() {
    let n = 12;
    let (client, device) = create_cpu_client();
    let a = to_device_operator(&laplacian_1d(n, &device), &device);
    let b = rhs_for(&client, &device, &a, &vec![1.0; n]);

    for method in [Method::Pcg, Method::Pcgs, Method::Bicgstab] {
        let mut x = device_vec(&device, &vec![0.0; n]);
        let mut params = SolverParams {
            rtol: 1e-11,
            ..SolverParams::default()
        };
        let mut pre = Preconditioner::identity();
        let status = solver::solve(&client, method, &a, &b, &mut x, &mut params, &mut pre)
            .expect("solve should succeed");

        assert_eq!(status, SolverStatus::Success, "{method:?} should converge");
        assert_eq!(params.info, status);
        let got = x.to_vec::<f64>().expect("readback should succeed");
        assert_allclose_f64(&got, &vec![1.0; n], 0.0, 1e-7, "dispatched solution");
    }
}

#[test]
fn test_a_shadow_breakdown_is_reported_not_propagated() {
    let n = 6;
    let (client, device) = create_cpu_client();
    let a = cyclic_shift(n, &device);
    // r₀ = e₀ and A·e₀ = e₅, so the first shadow product vanishes
    let mut rhs = vec![0.0; n];
    rhs[0] = 1.0;
    let b = device_vec(&device, &rhs);
    let mut x = device_vec(&device, &vec![0.0; n]);

    let mut params = SolverParams::default();
    let mut pre = Preconditioner::identity();
    let status = solver::pcgs(&client, &a, &b, &mut x, &mut params, &mut pre)
        .expect("breakdown is a status, not an error");

    assert_eq!(status, SolverStatus::Diverged);
    assert_eq!(params.info, SolverStatus::Diverged);
    assert_eq!(params.numiter, 0);
}

// ============================================================================
// Relaxation schemes
// ============================================================================

#[test]
fn test_block_async_jacobi_converges_on_a_dominant_stencil() {
    let n = 32;
    let (client, device) = create_cpu_client();
    let a = to_device_operator(&nonsymmetric_tridiag(n, &device), &device);
    let b = rhs_for(&client, &device, &a, &vec![1.0; n]);
    let mut x = device_vec(&device, &vec![0.0; n]);

    let mut params = SolverParams {
        rtol: 1e-8,
        maxiter: 400,
        verbose: 5,
        ..SolverParams::default()
    };
    let config = BlockAsyncConfig {
        matrices: 4,
        blocksize: 8,
        localiter: 3,
    };
    let status = solver::block_async_jacobi(&client, &a, &b, &mut x, &mut params, &config)
        .expect("solve should succeed");

    assert_eq!(status, SolverStatus::Success);
    assert!(params.numiter < 400, "the stride check should stop the run");
    let got = x.to_vec::<f64>().expect("readback should succeed");
    assert_allclose_f64(&got, &vec![1.0; n], 0.0, 1e-6, "block jacobi solution");
}

#[test]
fn test_block_async_jacobi_rejects_a_bad_decomposition_count() {
    let n = 8;
    let (client, device) = create_cpu_client();
    let a = to_device_operator(&laplacian_1d(n, &device), &device);
    let b = device_vec(&device, &vec![1.0; n]);
    let mut x = device_vec(&device, &vec![0.0; n]);

    for matrices in [0, 12, 130] {
        let config = BlockAsyncConfig {
            matrices,
            blocksize: 4,
            localiter: 1,
        };
        let mut params = SolverParams::default();
        let err = solver::block_async_jacobi(&client, &a, &b, &mut x, &mut params, &config);
        assert!(
            matches!(
                err,
                Err(Error::UnsupportedConfiguration {
                    param: "matrices",
                    ..
                })
            ),
            "matrices = {matrices} must be rejected"
        );
        assert_eq!(params.numiter, 0);
        assert_eq!(params.spmv_count, 0, "rejection must precede any work");
    }
}

#[test]
fn test_overlap_jacobi_runs_the_full_pass_budget() {
    let n = 16;
    let (client, device) = create_cpu_client();
    let a = to_device_operator(&nonsymmetric_tridiag(n, &device), &device);
    let b = rhs_for(&client, &device, &a, &vec![1.0; n]);
    let mut x = device_vec(&device, &vec![0.0; n]);

    let mut params = SolverParams {
        rtol: 1e-8,
        maxiter: 150,
        ..SolverParams::default()
    };
    let config = OverlapJacobiConfig { blocksize: 4 };
    let status = solver::overlap_jacobi(&client, &a, &b, &mut x, &mut params, &config)
        .expect("solve should succeed");

    // the driver never exits early; the run is judged once at the end
    assert_eq!(params.numiter, 150);
    assert_eq!(status, SolverStatus::Success);
    let got = x.to_vec::<f64>().expect("readback should succeed");
    assert_allclose_f64(&got, &vec![1.0; n], 0.0, 1e-8, "overlap jacobi solution");
}

// ============================================================================
// Block CG over multiple right-hand sides
// ============================================================================

#[test]
fn test_block_pcg_solves_a_block_and_freezes_finished_columns() {
    let n = 16;
    let (client, device) = create_cpu_client();
    let a = to_device_operator(&laplacian_2d(4, &device), &device);

    let ones = vec![1.0f64; n];
    let ramp: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let b_cols = vec![
        rhs_for(&client, &device, &a, &ones),
        rhs_for(&client, &device, &a, &ramp),
        // zero column: already inside its floor at entry
        device_vec(&device, &vec![0.0; n]),
    ];
    let b = DenseData::from_columns(&b_cols, &device).expect("block creation should succeed");
    let x_cols = vec![
        device_vec(&device, &vec![0.0; n]),
        device_vec(&device, &vec![0.0; n]),
        device_vec(&device, &vec![0.0; n]),
    ];
    let mut x = DenseData::from_columns(&x_cols, &device).expect("block creation should succeed");

    let mut pre = Preconditioner::new(PrecondParams::with_kind(PrecondKind::ParIc));
    pre.setup(&client, &a).expect("setup should succeed");

    let mut params = SolverParams {
        rtol: 1e-10,
        maxiter: 500,
        ..SolverParams::default()
    };
    let status = solver::block_pcg(&client, &a, &b, &mut x, &mut params, &mut pre)
        .expect("solve should succeed");

    assert_eq!(status, SolverStatus::Success);
    assert!(params.numiter > 0);

    let c0 = x.column(0, &device).expect("column readback");
    let c1 = x.column(1, &device).expect("column readback");
    let c2 = x.column(2, &device).expect("column readback");
    let g0 = c0.to_vec::<f64>().expect("readback should succeed");
    let g1 = c1.to_vec::<f64>().expect("readback should succeed");
    let g2 = c2.to_vec::<f64>().expect("readback should succeed");
    assert_allclose_f64(&g0, &ones, 0.0, 1e-7, "first column");
    assert_allclose_f64(&g1, &ramp, 1e-9, 1e-7, "second column");
    assert!(
        g2.iter().all(|v| *v == 0.0),
        "a column solved at entry must stay frozen"
    );
}

// ============================================================================
// Run feedback
// ============================================================================

#[test]
fn test_verbose_runs_log_the_residual_trace() {
    let n = 25;
    let (client, device) = create_cpu_client();
    let a = to_device_operator(&laplacian_2d(5, &device), &device);
    let b = rhs_for(&client, &device, &a, &vec![1.0; n]);

    // quiet run: no samples at all
    let mut x = device_vec(&device, &vec![0.0; n]);
    let mut quiet = SolverParams {
        rtol: 1e-10,
        ..SolverParams::default()
    };
    let mut pre = Preconditioner::identity();
    solver::pcg(&client, &a, &b, &mut x, &mut quiet, &mut pre).expect("solve should succeed");
    assert!(quiet.res_vec.is_empty());
    assert!(quiet.timing.is_empty());

    // verbose run: entry sample, one per iteration, exit sample
    let mut x = device_vec(&device, &vec![0.0; n]);
    let mut params = SolverParams {
        rtol: 1e-10,
        verbose: 1,
        ..SolverParams::default()
    };
    let mut pre = Preconditioner::identity();
    let status =
        solver::pcg(&client, &a, &b, &mut x, &mut params, &mut pre).expect("solve should succeed");

    assert_eq!(status, SolverStatus::Success);
    assert_eq!(params.res_vec.len(), params.numiter + 2);
    assert_eq!(params.timing.len(), params.res_vec.len());
    assert_eq!(params.res_vec[0], params.init_res);
    assert_eq!(*params.res_vec.last().unwrap(), params.final_res);
    assert!(params.res_vec[0] > *params.res_vec.last().unwrap());
    assert!(
        params.timing.windows(2).all(|w| w[0] <= w[1]),
        "timestamps must be nondecreasing"
    );
    assert_eq!(params.spmv_count, params.numiter + 1);
}
