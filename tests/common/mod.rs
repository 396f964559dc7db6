//! Common test utilities
#![allow(dead_code)]

use sparsr::prelude::*;

/// Create a CPU client and device for testing
pub fn create_cpu_client() -> (CpuClient, CpuDevice) {
    let device = CpuDevice::new();
    let client = CpuRuntime::default_client(&device);
    (client, device)
}

/// 1-D Laplacian (SPD tridiagonal): diag=2, off-diag=-1, host CSR
pub fn laplacian_1d(n: usize, device: &CpuDevice) -> CsrData<CpuRuntime> {
    let mut row_ptrs = vec![0i64];
    let mut col_indices = Vec::new();
    let mut values = Vec::new();
    for i in 0..n {
        if i > 0 {
            col_indices.push((i - 1) as i64);
            values.push(-1.0f64);
        }
        col_indices.push(i as i64);
        values.push(2.0f64);
        if i < n - 1 {
            col_indices.push((i + 1) as i64);
            values.push(-1.0f64);
        }
        row_ptrs.push(col_indices.len() as i64);
    }
    CsrData::from_slices(
        &row_ptrs,
        &col_indices,
        &values,
        [n, n],
        MemLocation::Host,
        device,
    )
    .expect("CSR creation should succeed")
}

/// 2-D 5-point Laplacian on an n×n grid: diag=4, neighbors=-1, host CSR
pub fn laplacian_2d(n: usize, device: &CpuDevice) -> CsrData<CpuRuntime> {
    let dofs = n * n;
    let mut row_ptrs = vec![0i64];
    let mut col_indices = Vec::new();
    let mut values = Vec::new();
    for i in 0..n {
        for j in 0..n {
            let r = (i * n + j) as i64;
            if i > 0 {
                col_indices.push(r - n as i64);
                values.push(-1.0f64);
            }
            if j > 0 {
                col_indices.push(r - 1);
                values.push(-1.0f64);
            }
            col_indices.push(r);
            values.push(4.0f64);
            if j < n - 1 {
                col_indices.push(r + 1);
                values.push(-1.0f64);
            }
            if i < n - 1 {
                col_indices.push(r + n as i64);
                values.push(-1.0f64);
            }
            row_ptrs.push(col_indices.len() as i64);
        }
    }
    CsrData::from_slices(
        &row_ptrs,
        &col_indices,
        &values,
        [dofs, dofs],
        MemLocation::Host,
        device,
    )
    .expect("CSR creation should succeed")
}

/// Convection-diffusion tridiagonal (nonsymmetric): [-1, 3, -1.5], host CSR
pub fn nonsymmetric_tridiag(n: usize, device: &CpuDevice) -> CsrData<CpuRuntime> {
    let mut row_ptrs = vec![0i64];
    let mut col_indices = Vec::new();
    let mut values = Vec::new();
    for i in 0..n {
        if i > 0 {
            col_indices.push((i - 1) as i64);
            values.push(-1.0f64);
        }
        col_indices.push(i as i64);
        values.push(3.0f64);
        if i < n - 1 {
            col_indices.push((i + 1) as i64);
            values.push(-1.5f64);
        }
        row_ptrs.push(col_indices.len() as i64);
    }
    CsrData::from_slices(
        &row_ptrs,
        &col_indices,
        &values,
        [n, n],
        MemLocation::Host,
        device,
    )
    .expect("CSR creation should succeed")
}

/// Move a host CSR operator to the device and wrap it for the solvers
pub fn to_device_operator(
    csr: &CsrData<CpuRuntime>,
    device: &CpuDevice,
) -> SparseMatrix<CpuRuntime> {
    SparseMatrix::Csr(
        csr.to_location(MemLocation::Device, device)
            .expect("transfer should succeed"),
    )
}

/// Device-resident f64 vector from a slice
pub fn device_vec(device: &CpuDevice, v: &[f64]) -> Array<CpuRuntime> {
    Array::from_slice(v, MemLocation::Device, device).expect("array creation should succeed")
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}
