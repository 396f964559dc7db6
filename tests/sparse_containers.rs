//! Integration tests for the sparse containers: constructor validation,
//! conversions between storage formats, SpMV agreement across formats and
//! device allocation accounting.

mod common;

use common::*;
use sparsr::prelude::*;
use sparsr::sparse::convert;

/// Host-resident vector; the CPU client addresses both locations, and
/// keeping these tests on the host leaves the device byte counter to the
/// accounting test below.
fn host_vec(device: &CpuDevice, v: &[f64]) -> Array<CpuRuntime> {
    Array::from_slice(v, MemLocation::Host, device).expect("array creation should succeed")
}

// ============================================================================
// Constructor validation
// ============================================================================

#[test]
fn test_csr_rejects_malformed_row_pointers() {
    let device = CpuRuntime::default_device();

    // first entry must be zero
    let r = CsrData::<CpuRuntime>::from_slices(
        &[1, 2],
        &[0],
        &[1.0f64],
        [1, 1],
        MemLocation::Host,
        &device,
    );
    assert!(matches!(r, Err(Error::InvalidArgument { arg: "row_ptrs", .. })));

    // pointers must be monotone
    let r = CsrData::<CpuRuntime>::from_slices(
        &[0, 2, 1],
        &[0, 1],
        &[1.0f64, 1.0],
        [2, 2],
        MemLocation::Host,
        &device,
    );
    assert!(matches!(r, Err(Error::InvalidArgument { arg: "row_ptrs", .. })));

    // last entry must equal nnz
    let r = CsrData::<CpuRuntime>::from_slices(
        &[0, 1, 3],
        &[0, 1],
        &[1.0f64, 1.0],
        [2, 2],
        MemLocation::Host,
        &device,
    );
    assert!(matches!(r, Err(Error::InvalidArgument { arg: "row_ptrs", .. })));
}

#[test]
fn test_csr_rejects_out_of_bounds_columns() {
    let device = CpuRuntime::default_device();
    let r = CsrData::<CpuRuntime>::from_slices(
        &[0, 1, 2],
        &[0, 5],
        &[1.0f64, 1.0],
        [2, 2],
        MemLocation::Host,
        &device,
    );
    assert!(matches!(r, Err(Error::IndexOutOfBounds { index: 5, size: 2 })));
}

#[test]
fn test_coo_rejects_out_of_bounds_indices() {
    let device = CpuRuntime::default_device();
    let r = CooData::<CpuRuntime>::from_slices(
        &[0, 7],
        &[0, 1],
        &[1.0f64, 1.0],
        [3, 3],
        MemLocation::Host,
        &device,
    );
    assert!(matches!(r, Err(Error::IndexOutOfBounds { index: 7, size: 3 })));
}

#[test]
fn test_payload_dtypes_are_enforced() {
    let device = CpuRuntime::default_device();

    // row pointers must be I64
    let bad_ptrs = Array::<CpuRuntime>::from_slice(&[0.0f64, 1.0], MemLocation::Host, &device)
        .expect("array creation should succeed");
    let cols = Array::<CpuRuntime>::from_slice(&[0i64], MemLocation::Host, &device)
        .expect("array creation should succeed");
    let vals = Array::<CpuRuntime>::from_slice(&[1.0f64], MemLocation::Host, &device)
        .expect("array creation should succeed");
    assert!(matches!(
        CsrData::new(bad_ptrs, cols.clone(), vals, [1, 1]),
        Err(Error::DTypeMismatch { .. })
    ));

    // values must be a float type
    let ptrs = Array::<CpuRuntime>::from_slice(&[0i64, 1], MemLocation::Host, &device)
        .expect("array creation should succeed");
    let int_vals = Array::<CpuRuntime>::from_slice(&[1i64], MemLocation::Host, &device)
        .expect("array creation should succeed");
    assert!(matches!(
        CsrData::new(ptrs, cols, int_vals, [1, 1]),
        Err(Error::UnsupportedDType { .. })
    ));
}

#[test]
fn test_sellp_conversion_validates_geometry() {
    let device = CpuRuntime::default_device();
    let a = laplacian_1d(4, &device);
    assert!(matches!(
        convert::csr_to_sellp(&a, 0, 4),
        Err(Error::InvalidArgument { .. })
    ));
    assert!(matches!(
        convert::csr_to_sellp(&a, 4, 0),
        Err(Error::InvalidArgument { .. })
    ));
}

// ============================================================================
// Format conversions
// ============================================================================

#[test]
fn test_coo_round_trip_preserves_structure() {
    let device = CpuRuntime::default_device();
    let a = laplacian_2d(3, &device);
    let (a_ptrs, a_cols, a_vals) = a.host_views::<f64>("test").expect("host views");

    let coo = convert::csr_to_coo(&a).expect("csr_to_coo should succeed");
    assert_eq!(coo.nnz(), a.nnz());

    let back = convert::coo_to_csr(&coo).expect("coo_to_csr should succeed");
    let (b_ptrs, b_cols, b_vals) = back.host_views::<f64>("test").expect("host views");
    assert_eq!(b_ptrs, a_ptrs);
    assert_eq!(b_cols, a_cols);
    assert_eq!(b_vals, a_vals);
}

#[test]
fn test_coo_compression_sums_duplicates() {
    let device = CpuRuntime::default_device();
    // unsorted triplets with (1, 1) stored twice
    let coo = CooData::<CpuRuntime>::from_slices(
        &[1, 0, 1, 1],
        &[1, 0, 0, 1],
        &[2.0f64, 5.0, -1.0, 3.0],
        [2, 2],
        MemLocation::Host,
        &device,
    )
    .expect("COO creation should succeed");

    let csr = convert::coo_to_csr(&coo).expect("coo_to_csr should succeed");
    let (ptrs, cols, vals) = csr.host_views::<f64>("test").expect("host views");
    assert_eq!(ptrs, &[0, 1, 3]);
    assert_eq!(cols, &[0, 0, 1]);
    assert_eq!(vals, &[5.0, -1.0, 5.0], "duplicate entries must sum");
}

#[test]
fn test_dense_round_trip_drops_nothing() {
    let device = CpuRuntime::default_device();
    let a = laplacian_2d(3, &device);
    let (a_ptrs, a_cols, a_vals) = a.host_views::<f64>("test").expect("host views");

    let dense = convert::csr_to_dense(&a).expect("csr_to_dense should succeed");
    assert_eq!(dense.shape(), [9, 9]);

    let back = convert::dense_to_csr(&dense).expect("dense_to_csr should succeed");
    let (b_ptrs, b_cols, b_vals) = back.host_views::<f64>("test").expect("host views");
    assert_eq!(b_ptrs, a_ptrs);
    assert_eq!(b_cols, a_cols);
    assert_eq!(b_vals, a_vals);
}

#[test]
fn test_padded_formats_keep_the_logical_nnz() {
    let device = CpuRuntime::default_device();
    let a = laplacian_2d(3, &device);

    // corner rows have 3 entries, the center row 5: ELL pads to the widest
    let ell = convert::csr_to_ell(&a).expect("csr_to_ell should succeed");
    assert_eq!(ell.max_row_nnz(), 5);
    assert_eq!(ell.nnz(), a.nnz(), "padding must not change the logical nnz");

    let sellp = convert::csr_to_sellp(&a, 4, 2).expect("csr_to_sellp should succeed");
    assert_eq!(sellp.blocksize(), 4);
    assert_eq!(sellp.alignment(), 2);
    assert_eq!(sellp.numblocks(), 3, "nine rows slice into three blocks of four");
    assert_eq!(sellp.nnz(), a.nnz());
}

// ============================================================================
// SpMV agreement across formats
// ============================================================================

#[test]
fn test_spmv_agrees_across_formats() {
    let (client, device) = create_cpu_client();
    let a = laplacian_2d(3, &device);

    let x_data: Vec<f64> = (0..9).map(|i| ((i + 1) as f64).sin()).collect();
    let y_data: Vec<f64> = (0..9).map(|i| 0.25 * i as f64 - 0.5).collect();
    let x = host_vec(&device, &x_data);
    let y = host_vec(&device, &y_data);

    let reference: Vec<f64> = client
        .spmv(2.0, &SparseMatrix::Csr(a.clone()), &x, -1.0, &y)
        .expect("csr spmv should succeed")
        .to_vec()
        .expect("readback should succeed");

    let coo = convert::csr_to_coo(&a).expect("csr_to_coo should succeed");
    let ell = convert::csr_to_ell(&a).expect("csr_to_ell should succeed");
    let sellp = convert::csr_to_sellp(&a, 4, 2).expect("csr_to_sellp should succeed");
    let dense = convert::csr_to_dense(&a).expect("csr_to_dense should succeed");

    let variants: Vec<(&str, SparseMatrix<CpuRuntime>)> = vec![
        ("coo", SparseMatrix::Coo(coo)),
        ("ell", SparseMatrix::Ell(ell)),
        ("sellp", SparseMatrix::SellP(sellp)),
        ("dense", SparseMatrix::Dense(dense)),
    ];
    for (name, m) in &variants {
        let got: Vec<f64> = client
            .spmv(2.0, m, &x, -1.0, &y)
            .expect("spmv should succeed")
            .to_vec()
            .expect("readback should succeed");
        assert_allclose_f64(&got, &reference, 1e-14, 1e-15, name);
    }
}

#[test]
fn test_spmv_on_an_empty_matrix_scales_the_output() {
    let (client, device) = create_cpu_client();
    let empty = CsrData::<CpuRuntime>::empty([4, 4], DType::F64, MemLocation::Host, &device)
        .expect("CSR creation should succeed");
    let a = SparseMatrix::Csr(empty);

    let x = host_vec(&device, &[1.0, 2.0, 3.0, 4.0]);
    let y = host_vec(&device, &[1.0, -1.0, 2.0, -2.0]);

    // y' = 0 * A x + 2 y
    let scaled: Vec<f64> = client
        .spmv(1.0, &a, &x, 2.0, &y)
        .expect("spmv should succeed")
        .to_vec()
        .expect("readback should succeed");
    assert_allclose_f64(&scaled, &[2.0, -2.0, 4.0, -4.0], 0.0, 1e-15, "beta path");

    // beta == 0 wipes y entirely
    let wiped: Vec<f64> = client
        .spmv(1.0, &a, &x, 0.0, &y)
        .expect("spmv should succeed")
        .to_vec()
        .expect("readback should succeed");
    assert_allclose_f64(&wiped, &[0.0; 4], 0.0, 1e-15, "beta zero path");
}

// ============================================================================
// Device allocation accounting
// ============================================================================

#[test]
fn test_device_buffers_are_released() {
    let (client, device) = create_cpu_client();
    let before = client.allocator().allocated_bytes();

    let a = Array::<CpuRuntime>::zeros(1024, DType::F64, MemLocation::Device, &device)
        .expect("array creation should succeed");
    let after_alloc = client.allocator().allocated_bytes();
    assert!(
        after_alloc >= before + 8 * 1024,
        "device allocation must be accounted: {} -> {}",
        before,
        after_alloc
    );

    // clones are reference-counted views, not new buffers
    let view = a.clone();
    assert_eq!(client.allocator().allocated_bytes(), after_alloc);

    drop(view);
    assert_eq!(
        client.allocator().allocated_bytes(),
        after_alloc,
        "dropping a view must not release the buffer"
    );
    drop(a);
    assert_eq!(
        client.allocator().allocated_bytes(),
        before,
        "dropping the last reference must release the buffer"
    );

    // a rejected decomposition count exits before anything is staged, so
    // the byte counter never moves; host inputs keep the probe exact
    let op = SparseMatrix::Csr(laplacian_1d(8, &device));
    let b = host_vec(&device, &[1.0; 8]);
    let mut x = host_vec(&device, &[0.0; 8]);
    let config = sparsr::solver::BlockAsyncConfig {
        matrices: 3,
        blocksize: 4,
        localiter: 1,
    };
    let mut params = sparsr::solver::SolverParams::default();
    let err = sparsr::solver::block_async_jacobi(&client, &op, &b, &mut x, &mut params, &config);
    assert!(matches!(
        err,
        Err(Error::UnsupportedConfiguration { param: "matrices", .. })
    ));
    assert_eq!(
        client.allocator().allocated_bytes(),
        before,
        "a rejected configuration must not allocate device memory"
    );
}
