//! Host-side CSR transform utilities
//!
//! Structural surgery on matrices: block splitting, transposition, row
//! decomposition, factor merging, supernode detection, pattern-matched
//! comparison, and diagonal scaling. Everything here runs on host payloads;
//! callers stage device matrices down first and ship the results back.

mod diff;
mod merge;
mod scale;
mod slice;
mod split;
mod supernodal;
mod transpose;

pub use diff::frobenius_diff;
pub use merge::lumerge;
pub use scale::{scale, ScaleKind};
pub use slice::{slice, CommPlan, SliceResult};
pub use split::split;
pub use supernodal::supernodal_pattern;
pub use transpose::{transpose, transpose_abs, transpose_conj, transpose_pattern, transpose_with};

use crate::array::MemLocation;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::sparse::{CsrData, SparseMatrix, SparseStorage};

/// Transforms accept only host-resident CSR input.
pub(crate) fn expect_host_csr<'a, R: Runtime>(
    a: &'a SparseMatrix<R>,
    op: &'static str,
) -> Result<&'a CsrData<R>> {
    let csr = a.expect_csr(op)?;
    if csr.location() != MemLocation::Host {
        return Err(Error::UnsupportedLocation {
            op,
            required: "host",
        });
    }
    Ok(csr)
}

pub(crate) fn expect_square<R: Runtime>(m: &CsrData<R>) -> Result<usize> {
    let [nrows, ncols] = m.shape();
    if nrows != ncols {
        return Err(Error::ShapeMismatch {
            expected: vec![nrows, nrows],
            got: vec![nrows, ncols],
        });
    }
    Ok(nrows)
}
