//! Sparse and dense matrix containers
//!
//! One tagged wrapper, [`SparseMatrix`], over a closed set of per-format
//! payload structs. Every payload knows its location (host or device) and
//! moves only through explicit `to_location` calls; format changes only
//! through the functions in [`convert`].

pub mod convert;
mod coo;
mod csr;
mod dense;
mod ell;
mod format;
mod matrix;
mod sellp;

pub use coo::CooData;
pub use csr::CsrData;
pub use dense::DenseData;
pub use ell::EllData;
pub use format::{FillMode, MajorOrder, SparseStorage, StorageFormat};
pub use matrix::SparseMatrix;
pub use sellp::SellpData;
