//! Aggregation across qubit groups.
//!
//! Responsibilities:
//!
//! - pool raw counts over groups before fitting (`pool`)
//! - device-wide estimates and the leakage correction (`combined`)
//! - per-group tables with a `Mean` row (`groups`)

pub mod combined;
pub mod groups;
pub mod pool;

pub use combined::*;
pub use groups::*;
pub use pool::*;
