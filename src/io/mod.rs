//! Input/output helpers.
//!
//! - JSON dataset ingest, the file-backed `DataSource` (`ingest`)
//! - report CSV exports (`export`)
//! - fitted-curve JSON export (`curve`)

pub mod curve;
pub mod export;
pub mod ingest;

pub use curve::*;
pub use export::*;
pub use ingest::*;
