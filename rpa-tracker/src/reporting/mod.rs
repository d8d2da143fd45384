//! Read-only reports over tracked transactions.
//!
//! Every report covers transactions created in a half-open window
//! `[start, end)`. Outputs are sorted so repeated runs compare equal.

mod report;

pub use report::{ReportSnapshot, SystemCount, TransactionReport};
pub use crate::store::StageCount;
