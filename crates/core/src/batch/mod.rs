//! Batch upsert pipeline.
//!
//! Raw records from a [`RecordSource`] flow through [`normalize`], [`validate`]
//! and [`UpsertStore::upsert`](crate::ticket::UpsertStore::upsert), one row at
//! a time, driven by [`BatchCoordinator`]. Row problems are reported in the
//! [`BatchResult`]; only an unreadable source fails the whole call.

mod coordinator;
mod normalize;
mod source;
mod types;
mod validate;

pub use coordinator::BatchCoordinator;
pub use normalize::{non_blank, normalize, parse_ticket_id, NormalizeError};
pub use source::{CsvSource, JsonSource, RecordSource};
pub use types::{BatchError, BatchResult, RawRecord, RowError, RowOutcome, UpsertCommand};
pub use validate::validate;
