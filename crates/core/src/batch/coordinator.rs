//! Sequential batch driver.

use std::io::Read;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::{
    normalize, validate, BatchError, BatchResult, NormalizeError, RawRecord, RecordSource,
    RowError, RowOutcome,
};
use crate::metrics::{BATCH_DURATION, BATCH_ROWS, BATCH_RUNS};
use crate::ticket::UpsertStore;

/// Drives raw records through normalize, validate and upsert, one at a time
/// and in input order.
///
/// A failing row never stops the batch and never undoes rows already written.
pub struct BatchCoordinator<'a, S: UpsertStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: UpsertStore + ?Sized> BatchCoordinator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Read every record from `reader` with `source`, then run them.
    ///
    /// A source that cannot be read or decoded fails the whole call before any
    /// row is written.
    pub fn run_source<Src, R>(&self, source: &Src, reader: R) -> Result<BatchResult, BatchError>
    where
        Src: RecordSource,
        R: Read,
    {
        let records = source.read(reader).inspect_err(|e| {
            warn!(source = source.name(), error = %e, "Rejected batch source");
        })?;

        BATCH_RUNS.with_label_values(&[source.name()]).inc();
        Ok(self.run(records))
    }

    /// Process records sequentially and summarize.
    pub fn run<I>(&self, records: I) -> BatchResult
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let start = Instant::now();

        let result = records
            .into_iter()
            .map(|record| self.process(record))
            .inspect(|outcome| {
                let label = match outcome {
                    RowOutcome::Applied => "applied",
                    RowOutcome::Skipped { .. } => "skipped",
                    RowOutcome::Dropped { .. } => "dropped",
                };
                BATCH_ROWS.with_label_values(&[label]).inc();
            })
            .fold(BatchResult::default(), BatchResult::record)
            .finish();

        BATCH_DURATION.observe(start.elapsed().as_secs_f64());
        info!(
            updated = result.updated_count,
            skipped = result.skipped_ids.len(),
            dropped = result.dropped_count,
            "Batch upsert finished"
        );

        result
    }

    /// Run a single record through the pipeline.
    pub fn process(&self, record: RawRecord) -> RowOutcome {
        let command = match normalize(record) {
            Ok(command) => command,
            Err(NormalizeError::InvalidIdentifier(raw)) => {
                debug!(ticket_id = ?raw, "Dropped row without a valid ticket id");
                return RowOutcome::Dropped {
                    reason: format!("invalid ticket id: {:?}", raw),
                };
            }
            Err(NormalizeError::InvalidStage { ticket_id, value }) => {
                return self.skip(ticket_id, RowError::InvalidStage(value));
            }
        };

        if let Err(e) = validate(self.store, &command) {
            return self.skip(command.ticket_id, e);
        }

        if let Err(e) = self.store.upsert(&command) {
            return self.skip(command.ticket_id, RowError::Infrastructure(e));
        }

        RowOutcome::Applied
    }

    fn skip(&self, ticket_id: i64, error: RowError) -> RowOutcome {
        warn!(ticket_id, error = %error, "Ticket skipped");
        RowOutcome::Skipped {
            ticket_id,
            reason: error.to_string(),
        }
    }
}
