//! Pre-write business rules.

use super::{RowError, UpsertCommand};
use crate::ticket::UpsertStore;

/// Check a command against persisted state before it is written.
///
/// The rule applies to the ticket as it will look after the write: the
/// supplied fields merged over the stored row. An upsert always makes the
/// ticket active, so a soft-deleted row counts as active here. A resulting
/// serial must not already belong to another active, non-completed ticket,
/// unless the resulting stage is itself completed.
pub fn validate<S>(store: &S, command: &UpsertCommand) -> Result<(), RowError>
where
    S: UpsertStore + ?Sized,
{
    let stored = store.find_any(command.ticket_id)?;

    let stage = command
        .stage
        .or_else(|| stored.as_ref().and_then(|t| t.stage));
    if stage.is_some_and(|s| s.is_completed()) {
        return Ok(());
    }

    let serial_number = command
        .serial_number
        .as_deref()
        .or_else(|| stored.as_ref().and_then(|t| t.serial_number.as_deref()));
    let Some(serial_number) = serial_number else {
        return Ok(());
    };

    if store.exists_active_conflict(serial_number, command.ticket_id)? {
        return Err(RowError::Conflict {
            serial_number: serial_number.to_string(),
        });
    }

    Ok(())
}
