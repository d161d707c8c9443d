//! Raw record to upsert command conversion.

use super::{RawRecord, UpsertCommand};
use crate::ticket::TicketStage;

/// Why a record could not become a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// Missing, non-numeric, zero or negative identifier. The row is dropped.
    InvalidIdentifier(Option<String>),
    /// The identifier is fine but the stage is not a known stage.
    InvalidStage { ticket_id: i64, value: String },
}

/// Trim a value, treating blank text as "not supplied".
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == v.len() {
            Some(v)
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Parse a business identifier. Only positive integers are valid.
pub fn parse_ticket_id(value: Option<&str>) -> Option<i64> {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
}

/// Convert one raw record into an upsert command.
pub fn normalize(record: RawRecord) -> Result<UpsertCommand, NormalizeError> {
    let ticket_id = parse_ticket_id(record.ticket_id.as_deref())
        .ok_or_else(|| NormalizeError::InvalidIdentifier(record.ticket_id.clone()))?;

    let stage = match non_blank(record.stage) {
        Some(value) => Some(
            value
                .parse::<TicketStage>()
                .map_err(|_| NormalizeError::InvalidStage { ticket_id, value })?,
        ),
        None => None,
    };

    Ok(UpsertCommand {
        ticket_id,
        serial_number: non_blank(record.serial_number),
        order_number: non_blank(record.order_number),
        capex: non_blank(record.capex),
        invoice_number: non_blank(record.invoice_number),
        supplier: non_blank(record.supplier),
        stage,
    })
}
