//! Batch pipeline data types.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::ticket::{TicketError, TicketStage};

// ============================================================================
// Records and Commands
// ============================================================================

/// One row as it arrives from a source, before any interpretation.
///
/// Every field is an optional string. JSON payloads may carry numbers
/// (`"ticket_id": 100`); those are turned into their decimal text.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub ticket_id: Option<String>,
    #[serde(default, alias = "no_serial", deserialize_with = "lenient_string")]
    pub serial_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub order_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub capex: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub invoice_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub supplier: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub stage: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Int(i64),
        Float(f64),
        Text(String),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|value| match value {
        Scalar::Int(n) => n.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Text(s) => s,
    }))
}

/// Intent to create or merge-update one ticket.
///
/// Only the fields the caller supplied are `Some`; `None` never clears a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertCommand {
    pub ticket_id: i64,
    pub serial_number: Option<String>,
    pub order_number: Option<String>,
    pub capex: Option<String>,
    pub invoice_number: Option<String>,
    pub supplier: Option<String>,
    pub stage: Option<TicketStage>,
}

// ============================================================================
// Outcomes
// ============================================================================

/// What happened to a single row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// Validated and written.
    Applied,
    /// Identified but not written.
    Skipped { ticket_id: i64, reason: String },
    /// No usable identifier; not part of the batch.
    Dropped { reason: String },
}

/// Summary of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub updated_count: usize,
    /// Identifiers of skipped rows, in the order they were skipped.
    pub skipped_ids: Vec<i64>,
    /// Rows excluded because their identifier was missing or unparsable.
    pub dropped_count: usize,
    pub message: String,
}

impl BatchResult {
    /// Fold one row outcome into the running result.
    pub fn record(mut self, outcome: RowOutcome) -> Self {
        match outcome {
            RowOutcome::Applied => self.updated_count += 1,
            RowOutcome::Skipped { ticket_id, .. } => self.skipped_ids.push(ticket_id),
            RowOutcome::Dropped { .. } => self.dropped_count += 1,
        }
        self
    }

    /// Seal the result with its summary message.
    pub fn finish(mut self) -> Self {
        self.message = format!("{} tickets updated successfully", self.updated_count);
        self
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Whole-batch failure: the source could not be turned into records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("Malformed source: {0}")]
    MalformedSource(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Failed to read source: {0}")]
    Io(String),
}

/// Row-level failure. The row is skipped and the batch continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("serial number {serial_number} is already assigned to an active ticket")]
    Conflict { serial_number: String },

    #[error("invalid stage: {0:?}")]
    InvalidStage(String),

    #[error(transparent)]
    Infrastructure(#[from] TicketError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_record_accepts_numbers_and_aliases() {
        let record: RawRecord = serde_json::from_str(
            r#"{"ticket_id": 100, "no_serial": "SN-1", "capex": 42, "unknown": true}"#,
        )
        .unwrap();

        assert_eq!(record.ticket_id.as_deref(), Some("100"));
        assert_eq!(record.serial_number.as_deref(), Some("SN-1"));
        assert_eq!(record.capex.as_deref(), Some("42"));
        assert!(record.order_number.is_none());
    }

    #[test]
    fn test_raw_record_null_fields() {
        let record: RawRecord =
            serde_json::from_str(r#"{"ticket_id": "7", "supplier": null}"#).unwrap();
        assert_eq!(record.ticket_id.as_deref(), Some("7"));
        assert!(record.supplier.is_none());
    }

    #[test]
    fn test_batch_result_fold() {
        let result = [
            RowOutcome::Applied,
            RowOutcome::Skipped {
                ticket_id: 2,
                reason: "conflict".to_string(),
            },
            RowOutcome::Dropped {
                reason: "bad id".to_string(),
            },
            RowOutcome::Applied,
        ]
        .into_iter()
        .fold(BatchResult::default(), BatchResult::record)
        .finish();

        assert_eq!(result.updated_count, 2);
        assert_eq!(result.skipped_ids, vec![2]);
        assert_eq!(result.dropped_count, 1);
        assert_eq!(result.message, "2 tickets updated successfully");
    }

    #[test]
    fn test_empty_batch_result_serializes_skipped_ids() {
        let result = BatchResult::default().finish();
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["updated_count"], 0);
        assert_eq!(json["skipped_ids"], serde_json::json!([]));
        assert_eq!(json["message"], "0 tickets updated successfully");
    }
}
