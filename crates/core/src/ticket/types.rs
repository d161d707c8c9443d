//! Core ticket data types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Workflow Stage
// ============================================================================

/// Procurement workflow stage of a replacement ticket.
///
/// Stages arrive from operators and spreadsheets as free text ("Request
/// Initiated", "COMPLETED", ...). Only the labels below are accepted; anything
/// else is rejected at the boundary instead of being stored verbatim.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TicketStage {
    RequestInitiated,
    ProcurementPhase,
    Completed,
}

impl TicketStage {
    /// All stages in workflow order.
    pub const ALL: [TicketStage; 3] = [
        TicketStage::RequestInitiated,
        TicketStage::ProcurementPhase,
        TicketStage::Completed,
    ];

    /// Key used for storage and filtering.
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStage::RequestInitiated => "request_initiated",
            TicketStage::ProcurementPhase => "procurement_phase",
            TicketStage::Completed => "completed",
        }
    }

    /// Human readable label, as operators write it.
    pub fn label(&self) -> &'static str {
        match self {
            TicketStage::RequestInitiated => "Request Initiated",
            TicketStage::ProcurementPhase => "Procurement Phase",
            TicketStage::Completed => "COMPLETED",
        }
    }

    /// Completed tickets release their serial number for reuse.
    pub fn is_completed(&self) -> bool {
        matches!(self, TicketStage::Completed)
    }
}

impl fmt::Display for TicketStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a stage string is not one of the known stages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown ticket stage: {0:?}")]
pub struct UnknownStage(pub String);

impl FromStr for TicketStage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        TicketStage::ALL
            .into_iter()
            .find(|stage| {
                trimmed.eq_ignore_ascii_case(stage.as_str())
                    || trimmed.eq_ignore_ascii_case(stage.label())
            })
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}

// ============================================================================
// Ticket
// ============================================================================

/// An asset replacement ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    /// Surrogate key assigned by the store.
    pub id: i64,
    /// Business identifier (ticket number) used by callers.
    pub ticket_id: i64,
    pub category_id: Option<i64>,
    pub serial_number: Option<String>,
    pub order_number: Option<String>,
    pub capex: Option<String>,
    pub invoice_number: Option<String>,
    pub supplier: Option<String>,
    pub distribution_center_id: Option<i64>,
    pub distribution_center_name: Option<String>,
    pub stage: Option<TicketStage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft delete marker. `None` means the ticket is active.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Returns true if the ticket has not been soft-deleted.
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Returns true if the ticket reached the completed stage.
    pub fn is_completed(&self) -> bool {
        self.stage.is_some_and(|s| s.is_completed())
    }
}

/// Slim projection used by the basic listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketSummary {
    pub ticket_id: i64,
    pub serial_number: Option<String>,
    pub order_number: Option<String>,
    pub stage: Option<TicketStage>,
}
