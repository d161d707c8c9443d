//! Ticket storage traits and request types.

use thiserror::Error;

use crate::batch::UpsertCommand;
use crate::ticket::{Ticket, TicketStage, TicketSummary};

/// Error type for ticket operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TicketError {
    /// No active ticket with this business identifier.
    #[error("Ticket not found: {0}")]
    NotFound(i64),

    /// A ticket with this business identifier already exists.
    #[error("Ticket already exists: {0}")]
    AlreadyExists(i64),

    /// Another active, non-completed ticket already holds the serial number.
    #[error("Serial number {serial_number} is already assigned to an active ticket (writing ticket {ticket_id})")]
    SerialConflict { serial_number: String, ticket_id: i64 },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for TicketError {
    fn from(e: rusqlite::Error) -> Self {
        TicketError::Database(e.to_string())
    }
}

/// Request to create a new ticket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateTicketRequest {
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
}

/// Partial update of a ticket. `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateTicketRequest {
    pub category_id: Option<i64>,
    pub serial_number: Option<String>,
    pub order_number: Option<String>,
    pub capex: Option<String>,
    pub invoice_number: Option<String>,
    pub supplier: Option<String>,
    pub distribution_center_id: Option<i64>,
    pub distribution_center_name: Option<String>,
    pub stage: Option<TicketStage>,
}

/// Filter for querying active tickets.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    /// Filter by workflow stage.
    pub stage: Option<TicketStage>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl TicketFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            stage: None,
            limit: 100,
            offset: 0,
        }
    }

    /// Filter by stage.
    pub fn with_stage(mut self, stage: TicketStage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// The write capability the batch pipeline needs.
pub trait UpsertStore: Send + Sync {
    /// Insert the ticket if absent, otherwise merge the supplied fields over
    /// the stored ones. Must be atomic per business identifier.
    fn upsert(&self, command: &UpsertCommand) -> Result<(), TicketError>;

    /// Whether an active, non-completed ticket other than `exclude_ticket_id`
    /// already carries `serial_number`.
    fn exists_active_conflict(
        &self,
        serial_number: &str,
        exclude_ticket_id: i64,
    ) -> Result<bool, TicketError>;

    /// Stored ticket for `ticket_id`, soft-deleted or not.
    fn find_any(&self, ticket_id: i64) -> Result<Option<Ticket>, TicketError>;
}

/// Trait for ticket storage backends.
pub trait TicketStore: UpsertStore {
    /// Create a new ticket.
    fn create(&self, request: CreateTicketRequest) -> Result<Ticket, TicketError>;

    /// Get an active ticket by business identifier.
    fn get(&self, ticket_id: i64) -> Result<Option<Ticket>, TicketError>;

    /// List active tickets matching the filter, newest first.
    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError>;

    /// Count active tickets matching the filter (pagination ignored).
    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError>;

    /// Slim listing of all active tickets.
    fn list_summaries(&self) -> Result<Vec<TicketSummary>, TicketError>;

    /// Merge the supplied fields into an active ticket.
    fn update(&self, ticket_id: i64, request: UpdateTicketRequest) -> Result<Ticket, TicketError>;

    /// Mark an active ticket as deleted. Returns the ticket as it was.
    fn soft_delete(&self, ticket_id: i64) -> Result<Ticket, TicketError>;
}
