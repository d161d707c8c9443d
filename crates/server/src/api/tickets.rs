//! Ticket API handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use assetflow_core::batch::non_blank;
use assetflow_core::{
    CreateTicketRequest, Ticket, TicketError, TicketFilter, TicketStage, TicketSummary,
    UpdateTicketRequest,
};

use super::{error_response, ApiError};
use crate::metrics::{TICKETS_CREATED_TOTAL, TICKETS_DELETED_TOTAL};
use crate::state::AppState;

/// Maximum allowed limit for ticket queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for ticket queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a ticket
#[derive(Debug, Deserialize)]
pub struct CreateTicketBody {
    pub ticket_id: i64,
    pub category_id: Option<i64>,
    pub serial_number: Option<String>,
    pub order_number: Option<String>,
    pub capex: Option<String>,
    pub invoice_number: Option<String>,
    pub supplier: Option<String>,
    pub distribution_center_id: Option<i64>,
    pub distribution_center_name: Option<String>,
    /// Stage label or key, e.g. "Procurement Phase"
    pub stage: Option<String>,
}

/// Request body for a partial update. Omitted fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTicketBody {
    pub category_id: Option<i64>,
    pub serial_number: Option<String>,
    pub order_number: Option<String>,
    pub capex: Option<String>,
    pub invoice_number: Option<String>,
    pub supplier: Option<String>,
    pub distribution_center_id: Option<i64>,
    pub distribution_center_name: Option<String>,
    pub stage: Option<String>,
}

/// Query parameters for listing tickets
#[derive(Debug, Deserialize)]
pub struct ListTicketsParams {
    /// Filter by stage
    pub stage: Option<String>,
    /// Maximum number of tickets to return
    pub limit: Option<i64>,
    /// Pagination offset
    pub offset: Option<i64>,
}

/// Response for ticket operations
#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub id: i64,
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
    pub created_at: String,
    pub updated_at: String,
}

impl From<Ticket> for TicketResponse {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: ticket.id,
            ticket_id: ticket.ticket_id,
            category_id: ticket.category_id,
            serial_number: ticket.serial_number,
            order_number: ticket.order_number,
            capex: ticket.capex,
            invoice_number: ticket.invoice_number,
            supplier: ticket.supplier,
            distribution_center_id: ticket.distribution_center_id,
            distribution_center_name: ticket.distribution_center_name,
            stage: ticket.stage,
            created_at: ticket.created_at.to_rfc3339(),
            updated_at: ticket.updated_at.to_rfc3339(),
        }
    }
}

/// Response for listing tickets
#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    pub tickets: Vec<TicketResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Response for the basic listing
#[derive(Debug, Serialize)]
pub struct BasicTicketsResponse {
    pub tickets: Vec<TicketSummary>,
    pub count: usize,
}

// ============================================================================
// Helpers
// ============================================================================

fn ticket_error(e: TicketError) -> ApiError {
    let status = match &e {
        TicketError::NotFound(_) => StatusCode::NOT_FOUND,
        TicketError::AlreadyExists(_) | TicketError::SerialConflict { .. } => StatusCode::CONFLICT,
        TicketError::Database(_) => {
            error!(error = %e, "Ticket store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, e.to_string())
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    error_response(rejection.status(), rejection.body_text())
}

fn parse_stage(stage: Option<String>) -> Result<Option<TicketStage>, ApiError> {
    non_blank(stage)
        .map(|s| s.parse::<TicketStage>())
        .transpose()
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new ticket
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateTicketBody>, JsonRejection>,
) -> Result<(StatusCode, Json<TicketResponse>), ApiError> {
    let Json(body) = payload.map_err(json_rejection)?;

    if body.ticket_id <= 0 {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("ticket_id must be a positive integer, got {}", body.ticket_id),
        ));
    }

    let request = CreateTicketRequest {
        ticket_id: body.ticket_id,
        category_id: body.category_id,
        serial_number: non_blank(body.serial_number),
        order_number: non_blank(body.order_number),
        capex: non_blank(body.capex),
        invoice_number: non_blank(body.invoice_number),
        supplier: non_blank(body.supplier),
        distribution_center_id: body.distribution_center_id,
        distribution_center_name: non_blank(body.distribution_center_name),
        stage: parse_stage(body.stage)?,
    };

    let ticket = state.ticket_store().create(request).map_err(ticket_error)?;

    TICKETS_CREATED_TOTAL.inc();
    info!(ticket_id = ticket.ticket_id, "Ticket created");

    Ok((StatusCode::CREATED, Json(TicketResponse::from(ticket))))
}

/// Get a ticket by business identifier
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<i64>,
) -> Result<Json<TicketResponse>, ApiError> {
    match state.ticket_store().get(ticket_id).map_err(ticket_error)? {
        Some(ticket) => Ok(Json(TicketResponse::from(ticket))),
        None => Err(ticket_error(TicketError::NotFound(ticket_id))),
    }
}

/// List tickets with optional filters
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTicketsParams>,
) -> Result<Json<ListTicketsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = TicketFilter::new().with_limit(limit).with_offset(offset);

    if let Some(stage) = parse_stage(params.stage)? {
        filter = filter.with_stage(stage);
    }

    let store = state.ticket_store();
    let tickets = store.list(&filter).map_err(ticket_error)?;
    let total = store.count(&filter).map_err(ticket_error)?;

    Ok(Json(ListTicketsResponse {
        tickets: tickets.into_iter().map(TicketResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

/// Slim listing of every active ticket
pub async fn list_basic_tickets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BasicTicketsResponse>, ApiError> {
    let tickets = state.ticket_store().list_summaries().map_err(ticket_error)?;

    Ok(Json(BasicTicketsResponse {
        count: tickets.len(),
        tickets,
    }))
}

/// Merge the supplied fields into a ticket
pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<i64>,
    payload: Result<Json<UpdateTicketBody>, JsonRejection>,
) -> Result<Json<TicketResponse>, ApiError> {
    let Json(body) = payload.map_err(json_rejection)?;

    let request = UpdateTicketRequest {
        category_id: body.category_id,
        serial_number: non_blank(body.serial_number),
        order_number: non_blank(body.order_number),
        capex: non_blank(body.capex),
        invoice_number: non_blank(body.invoice_number),
        supplier: non_blank(body.supplier),
        distribution_center_id: body.distribution_center_id,
        distribution_center_name: non_blank(body.distribution_center_name),
        stage: parse_stage(body.stage)?,
    };

    let ticket = state
        .ticket_store()
        .update(ticket_id, request)
        .map_err(ticket_error)?;

    info!(ticket_id, "Ticket updated");
    Ok(Json(TicketResponse::from(ticket)))
}

/// Soft-delete a ticket
pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .ticket_store()
        .soft_delete(ticket_id)
        .map_err(ticket_error)?;

    TICKETS_DELETED_TOTAL.inc();
    info!(ticket_id, "Ticket deleted");

    Ok(StatusCode::NO_CONTENT)
}
