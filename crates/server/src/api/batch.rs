//! Bulk upsert handlers.
//!
//! Both endpoints hand the payload to the batch coordinator on the blocking
//! pool. Row failures are reported in the result; only an unreadable payload
//! fails the request.

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::{error, info};

use assetflow_core::{
    BatchCoordinator, BatchError, BatchResult, CsvSource, JsonSource, RecordSource, TicketStore,
};

use super::{error_response, ApiError};
use crate::state::AppState;

/// Multipart field carrying the uploaded file.
const FILE_FIELD: &str = "file";

/// Run `payload` through the pipeline without blocking the runtime.
async fn run_batch<Src>(
    store: Arc<dyn TicketStore>,
    source: Src,
    payload: Bytes,
) -> Result<BatchResult, ApiError>
where
    Src: RecordSource + Send + 'static,
{
    let joined = tokio::task::spawn_blocking(move || {
        BatchCoordinator::new(store.as_ref()).run_source(&source, payload.as_ref())
    })
    .await;

    match joined {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(batch_error(e)),
        Err(e) => {
            error!(error = %e, "Batch task failed");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "batch processing failed",
            ))
        }
    }
}

fn batch_error(e: BatchError) -> ApiError {
    let status = match e {
        BatchError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        BatchError::MalformedSource(_) | BatchError::MissingColumn(_) => StatusCode::BAD_REQUEST,
    };
    error_response(status, e.to_string())
}

/// Upsert tickets from a JSON array of records
pub async fn upsert_batch(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<BatchResult>, ApiError> {
    info!(bytes = body.len(), "Received JSON batch");

    let result = run_batch(Arc::clone(state.ticket_store()), JsonSource, body).await?;
    Ok(Json(result))
}

/// Upsert tickets from an uploaded CSV file
pub async fn upsert_csv(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<BatchResult>, ApiError> {
    let mut file: Option<Bytes> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(error_response(e.status(), e.body_text())),
        };

        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        match field.bytes().await {
            Ok(bytes) => {
                info!(filename = ?filename, bytes = bytes.len(), "Received CSV upload");
                file = Some(bytes);
                break;
            }
            Err(e) => return Err(error_response(e.status(), e.body_text())),
        }
    }

    let Some(file) = file else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("missing multipart field '{}'", FILE_FIELD),
        ));
    };

    let source = CsvSource::new(state.config().batch.delimiter_byte());
    let result = run_batch(Arc::clone(state.ticket_store()), source, file).await?;
    Ok(Json(result))
}
