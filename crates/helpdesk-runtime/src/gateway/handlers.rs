//! Route handlers. Each one authenticates through [`CurrentActor`], hands
//! off to a service, and wraps the outcome in the JSON envelope.

use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;

use helpdesk_core::filter::ListParams;
use helpdesk_core::model::{Attachment, AttachmentKind, Followup, Ticket, TicketDetail};

use super::auth::CurrentActor;
use super::request::FormData;
use super::response::{ApiError, ApiResponse};
use super::state::AppState;
use crate::lifecycle::{CreatedFollowup, CreatedTicket, FollowupUpdate, TicketInput};
use crate::listing::TicketListing;
use crate::storage::Download;

/// Query appended to the redirect when a stored file has gone missing.
pub const FILE_ERROR_QUERY: &str = "file_error=File+not+found+on+server.";

type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
}

pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, database) = match &state.database {
        None => (StatusCode::OK, "not configured"),
        Some(db) => match db.health_check().await {
            Ok(()) => (StatusCode::OK, "ok"),
            Err(e) => {
                tracing::warn!(error = %e, "Health check failed");
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
            }
        },
    };

    let body = HealthResponse {
        status: if status.is_success() { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
    };
    (status, Json(body))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<TicketListing> {
    let listing = state
        .listing
        .list(&actor, ListParams::from_query(&query))
        .await?;
    Ok(ApiResponse::ok(listing))
}

pub async fn create_ticket(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    multipart: Multipart,
) -> ApiResult<CreatedTicket> {
    let form = FormData::from_multipart(multipart).await?;
    let created = state
        .tickets
        .create(&actor, form.ticket_input(), form.files)
        .await?;
    Ok(ApiResponse::created(created).with_message("Ticket created successfully."))
}

pub async fn show_ticket(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
) -> ApiResult<TicketDetail> {
    Ok(ApiResponse::ok(state.tickets.show(&actor, id).await?))
}

pub async fn update_ticket(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
    Json(input): Json<TicketInput>,
) -> ApiResult<Ticket> {
    let ticket = state.tickets.update(&actor, id, input).await?;
    Ok(ApiResponse::ok(ticket).with_message("Ticket updated successfully."))
}

pub async fn delete_ticket(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    state.tickets.delete(&actor, id).await?;
    Ok(ApiResponse::message("Ticket deleted successfully."))
}

pub async fn upload_ticket_files(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> ApiResult<Vec<Attachment>> {
    let form = FormData::from_multipart(multipart).await?;
    let files = state.tickets.attach_files(&actor, id, form.files).await?;
    Ok(ApiResponse::created(files).with_message("Files uploaded successfully."))
}

pub async fn create_followup(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    multipart: Multipart,
) -> ApiResult<CreatedFollowup> {
    let form = FormData::from_multipart(multipart).await?;
    let created = state
        .followups
        .create(&actor, form.followup_input(), form.files)
        .await?;
    Ok(ApiResponse::created(created).with_message("Follow-up added successfully."))
}

pub async fn update_followup(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
    Json(input): Json<FollowupUpdate>,
) -> ApiResult<Followup> {
    let followup = state.followups.update(&actor, id, input).await?;
    Ok(ApiResponse::ok(followup).with_message("Follow-up updated successfully."))
}

pub async fn delete_followup(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    state.followups.delete(&actor, id).await?;
    Ok(ApiResponse::message("Follow-up deleted successfully."))
}

pub async fn download_ticket_file(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(file_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    download(&state, &actor, AttachmentKind::Ticket, file_id, &headers).await
}

pub async fn download_followup_file(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(file_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    download(&state, &actor, AttachmentKind::Followup, file_id, &headers).await
}

pub async fn download_file(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path((file_type, file_id)): Path<(String, i64)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let kind = AttachmentKind::parse(&file_type)?;
    download(&state, &actor, kind, file_id, &headers).await
}

pub async fn delete_ticket_file(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(file_id): Path<i64>,
) -> ApiResult<Attachment> {
    let file = state
        .files
        .delete_file(&actor, AttachmentKind::Ticket, file_id)
        .await?;
    Ok(ApiResponse::ok(file).with_message("File deleted successfully."))
}

pub async fn delete_followup_file(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(file_id): Path<i64>,
) -> ApiResult<Attachment> {
    let file = state
        .files
        .delete_file(&actor, AttachmentKind::Followup, file_id)
        .await?;
    Ok(ApiResponse::ok(file).with_message("File deleted successfully."))
}

async fn download(
    state: &AppState,
    actor: &helpdesk_core::auth::Actor,
    kind: AttachmentKind,
    file_id: i64,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let download = state
        .files
        .download_with_authorization(actor, kind, file_id)
        .await?;

    Ok(match download {
        Download::File {
            bytes,
            filename,
            mime_type,
        } => (
            [
                (header::CONTENT_TYPE, mime_type),
                (header::CONTENT_DISPOSITION, content_disposition(&filename)),
            ],
            bytes,
        )
            .into_response(),
        Download::Missing { ticket_id } => {
            let back = headers
                .get(header::REFERER)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("/tickets/{}", ticket_id));
            let separator = if back.contains('?') { '&' } else { '?' };
            Redirect::to(&format!("{}{}{}", back, separator, FILE_ERROR_QUERY)).into_response()
        }
    })
}

/// `attachment; filename="..."` with characters a header cannot carry
/// replaced.
fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}
