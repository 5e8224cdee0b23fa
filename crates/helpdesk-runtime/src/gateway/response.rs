use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use helpdesk_core::error::{HelpdeskError, UNAUTHORIZED_ACTION};
use helpdesk_core::validation::ValidationErrors;

/// JSON envelope for successful calls. `message` is the flash shown to the
/// user after a mutation.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            status: StatusCode::OK,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(data)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl ApiResponse<()> {
    /// A bare flash message with no payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            status: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Error body sent to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
}

/// A [`HelpdeskError`] on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub HelpdeskError);

impl From<HelpdeskError> for ApiError {
    fn from(e: HelpdeskError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            HelpdeskError::Validation(_) | HelpdeskError::DuplicateSolution => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            HelpdeskError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            HelpdeskError::NotFound(_) => StatusCode::NOT_FOUND,
            HelpdeskError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            HelpdeskError::Forbidden(_) => StatusCode::FORBIDDEN,
            HelpdeskError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match &self.0 {
            HelpdeskError::Validation(_) => "VALIDATION_ERROR",
            HelpdeskError::DuplicateSolution => "DUPLICATE_SOLUTION",
            HelpdeskError::InvalidArgument(_) => "INVALID_ARGUMENT",
            HelpdeskError::NotFound(_) => "NOT_FOUND",
            HelpdeskError::Unauthorized(_) => "UNAUTHORIZED",
            HelpdeskError::Forbidden(_) => "FORBIDDEN",
            HelpdeskError::Timeout(_) => "TIMEOUT",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Client-facing body. Server-side failures never leak their detail.
    pub fn body(&self) -> ErrorBody {
        let (message, errors) = match &self.0 {
            HelpdeskError::Validation(errors) => (errors.to_string(), Some(errors.clone())),
            HelpdeskError::DuplicateSolution => {
                let mut errors = ValidationErrors::new();
                errors.add("type", self.0.to_string());
                (self.0.to_string(), Some(errors))
            }
            HelpdeskError::Forbidden(_) => (UNAUTHORIZED_ACTION.to_string(), None),
            HelpdeskError::NotFound(msg)
            | HelpdeskError::Unauthorized(msg)
            | HelpdeskError::InvalidArgument(msg) => (msg.clone(), None),
            HelpdeskError::Timeout(_) => ("The request timed out.".to_string(), None),
            _ => ("Server Error".to_string(), None),
        };

        ErrorBody {
            success: false,
            code: self.code(),
            message,
            errors,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, status = status.as_u16(), "Request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                HelpdeskError::invalid_field("title", "The title field is required."),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (HelpdeskError::DuplicateSolution, StatusCode::UNPROCESSABLE_ENTITY),
            (HelpdeskError::Forbidden("nope".into()), StatusCode::FORBIDDEN),
            (HelpdeskError::Unauthorized("who".into()), StatusCode::UNAUTHORIZED),
            (HelpdeskError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (HelpdeskError::Storage("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (HelpdeskError::Mail("smtp".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError(error).status_code(), status);
        }
    }

    #[test]
    fn test_validation_body_lists_fields() {
        let body = ApiError(HelpdeskError::invalid_field(
            "title",
            "The title field is required.",
        ))
        .body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["errors"]["title"][0], "The title field is required.");
    }

    #[test]
    fn test_forbidden_hides_reason() {
        let body = ApiError(HelpdeskError::Forbidden("missing edit tickets".into())).body();
        assert_eq!(body.message, "This action is unauthorized.");
    }

    #[test]
    fn test_internal_detail_is_not_exposed() {
        let body = ApiError(HelpdeskError::Database("password=hunter2".into())).body();
        assert_eq!(body.message, "Server Error");
        assert!(body.errors.is_none());
    }

    #[test]
    fn test_duplicate_solution_body() {
        let body = ApiError(HelpdeskError::DuplicateSolution).body();
        assert_eq!(
            body.message,
            "A solution follow-up already exists for this ticket."
        );
        assert!(body.errors.unwrap().contains("type"));
    }

    #[test]
    fn test_created_response() {
        let response = ApiResponse::created(serde_json::json!({"id": 1}))
            .with_message("Ticket created successfully.");
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["message"], "Ticket created successfully.");
        assert_eq!(json["data"]["id"], 1);
    }
}
