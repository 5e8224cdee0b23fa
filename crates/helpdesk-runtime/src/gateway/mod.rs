//! HTTP gateway: routing, bearer authentication, request tracing and the
//! JSON envelope.

mod auth;
mod handlers;
mod request;
mod response;
mod server;
mod state;
mod tracing;

pub use auth::{AuthError, AuthMiddleware, CurrentActor, TokenIssuer};
pub use handlers::{HealthResponse, FILE_ERROR_QUERY};
pub use request::FormData;
pub use response::{ApiError, ApiResponse, ErrorBody};
pub use server::GatewayServer;
pub use state::AppState;
pub use tracing::{TracingState, REQUEST_ID_HEADER, TRACE_ID_HEADER};
