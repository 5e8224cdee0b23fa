use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use helpdesk_core::auth::{Actor, AuthContext, Claims};
use helpdesk_core::config::AuthConfig;
use helpdesk_core::error::HelpdeskError;
use helpdesk_core::model::User;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::response::ApiError;
use super::state::AppState;

/// Validates bearer tokens signed with the shared HMAC secret.
#[derive(Clone)]
pub struct AuthMiddleware {
    decoding_key: Option<DecodingKey>,
}

impl std::fmt::Debug for AuthMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthMiddleware")
            .field("decoding_key", &self.decoding_key.is_some())
            .finish()
    }
}

impl AuthMiddleware {
    /// Without a configured secret every request is unauthenticated.
    pub fn new(config: &AuthConfig) -> Self {
        match config.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => Self::with_secret(secret),
            _ => {
                tracing::warn!("No JWT secret configured; all requests will be rejected");
                Self { decoding_key: None }
            }
        }
    }

    pub fn with_secret(secret: &str) -> Self {
        Self {
            decoding_key: Some(DecodingKey::from_secret(secret.as_bytes())),
        }
    }

    /// Validate a JWT token and extract claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let key = self
            .decoding_key
            .as_ref()
            .ok_or_else(|| AuthError::InvalidToken("JWT secret not configured".to_string()))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 60;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data = decode::<Claims>(token, key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                AuthError::InvalidToken("Invalid signature".to_string())
            }
            jsonwebtoken::errors::ErrorKind::InvalidToken => {
                AuthError::InvalidToken("Invalid token format".to_string())
            }
            jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(claim) => {
                AuthError::InvalidToken(format!("Missing required claim: {}", claim))
            }
            _ => AuthError::InvalidToken(e.to_string()),
        })?;

        Ok(token_data.claims)
    }

    fn context_for(&self, header: Option<&str>) -> Result<AuthContext, AuthError> {
        let header = header.ok_or(AuthError::MissingHeader)?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidHeader)?;

        let claims = self.validate_token(token)?;
        let user_id = claims
            .user_id()
            .ok_or_else(|| AuthError::InvalidToken("Subject is not a user id".to_string()))?;
        Ok(AuthContext::authenticated(user_id, claims.roles))
    }
}

/// Mints tokens accepted by [`AuthMiddleware`].
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
    ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX / 2),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        match config.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(Self::new(secret, config.session_ttl_secs)),
            _ => Err(AuthError::InvalidToken("JWT secret not configured".to_string())),
        }
    }

    pub fn issue(&self, user: &User, roles: &[String]) -> Result<String, AuthError> {
        let claims = roles
            .iter()
            .fold(
                Claims::builder().user_id(user.id).name(&user.name),
                |builder, role| builder.role(role),
            )
            .duration_secs(self.ttl_secs)
            .build()
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        encode(&Header::default(), &claims, &self.key)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

/// Authentication errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingHeader,
    #[error("Invalid authorization header format")]
    InvalidHeader,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Token expired")]
    TokenExpired,
}

/// Extract auth context from request.
pub fn extract_auth_context(req: &Request<Body>, middleware: &AuthMiddleware) -> AuthContext {
    let header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match middleware.context_for(header) {
        Ok(context) => context,
        Err(AuthError::MissingHeader) => AuthContext::unauthenticated(),
        Err(e) => {
            tracing::debug!(error = %e, "Rejected bearer token");
            AuthContext::unauthenticated()
        }
    }
}

/// Authentication middleware function.
pub async fn auth_middleware(
    State(middleware): State<Arc<AuthMiddleware>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth_context = extract_auth_context(&req, &middleware);
    req.extensions_mut().insert(auth_context);
    next.run(req).await
}

/// The authenticated caller, with roles and permissions loaded fresh from
/// storage. Rejects with 401 when the request carries no valid token or the
/// user no longer exists.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

impl FromRequestParts<AppState> for CurrentActor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .extensions
            .get::<AuthContext>()
            .map(AuthContext::require_user_id)
            .unwrap_or_else(|| Err(HelpdeskError::Unauthorized("Authentication required".into())))?;

        let actor = state
            .repos
            .users
            .load_actor(user_id)
            .await?
            .ok_or_else(|| HelpdeskError::Unauthorized("Unknown user".into()))?;

        Ok(CurrentActor(actor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_test_claims(sub: &str, duration_secs: i64) -> Claims {
        Claims::builder()
            .subject(sub)
            .role("user")
            .duration_secs(duration_secs)
            .build()
            .unwrap()
    }

    fn create_test_token(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn user(id: i64) -> User {
        User {
            id,
            name: "Bea".into(),
            email: "bea@example.com".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_valid_token_with_correct_secret() {
        let middleware = AuthMiddleware::with_secret("test-secret-key");
        let token = create_test_token(&create_test_claims("7", 3600), "test-secret-key");

        let claims = middleware.validate_token(&token).unwrap();
        assert_eq!(claims.user_id(), Some(7));
    }

    #[test]
    fn test_valid_token_with_wrong_secret() {
        let middleware = AuthMiddleware::with_secret("correct-secret");
        let token = create_test_token(&create_test_claims("7", 3600), "wrong-secret");

        match middleware.validate_token(&token) {
            Err(AuthError::InvalidToken(_)) => {}
            other => panic!("Expected InvalidToken error, got {other:?}"),
        }
    }

    #[test]
    fn test_expired_token() {
        let middleware = AuthMiddleware::with_secret("test-secret");
        let token = create_test_token(&create_test_claims("7", -3600), "test-secret");

        match middleware.validate_token(&token) {
            Err(AuthError::TokenExpired) => {}
            other => panic!("Expected TokenExpired error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_secret_rejects_everything() {
        let middleware = AuthMiddleware::new(&AuthConfig::default());
        let token = create_test_token(&create_test_claims("7", 3600), "any");
        assert!(middleware.validate_token(&token).is_err());
    }

    #[test]
    fn test_context_from_header() {
        let middleware = AuthMiddleware::with_secret("s3cret");
        let token = create_test_token(&create_test_claims("12", 3600), "s3cret");

        let ctx = middleware
            .context_for(Some(&format!("Bearer {}", token)))
            .unwrap();
        assert_eq!(ctx.user_id(), Some(12));
        assert_eq!(ctx.token_roles(), ["user".to_string()]);

        assert!(matches!(
            middleware.context_for(None),
            Err(AuthError::MissingHeader)
        ));
        assert!(matches!(
            middleware.context_for(Some("Basic abc")),
            Err(AuthError::InvalidHeader)
        ));
    }

    #[test]
    fn test_non_numeric_subject_is_rejected() {
        let middleware = AuthMiddleware::with_secret("s3cret");
        let token = create_test_token(&create_test_claims("not-a-user", 3600), "s3cret");
        assert!(matches!(
            middleware.context_for(Some(&format!("Bearer {}", token))),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_issued_token_round_trips() {
        let issuer = TokenIssuer::new("s3cret", 600);
        let token = issuer.issue(&user(5), &["admin".to_string()]).unwrap();

        let claims = AuthMiddleware::with_secret("s3cret")
            .validate_token(&token)
            .unwrap();
        assert_eq!(claims.user_id(), Some(5));
        assert_eq!(claims.name.as_deref(), Some("Bea"));
        assert!(claims.has_role("admin"));
        assert_eq!(claims.exp - claims.iat, 600);
    }

    #[test]
    fn test_issuer_requires_secret() {
        assert!(TokenIssuer::from_config(&AuthConfig::default()).is_err());
    }
}
