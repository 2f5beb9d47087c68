//! Session authentication.
//!
//! # Flow
//! ```text
//! START → public route or outside protected prefix? ── yes → PASS
//!       → Authorization: Bearer <token>?            ── no  → REJECT(missing)
//!       → signature + expiry valid?                 ── no  → REJECT(invalid)
//!       → session record for subject exists?        ── no  → REJECT(no session)
//!       → stored token == presented token?          ── no  → REJECT(mismatch)
//!       → PASS(identity)
//! ```
//!
//! A store failure during the session lookup rejects the request: this check
//! is a security control and fails closed.

use std::fmt;
use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::config::AuthConfig;
use crate::error::GatewayError;
use crate::http::pipeline::{Decision, Stage, StageContext, StageFuture};
use crate::http::request::RequestView;
use crate::observability::metrics;
use crate::routing::{PathPrefixMatcher, PublicRoutes};
use crate::store::{session_key, SharedStore};

/// Subject id as found in credentials: issuers use numeric or string ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubjectId {
    Number(i64),
    Text(String),
}

impl From<&str> for SubjectId {
    /// Only canonical decimal integers become numbers, so `to_string` gives
    /// back exactly `raw` ("007" and "+5" stay text).
    fn from(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(n) if n.to_string() == raw => SubjectId::Number(n),
            _ => SubjectId::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectId::Number(n) => write!(f, "{n}"),
            SubjectId::Text(s) => f.write_str(s),
        }
    }
}

/// Signed claim set carried by a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: SubjectId,
    pub email: String,
    pub role: String,
    pub iat: u64,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Verified identity forwarded to backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl From<&Claims> for Identity {
    fn from(claims: &Claims) -> Self {
        Self {
            id: claims.id.to_string(),
            email: claims.email.clone(),
            role: claims.role.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Public route or gateway endpoint; no identity.
    Public,
    Authenticated(Identity),
}

/// Why a request was rejected. Every variant is a 401 to the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("No token provided")]
    MissingCredential,
    #[error("Invalid or expired token")]
    InvalidCredential,
    #[error("Session expired or logged out")]
    NoSession,
    #[error("Session invalidated: logged in elsewhere")]
    SessionMismatch,
    #[error("Unable to verify session")]
    StoreUnavailable,
}

impl AuthFailure {
    /// Stable label for logs and metrics.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::InvalidCredential => "invalid_credential",
            Self::NoSession => "no_session",
            Self::SessionMismatch => "session_mismatch",
            Self::StoreUnavailable => "store_unavailable",
        }
    }
}

pub struct SessionAuthenticator {
    store: Arc<dyn SharedStore>,
    decoding_key: DecodingKey,
    validation: Validation,
    public_routes: PublicRoutes,
    protected: PathPrefixMatcher,
    session_key_prefix: String,
}

impl SessionAuthenticator {
    pub fn new(store: Arc<dyn SharedStore>, config: &AuthConfig, public_routes: PublicRoutes) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            store,
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            public_routes,
            protected: PathPrefixMatcher::new(config.protected_prefix.as_str()),
            session_key_prefix: config.session_key_prefix.clone(),
        }
    }

    pub async fn authenticate(&self, request: &RequestView) -> Result<AuthOutcome, AuthFailure> {
        if self.public_routes.is_public(request.method(), request.path())
            || !self.protected.matches_path(request.path())
        {
            return Ok(AuthOutcome::Public);
        }

        let token = bearer_token(request).ok_or(AuthFailure::MissingCredential)?;

        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!(request_id = %request.request_id(), error = %e, "Credential rejected");
                AuthFailure::InvalidCredential
            })?
            .claims;

        let key = session_key(&self.session_key_prefix, &claims.id.to_string());
        let stored = self.store.get(&key).await.map_err(|e| {
            tracing::error!(
                request_id = %request.request_id(),
                subject = %claims.id,
                error = %e,
                "Session store error, failing closed"
            );
            metrics::record_store_error("auth");
            AuthFailure::StoreUnavailable
        })?;

        match stored {
            None => Err(AuthFailure::NoSession),
            Some(stored) if !bool::from(stored.as_bytes().ct_eq(token.as_bytes())) => {
                Err(AuthFailure::SessionMismatch)
            }
            Some(_) => Ok(AuthOutcome::Authenticated(Identity::from(&claims))),
        }
    }
}

fn bearer_token(request: &RequestView) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Second pipeline stage: sanitizes identity headers, then authenticates.
pub struct AuthStage {
    authenticator: SessionAuthenticator,
    expose_reason: bool,
}

impl AuthStage {
    pub fn new(authenticator: SessionAuthenticator, expose_reason: bool) -> Self {
        Self {
            authenticator,
            expose_reason,
        }
    }

    fn reject(&self, request: &RequestView, failure: AuthFailure) -> Decision {
        tracing::warn!(
            request_id = %request.request_id(),
            method = %request.method(),
            path = %request.path(),
            reason = failure.reason_code(),
            "Authentication failed"
        );
        metrics::record_auth_failure(failure.reason_code());

        let message = if self.expose_reason {
            failure.to_string()
        } else {
            "Unauthorized".to_string()
        };
        Decision::Respond(GatewayError::Unauthorized { message }.into_response())
    }
}

impl Stage for AuthStage {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn apply<'a>(&'a self, request: &'a RequestView, ctx: &'a mut StageContext) -> StageFuture<'a> {
        Box::pin(async move {
            ctx.forward.strip_identity();

            match self.authenticator.authenticate(request).await {
                Ok(AuthOutcome::Public) => Decision::Continue,
                Ok(AuthOutcome::Authenticated(identity)) => {
                    if ctx.forward.attach_identity(&identity).is_err() {
                        return self.reject(request, AuthFailure::InvalidCredential);
                    }
                    tracing::debug!(request_id = %request.request_id(), subject = %identity.id, "Authenticated");
                    ctx.identity = Some(identity);
                    Decision::Continue
                }
                Err(failure) => self.reject(request, failure),
            }
        })
    }
}
