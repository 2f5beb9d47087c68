//! Session issuing for the login/logout side.
//!
//! A login signs a credential and overwrites the subject's session record,
//! which makes any earlier credential for that subject unusable at the
//! gateway. A logout deletes the record. Both announce the change on the
//! session channel.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{EncodingKey, Header};
use serde_json::json;

use crate::config::AuthConfig;
use crate::security::auth::{Claims, Identity, SubjectId};
use crate::store::{session_key, SharedStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to sign credential: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A freshly issued credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    pub token: String,
    /// Expiry as seconds since the Unix epoch.
    pub expires_at: u64,
}

pub struct SessionIssuer {
    store: Arc<dyn SharedStore>,
    encoding_key: EncodingKey,
    ttl: Duration,
    key_prefix: String,
    channel: String,
}

impl SessionIssuer {
    pub fn new(store: Arc<dyn SharedStore>, config: &AuthConfig) -> Self {
        Self {
            store,
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            ttl: Duration::from_secs(config.session_ttl_secs),
            key_prefix: config.session_key_prefix.clone(),
            channel: config.session_channel.clone(),
        }
    }

    /// Sign a credential for `identity` without touching the store.
    pub fn sign(&self, identity: &Identity) -> Result<(String, Claims), SessionError> {
        let iat = unix_now();
        let claims = Claims {
            id: SubjectId::from(identity.id.as_str()),
            email: identity.email.clone(),
            role: identity.role.clone(),
            iat,
            exp: iat + self.ttl.as_secs(),
            jti: Some(uuid::Uuid::new_v4().to_string()),
        };
        let token = self.encode_claims(&claims)?;
        Ok((token, claims))
    }

    pub fn encode_claims(&self, claims: &Claims) -> Result<String, SessionError> {
        Ok(jsonwebtoken::encode(&Header::default(), claims, &self.encoding_key)?)
    }

    /// Issue a credential and make it the subject's only live session.
    pub async fn login(&self, identity: &Identity) -> Result<IssuedSession, SessionError> {
        let (token, claims) = self.sign(identity)?;
        // Keyed exactly as the authenticator derives it from the verified claims.
        let subject = claims.id.to_string();
        let key = session_key(&self.key_prefix, &subject);

        self.store.set_ex(&key, &token, self.ttl).await?;
        tracing::info!(subject = %subject, "Session created");
        self.announce("login", &subject).await;

        Ok(IssuedSession {
            token,
            expires_at: claims.exp,
        })
    }

    /// Delete the subject's session record. Returns whether one existed.
    pub async fn logout(&self, subject_id: &str) -> Result<bool, SessionError> {
        let subject = SubjectId::from(subject_id).to_string();
        let removed = self.store.del(&session_key(&self.key_prefix, &subject)).await?;
        tracing::info!(subject = %subject_id, removed, "Session revoked");
        self.announce("logout", subject_id).await;
        Ok(removed)
    }

    async fn announce(&self, event: &str, subject_id: &str) {
        let message = json!({ "event": event, "id": subject_id }).to_string();
        if let Err(e) = self.store.publish(&self.channel, &message).await {
            tracing::warn!(channel = %self.channel, event, error = %e, "Failed to publish session event");
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
