//! Header sanitizing and the "headers to forward" builder.
//!
//! # Responsibilities
//! - Drop client-supplied identity headers before anything reads them
//! - Drop hop-by-hop headers
//! - Attach identity headers authored by the authenticator
//! - Add X-Forwarded-For, X-Forwarded-Host, X-Forwarded-Proto
//!
//! # Design Decisions
//! - Identity headers only ever come from [`ForwardHeaders::attach_identity`]
//! - Never trust existing X-Forwarded-* values; the gateway is the edge

use std::net::IpAddr;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue};

use crate::security::auth::Identity;

pub const IDENTITY_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const IDENTITY_EMAIL: HeaderName = HeaderName::from_static("x-user-email");
pub const IDENTITY_ROLE: HeaderName = HeaderName::from_static("x-user-role");

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

const IDENTITY_HEADERS: [HeaderName; 3] = [IDENTITY_ID, IDENTITY_EMAIL, IDENTITY_ROLE];

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Headers that will accompany the request to the backend.
#[derive(Debug, Clone, Default)]
pub struct ForwardHeaders {
    headers: HeaderMap,
}

impl ForwardHeaders {
    /// Copy the inbound headers, dropping identity and hop-by-hop headers.
    pub fn from_inbound(inbound: &HeaderMap) -> Self {
        let mut headers = inbound.clone();

        // Headers named in `Connection` are hop-by-hop too.
        let listed: Vec<HeaderName> = inbound
            .get_all(header::CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
            .collect();
        for name in listed.iter().chain(HOP_BY_HOP.iter()) {
            headers.remove(name);
        }

        let mut forward = Self { headers };
        forward.strip_identity();
        forward
    }

    /// Remove every identity header, whoever set it.
    pub fn strip_identity(&mut self) {
        for name in &IDENTITY_HEADERS {
            self.headers.remove(name);
        }
    }

    /// Attach the verified identity. On error nothing is attached.
    pub fn attach_identity(&mut self, identity: &Identity) -> Result<(), InvalidHeaderValue> {
        let id = HeaderValue::from_str(&identity.id)?;
        let email = HeaderValue::from_str(&identity.email)?;
        let role = HeaderValue::from_str(&identity.role)?;

        self.headers.insert(IDENTITY_ID, id);
        self.headers.insert(IDENTITY_EMAIL, email);
        self.headers.insert(IDENTITY_ROLE, role);
        Ok(())
    }

    /// Point the request at a backend: rewrite `Host` and set X-Forwarded-*.
    pub fn prepare_for_backend(&mut self, backend_authority: &str, client_ip: IpAddr) {
        if let Some(original_host) = self.headers.remove(header::HOST) {
            self.headers.insert(X_FORWARDED_HOST, original_host);
        }
        if let Ok(host) = HeaderValue::from_str(backend_authority) {
            self.headers.insert(header::HOST, host);
        }
        if let Ok(ip) = HeaderValue::from_str(&client_ip.to_string()) {
            self.headers.insert(X_FORWARDED_FOR, ip);
        }
        self.headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    }

    pub fn get(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    pub fn into_inner(self) -> HeaderMap {
        self.headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(IDENTITY_ID, HeaderValue::from_static("1"));
        headers.insert(IDENTITY_ROLE, HeaderValue::from_static("admin"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-debug"));
        headers.insert("x-debug", HeaderValue::from_static("1"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        headers.insert(header::HOST, HeaderValue::from_static("gateway.local"));
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("6.6.6.6"));
        headers
    }

    #[test]
    fn test_inbound_identity_and_hop_by_hop_dropped() {
        let forward = ForwardHeaders::from_inbound(&inbound());

        assert!(forward.get(&IDENTITY_ID).is_none());
        assert!(forward.get(&IDENTITY_ROLE).is_none());
        assert!(forward.get(&header::CONNECTION).is_none());
        assert!(forward.get(&header::UPGRADE).is_none());
        assert!(forward.get(&HeaderName::from_static("x-debug")).is_none());
        assert_eq!(forward.get(&header::AUTHORIZATION).unwrap(), "Bearer abc");
    }

    #[test]
    fn test_attach_identity() {
        let mut forward = ForwardHeaders::from_inbound(&inbound());
        let identity = Identity {
            id: "42".into(),
            email: "rider@example.com".into(),
            role: "rider".into(),
        };
        forward.attach_identity(&identity).unwrap();

        assert_eq!(forward.get(&IDENTITY_ID).unwrap(), "42");
        assert_eq!(forward.get(&IDENTITY_EMAIL).unwrap(), "rider@example.com");
        assert_eq!(forward.get(&IDENTITY_ROLE).unwrap(), "rider");
    }

    #[test]
    fn test_attach_rejects_unencodable_values() {
        let mut forward = ForwardHeaders::default();
        let identity = Identity {
            id: "42".into(),
            email: "bad\nvalue".into(),
            role: "rider".into(),
        };
        assert!(forward.attach_identity(&identity).is_err());
        assert!(forward.get(&IDENTITY_ID).is_none());
    }

    #[test]
    fn test_prepare_for_backend() {
        let mut forward = ForwardHeaders::from_inbound(&inbound());
        forward.prepare_for_backend("users:3001", "10.1.2.3".parse().unwrap());

        assert_eq!(forward.get(&header::HOST).unwrap(), "users:3001");
        assert_eq!(forward.get(&X_FORWARDED_HOST).unwrap(), "gateway.local");
        assert_eq!(forward.get(&X_FORWARDED_FOR).unwrap(), "10.1.2.3");
        assert_eq!(forward.get(&X_FORWARDED_PROTO).unwrap(), "http");
    }
}
