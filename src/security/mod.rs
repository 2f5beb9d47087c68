//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (drop client-supplied identity and hop-by-hop headers)
//!     → rate_limit.rs (per-client fixed-window counter)
//!     → auth.rs (credential + session verification, identity injection)
//!     → Pass to dispatch
//!
//! Login / logout side:
//!     → session.rs (sign credential, write/delete session record)
//! ```
//!
//! # Design Decisions
//! - Throttling runs before any cryptographic or session work
//! - Rate limiting fails open; session verification fails closed
//! - No trust in client-supplied identity headers

pub mod auth;
pub mod headers;
pub mod rate_limit;
pub mod session;

pub use auth::{AuthFailure, AuthOutcome, AuthStage, Claims, Identity, SessionAuthenticator, SubjectId};
pub use headers::ForwardHeaders;
pub use rate_limit::{RateDecision, RateLimitStage, RateLimiter};
pub use session::{IssuedSession, SessionError, SessionIssuer};
