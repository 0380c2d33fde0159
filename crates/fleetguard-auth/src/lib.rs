//! # fleetguard-auth
//!
//! Session engine for FleetGuard: signed credentials, durable session
//! records, the concurrent-session limit, and the token service that
//! ties them together.
//!
//! ## Modules
//!
//! - `jwt` — token claims, issuing and verification (HS256)
//! - `session` — session store trait, in-memory store, limit enforcement, token service
//! - `principal` — live account lookup used during validation
//! - `rbac` — stateless role-hierarchy predicate consumed by the HTTP layer
//! - `error` — authentication error taxonomy

pub mod error;
pub mod hash;
pub mod jwt;
pub mod principal;
pub mod rbac;
pub mod session;

pub use error::AuthError;
pub use jwt::{IssuedToken, TokenClaims, TokenKind, TokenSigner};
pub use principal::{MemoryPrincipalDirectory, PrincipalDirectory};
pub use rbac::RbacEnforcer;
pub use session::{
    LimitCheck, MemorySessionStore, SessionLimiter, SessionStore, TokenPair, TokenService,
};
