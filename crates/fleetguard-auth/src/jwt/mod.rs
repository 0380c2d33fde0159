//! Signed credential handling (HS256 compact tokens).

pub mod claims;
pub mod signer;

pub use claims::{TokenClaims, TokenKind};
pub use signer::{IssuedToken, TokenSigner};
