//! Session lifecycle: persistence, concurrent limits, and the token service.

pub mod limiter;
pub mod memory;
pub mod service;
pub mod store;

pub use limiter::{LimitCheck, SessionLimiter};
pub use memory::MemorySessionStore;
pub use service::{TokenPair, TokenService};
pub use store::SessionStore;
