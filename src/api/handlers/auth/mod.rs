//! Auth handlers and supporting modules.
//!
//! This module coordinates login (static secret or identity service), the
//! `admin_session` marker, and login rate limiting.
//!
//! ## Login Rate Limiting
//!
//! Failed logins are tracked per client identifier (first `X-Forwarded-For` hop,
//! then `X-Real-IP`, then the peer address).
//!
//! - **Threshold:** 5 failures inside a 15-minute window that starts at the first
//!   failure. The sixth attempt is refused before credentials are checked.
//! - **Reset:** a successful login clears the record immediately.
//! - **Store errors:** fail closed; the attempt is reported as rate limited.
//!
//! > **Warning:** the in-memory store is per process and is lost on restart. Each
//! > instance behind a load balancer grants its own failure budget.

mod error;
pub(crate) mod login;
pub mod rate_limit;
pub(crate) mod session;
mod state;
pub(crate) mod types;
mod utils;
pub mod verification;

pub use error::AuthError;
pub use rate_limit::{AttemptStore, MemoryAttemptStore, RateLimitDecision, RateLimitPolicy};
pub use state::{AuthConfig, AuthState};
pub use verification::{Credential, CredentialVerifier, Strategy, Verification, VerifyError};
