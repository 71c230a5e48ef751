//! API handlers for studiogate.
//!
//! `auth` owns login, logout, the session check and rate limiting; `health`
//! reports build metadata and store reachability.

pub mod auth;
pub mod health;
