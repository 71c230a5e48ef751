//! Authorization decision shared by the request-time guard and client views.
//!
//! Flow Overview:
//! 1) Collect [`SessionEvidence`]: the `admin_session` marker and, when the caller
//!    can consult it, the identity service session.
//! 2) Feed it to [`authorize`] together with the configured [`HostingMode`].
//! 3) Unauthorized callers are sent to the login path with a `next` parameter.
//!
//! Security boundaries: the marker carries no payload and is only trusted where a
//! request-time server enforced it (server-trust mode). Identity service errors
//! never authorize on their own.

mod decision;
pub mod guard;
pub mod marker;
mod redirect;

pub use decision::{authorize, Decision, ExternalSession, HostingMode, SessionEvidence};
pub use guard::{route_guard, GuardOutcome, ProtectedPaths, RouteGuard};
pub use redirect::LoginRoute;
