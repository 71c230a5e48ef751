use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

/// Deployment topology, supplied at build or deploy time.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum HostingMode {
    /// A request-time server enforces the marker on protected paths.
    ServerTrust,
    /// Static hosting; nothing server-side ever validated the marker.
    NoServerTrust,
}

impl HostingMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServerTrust => "server-trust",
            Self::NoServerTrust => "no-server-trust",
        }
    }

    /// Hosting mode baked into a client build through `STUDIOGATE_HOSTING_MODE`.
    ///
    /// Unset or unknown values fall back to the stricter no-server-trust mode.
    #[must_use]
    pub fn from_build_env() -> Self {
        option_env!("STUDIOGATE_HOSTING_MODE")
            .and_then(|value| value.parse().ok())
            .unwrap_or(Self::NoServerTrust)
    }
}

impl fmt::Display for HostingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostingMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "server-trust" | "server" => Ok(Self::ServerTrust),
            "no-server-trust" | "static" => Ok(Self::NoServerTrust),
            other => Err(format!(
                "invalid hosting mode '{other}', expected 'server-trust' or 'no-server-trust'"
            )),
        }
    }
}

/// What the identity service said about the caller's session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExternalSession {
    Live,
    Absent,
    /// The service errored or was unreachable.
    Unavailable,
    /// The caller did not ask (the request-time guard never makes network calls).
    NotConsulted,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SessionEvidence {
    pub marker_present: bool,
    pub external: ExternalSession,
}

impl SessionEvidence {
    #[must_use]
    pub const fn marker_only(marker_present: bool) -> Self {
        Self {
            marker_present,
            external: ExternalSession::NotConsulted,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Decision {
    Authorized,
    Unauthorized,
}

impl Decision {
    #[must_use]
    pub const fn is_authorized(self) -> bool {
        matches!(self, Self::Authorized)
    }
}

/// Decide whether the evidence authorizes the operator under `mode`.
#[must_use]
pub fn authorize(mode: HostingMode, evidence: &SessionEvidence) -> Decision {
    let live = evidence.external == ExternalSession::Live;
    let authorized = match mode {
        HostingMode::NoServerTrust => live,
        HostingMode::ServerTrust => evidence.marker_present || live,
    };
    if authorized {
        Decision::Authorized
    } else {
        Decision::Unauthorized
    }
}
