//! Failures surfaced by the Livecoding.tv client.

use reqwest::StatusCode;

/// Errors returned by every fallible operation in this crate.
///
/// Each variant names the end-point that was being talked to, and the HTTP status
/// where one was received, so callers can tell which round trip went wrong.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request never produced a response (connection, TLS, body read, ...).
    #[error("request to {end_point} failed")]
    Transport {
        end_point: String,
        #[source]
        source: reqwest::Error,
    },

    /// A response body was not the JSON document we expected.
    #[error("malformed response from {end_point} (status {status})")]
    Parse {
        end_point: String,
        status: StatusCode,
        #[source]
        source: serde_json::Error,
    },

    /// The access token or the client credentials were rejected.
    ///
    /// Also used for any non-2xx status that is neither 401 nor 403.
    #[error("authentication failed with status {status}: {end_point}")]
    Authentication {
        end_point: String,
        status: StatusCode,
    },

    /// The token's scope does not cover the requested operation.
    #[error("not enough permissions (check the scope) for this operation: {end_point}")]
    Permission { end_point: String },

    /// A well-formed response lacked something we needed from it.
    #[error("{0}")]
    Domain(String),

    /// A configured URL (base URL or redirect URI) could not be parsed.
    #[error("invalid url")]
    InvalidUrl(#[from] oauth2::url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The HTTP status attached to this error, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Parse { status, .. } | Error::Authentication { status, .. } => Some(*status),
            Error::Permission { .. } => Some(StatusCode::FORBIDDEN),
            Error::Transport { source, .. } => source.status(),
            Error::Domain(_) | Error::InvalidUrl(_) => None,
        }
    }

    pub(crate) fn transport(end_point: &str, source: reqwest::Error) -> Self {
        Error::Transport {
            end_point: end_point.to_string(),
            source,
        }
    }

    pub(crate) fn parse(end_point: &str, status: StatusCode, source: serde_json::Error) -> Self {
        Error::Parse {
            end_point: end_point.to_string(),
            status,
            source,
        }
    }
}
