//! Classification and decoding of Livecoding.tv HTTP responses.

use crate::error::{Error, Result};
use reqwest::StatusCode;
use serde_json::Value;

/// Message returned for any 2xx status.
pub const VALID_RESPONSE: &str = "Valid response from Livecoding.tv";

/// The outcome of a generic API operation.
///
/// The status is returned as-is; it is up to the caller to decide what a non-2xx status means
/// for them (see [`check_response`]).
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl OperationResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Matches the status of a response against what Livecoding.tv documents.
///
/// * 2xx: success, with an informational message.
/// * 401: the token or client credentials are invalid.
/// * 403: the token's scope does not allow this operation.
///
/// Any other status is reported as an [`Error::Authentication`] as well, since the API gives us
/// nothing better to go on.
pub fn check_response(end_point: &str, status: StatusCode) -> Result<&'static str> {
    if status.is_success() {
        tracing::info!(end_point, %status, "{VALID_RESPONSE}");
        return Ok(VALID_RESPONSE);
    }

    match status {
        StatusCode::UNAUTHORIZED => {
            tracing::error!(end_point, %status, "token or client credentials invalid");
        }
        StatusCode::FORBIDDEN => {
            tracing::error!(
                end_point,
                "not enough permissions (check the scope) for this operation"
            );
            return Err(Error::Permission {
                end_point: end_point.to_string(),
            });
        }
        _ => {
            tracing::error!(end_point, %status, "unexpected status from Livecoding.tv");
        }
    }

    Err(Error::Authentication {
        end_point: end_point.to_string(),
        status,
    })
}

/// What to make of a response that came back without a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EmptyBody {
    /// A JSON document was expected; no body is a parse error.
    Reject,
    /// No body decodes to [`Value::Null`], as for a `204 No Content` operation.
    Null,
}

/// Reads a response to completion and decodes its body as JSON.
///
/// The body is always decoded before anyone looks at the status.
pub(crate) async fn read_json(
    end_point: &str,
    response: reqwest::Response,
    empty: EmptyBody,
) -> Result<(StatusCode, Value)> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::transport(end_point, e))?;
    tracing::debug!(end_point, %status, "received response");

    if empty == EmptyBody::Null && bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok((status, Value::Null));
    }
    let body = serde_json::from_slice(&bytes).map_err(|e| Error::parse(end_point, status, e))?;
    Ok((status, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn every_2xx_is_valid() {
        for code in 200..300 {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(check_response("/api/x", status).unwrap(), VALID_RESPONSE);
        }
    }

    #[test]
    fn unauthorized_is_authentication_error() {
        let err = check_response("/o/token/", StatusCode::UNAUTHORIZED).unwrap_err();
        assert!(matches!(
            err,
            Error::Authentication { ref end_point, status }
                if end_point == "/o/token/" && status == StatusCode::UNAUTHORIZED
        ));
    }

    #[test]
    fn forbidden_is_permission_error() {
        let err = check_response("/api/v1/user/viewing_key", StatusCode::FORBIDDEN).unwrap_err();
        assert!(matches!(err, Error::Permission { .. }));
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
    }

    #[test]
    fn other_failures_fall_back_to_authentication_error() {
        for code in [100, 301, 400, 404, 418, 500, 503] {
            let status = StatusCode::from_u16(code).unwrap();
            let err = check_response("/api/x", status).unwrap_err();
            assert!(
                matches!(err, Error::Authentication { status: s, .. } if s == status),
                "{code} => {err:?}"
            );
        }
    }
}
