//! Access tokens that know when they expire and how to refresh themselves.

use crate::app::{LctvApp, TOKEN_END_POINT};
use crate::error::{Error, Result};
use crate::response::{EmptyBody, OperationResponse, read_json};
use jiff::{SignedDuration, Timestamp};
use oauth2::{AccessToken, RefreshToken};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// A token is refreshed before use once it is this close to expiring.
pub const REFRESH_MARGIN: SignedDuration = SignedDuration::from_secs(60);

/// The JSON body returned by the token end-point.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenResponse {
    access_token: AccessToken,
    token_type: String,
    expires_in: i64,
    refresh_token: RefreshToken,
    scope: String,
}

/// Everything Livecoding.tv told us about a token, plus when it expires.
///
/// This is what a caller would persist to reuse a token across runs, and hand back to
/// [`LctvToken::from_state`] later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenState {
    pub access_token: AccessToken,
    pub token_type: String,
    /// Lifetime in seconds as reported when the token was minted or last refreshed.
    pub expires_in: i64,
    /// Moment of minting or last refresh, plus `expires_in`.
    pub expiration_time: Timestamp,
    pub refresh_token: RefreshToken,
    pub scope: String,
}

impl TokenState {
    /// Creates the state of a token that was minted just now with a lifetime of `expires_in`
    /// seconds.
    pub fn new(
        access_token: impl Into<String>,
        token_type: impl Into<String>,
        expires_in: i64,
        refresh_token: impl Into<String>,
        scope: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            access_token: AccessToken::new(access_token.into()),
            token_type: token_type.into(),
            expires_in,
            expiration_time: expires_from_now(expires_in)?,
            refresh_token: RefreshToken::new(refresh_token.into()),
            scope: scope.into(),
        })
    }

    fn from_response(response: TokenResponse) -> Result<Self> {
        Ok(Self {
            expiration_time: expires_from_now(response.expires_in)?,
            access_token: response.access_token,
            token_type: response.token_type,
            expires_in: response.expires_in,
            refresh_token: response.refresh_token,
            scope: response.scope,
        })
    }

    /// Time left until expiry; negative once expired.
    pub fn remaining(&self) -> SignedDuration {
        self.expiration_time.duration_since(Timestamp::now())
    }
}

fn expires_from_now(expires_in: i64) -> Result<Timestamp> {
    Timestamp::now()
        .checked_add(SignedDuration::from_secs(expires_in))
        .map_err(|_| Error::Domain(format!("token lifetime of {expires_in}s is out of range")))
}

/// Where a token stands relative to its expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// More than [`REFRESH_MARGIN`] left.
    Fresh,
    /// Not yet expired, but within [`REFRESH_MARGIN`] of it.
    NearExpiry,
    Expired,
}

/// An OAuth 2.0 token for a user of a [`LctvApp`].
///
/// API calls made through [`LctvToken::call_operation`] transparently refresh the token first
/// if it is within [`REFRESH_MARGIN`] of expiring.
///
/// Refreshing needs `&mut self`. If a token is shared between tasks, wrap it in a lock.
#[derive(Debug, Clone)]
pub struct LctvToken {
    app: Arc<LctvApp>,
    state: TokenState,
}

impl LctvToken {
    pub(crate) fn new(app: Arc<LctvApp>, response: TokenResponse) -> Result<Self> {
        Ok(Self {
            app,
            state: TokenState::from_response(response)?,
        })
    }

    /// Rebuilds a token from state the caller persisted earlier.
    pub fn from_state(app: Arc<LctvApp>, state: TokenState) -> Self {
        Self { app, state }
    }

    /// The application this token was issued to.
    pub fn app(&self) -> &Arc<LctvApp> {
        &self.app
    }

    /// Everything known about the token, for the caller to persist.
    pub fn state(&self) -> &TokenState {
        &self.state
    }

    /// Consumes the token and returns its state.
    ///
    /// This is useful to store the token once it is no longer needed in this process.
    pub fn into_state(self) -> TokenState {
        self.state
    }

    /// The current access token, as sent in the `Authorization` header.
    ///
    /// This may be stale; [`Self::call_operation`] refreshes it as needed.
    pub fn access_token(&self) -> &str {
        self.state.access_token.secret()
    }

    /// Where the token stands relative to its expiry right now.
    pub fn status(&self) -> TokenStatus {
        let remaining = self.state.remaining();
        if remaining <= SignedDuration::ZERO {
            TokenStatus::Expired
        } else if remaining < REFRESH_MARGIN {
            TokenStatus::NearExpiry
        } else {
            TokenStatus::Fresh
        }
    }

    /// Asks Livecoding.tv for a new access token using the refresh token.
    ///
    /// The state is swapped out in one go, so if anything goes wrong the token is left exactly
    /// as it was. The HTTP status of the refresh is not checked on its own: an error response
    /// fails to decode as a token and is reported as [`Error::Parse`] with its status.
    #[instrument(skip(self))]
    pub async fn refresh(&mut self) -> Result<()> {
        tracing::trace!("refreshing token");
        let response = self
            .app
            .token_request()
            .form(&[
                ("grant_type", "refresh_token"),
                ("access_token", self.state.access_token.secret().as_str()),
                ("refresh_token", self.state.refresh_token.secret().as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::transport(TOKEN_END_POINT, e))?;
        let (status, body) = read_json(TOKEN_END_POINT, response, EmptyBody::Reject).await?;

        let refreshed: TokenResponse =
            serde_json::from_value(body).map_err(|e| Error::parse(TOKEN_END_POINT, status, e))?;
        self.state = TokenState::from_response(refreshed)?;

        tracing::debug!(
            expires_in = self.state.expires_in,
            scope = self.state.scope.as_str(),
            "successfully refreshed token"
        );
        Ok(())
    }

    /// Calls an API operation with this token, refreshing it first if needed.
    ///
    /// The token is refreshed (once) if `force_refresh` is set or if it expires within
    /// [`REFRESH_MARGIN`]. Forcing is meant for debugging; it costs an extra round trip on every
    /// call.
    ///
    /// See [`LctvApp::call_operation`] for `end_point` and `params`. Non-2xx statuses are
    /// returned, not raised.
    #[instrument(skip(self))]
    pub async fn call_operation(
        &mut self,
        end_point: &str,
        params: &[(&str, &str)],
        force_refresh: bool,
    ) -> Result<OperationResponse> {
        if force_refresh {
            self.refresh().await?;
        } else if self.status() != TokenStatus::Fresh {
            tracing::debug!(status = ?self.status(), "access token about to expire");
            self.refresh().await?;
        }

        self.app
            .call_operation(end_point, self.access_token(), params)
            .await
    }

    /// A one-line rendering of the token, secrets included. For debugging only.
    ///
    /// `expires_in` shows the seconds remaining until expiry, rounded to the nearest second.
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LctvToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{access_token:{}, token_type:{}, expires_in:{},refresh_token:{},scope:{}}}",
            self.state.access_token.secret(),
            self.state.token_type,
            self.state.remaining().as_secs_f64().round() as i64,
            self.state.refresh_token.secret(),
            self.state.scope,
        )
    }
}
