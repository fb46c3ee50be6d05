//! A client for the [Livecoding.tv](https://www.livecoding.tv) REST API.
//!
//! The crate handles the OAuth 2.0 authorization-code flow, keeps access tokens fresh, and makes
//! authenticated calls to any documented end-point. Payloads are handed back as
//! [`serde_json::Value`]; what a livestream or a user looks like is up to the API.
//!
//! Tokens are never stored anywhere by this crate. To reuse one across runs, persist
//! [`LctvToken::state`] and rebuild it with [`LctvToken::from_state`].
//!
//! ```rust,no_run
//! use livecodingtv_api::{LctvApp, get_viewing_key};
//! use std::sync::Arc;
//!
//! # async fn example(code: &str) -> livecodingtv_api::Result<()> {
//! let app = Arc::new(
//!     LctvApp::new("client-id", "client-secret", "https://example.com/callback")
//!         .with_scope("read read:user"),
//! );
//! let request = app.authorization_url()?;
//! // send the user to `request.url`, and get `code` back on the redirect URI
//! let mut token = app.exchange_code(code).await?;
//!
//! let catalog = app.discover_endpoints().await?;
//! let livestreams = token
//!     .call_operation(&catalog["/api/livestreams/"].end_point, &[("limit", "10")], false)
//!     .await?;
//! println!("{}", livestreams.body);
//!
//! let key = get_viewing_key(&mut token).await?;
//! # Ok(())
//! # }
//! ```

mod app;
mod error;
mod helpers;
mod response;
mod token;

pub use app::{
    AUTHORIZE_END_POINT, AuthorizationRequest, Endpoint, EndpointCatalog, LCTV_BASE_PATH,
    LCTV_DOC_END_POINT, LctvApp, TOKEN_END_POINT,
};
pub use error::{Error, Result};
pub use helpers::{
    Playable, VIEWING_KEY_END_POINT, build_playable_url, build_playable_urls, get_playable_urls,
    get_viewing_key,
};
pub use response::{OperationResponse, VALID_RESPONSE, check_response};
pub use token::{LctvToken, REFRESH_MARGIN, TokenState, TokenStatus};

pub mod reexport {
    pub use jiff;
    pub use oauth2;
}
