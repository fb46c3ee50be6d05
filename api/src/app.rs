//! The registered Livecoding.tv application and the OAuth 2.0 steps that only need its
//! credentials.
//!
//! The authorization-code flow looks like this from the caller's side:
//!
//! 1. `let request = app.authorization_url()?;` and send the user to `request.url`, remembering
//!    `request.state` somewhere.
//! 2. Livecoding.tv redirects the user to the application's redirect URI with `code` and `state`
//!    query parameters. The caller checks that `state` matches what it remembered.
//! 3. `let token = app.exchange_code(&code).await?;`
//! 4. `let catalog = app.discover_endpoints().await?;` and
//!    `token.call_operation(&catalog["/api/livestreams/"].end_point, &[], false).await?;`

use crate::error::{Error, Result};
use crate::response::{EmptyBody, OperationResponse, check_response, read_json};
use crate::token::{LctvToken, TokenResponse};
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

/// Where Livecoding.tv lives.
pub const LCTV_BASE_PATH: &str = "https://www.livecoding.tv";

/// Self-describing documentation of every available API operation.
pub const LCTV_DOC_END_POINT: &str = "/developer/documentation/api-docs/api/v1";

/// Users are sent here to grant the application access.
pub const AUTHORIZE_END_POINT: &str = "/o/authorize/";

/// Used both to exchange authorization codes and to refresh tokens.
pub const TOKEN_END_POINT: &str = "/o/token/";

/// Available API operations, keyed by their (brace-escaped) path template.
pub type EndpointCatalog = BTreeMap<String, Endpoint>;

/// One operation advertised by the API documentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Human-readable name, the path with `/` turned into spaces.
    pub name: String,
    /// Path template to pass to `call_operation`, with `{` and `}` doubled.
    pub end_point: String,
}

impl Endpoint {
    fn from_path(path: &str) -> Self {
        Self {
            name: escape_braces(&path.replace('/', " ")),
            end_point: escape_braces(path),
        }
    }
}

fn escape_braces(s: &str) -> String {
    s.replace('{', "{{").replace('}', "}}")
}

#[derive(Debug, Deserialize)]
struct ApiDocumentation {
    apis: Vec<ApiDescription>,
}

#[derive(Debug, Deserialize)]
struct ApiDescription {
    path: String,
}

/// The first step of the authorization-code flow.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Random value that Livecoding.tv will hand back alongside the code.
    ///
    /// It is the caller's job to remember it and compare it against the `state` the redirect
    /// carries, to rule out forged redirects.
    pub state: CsrfToken,
    /// The scope that was requested.
    pub scope: String,
    /// Where to send the user.
    pub url: oauth2::url::Url,
}

/// A Livecoding.tv application: the credentials it was registered with and the HTTP client used
/// to talk to the API on its behalf.
///
/// Tokens minted by [`LctvApp::exchange_code`] keep an [`Arc`] to the application that minted
/// them so they can refresh themselves.
#[derive(Debug, Clone)]
pub struct LctvApp {
    client_id: ClientId,
    client_secret: ClientSecret,
    redirect_uri: String,
    scope: String,
    grant_type: String,
    base_url: String,
    http: reqwest::Client,
}

impl LctvApp {
    /// Describes an application with the default `read` scope and `authorization_code` grant.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built with the default configuration (should never
    /// happen in practice).
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        let http = reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("building reqwest client should not fail");
        Self {
            client_id: ClientId::new(client_id.into()),
            client_secret: ClientSecret::new(client_secret.into()),
            redirect_uri: redirect_uri.into(),
            scope: "read".to_string(),
            grant_type: "authorization_code".to_string(),
            base_url: LCTV_BASE_PATH.to_string(),
            http,
        }
    }

    /// Space-separated scopes to request, e.g. `"read read:user"`.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Grant type sent when exchanging an authorization code.
    ///
    /// Livecoding.tv only knows `authorization_code`, which is the default.
    pub fn with_grant_type(mut self, grant_type: impl Into<String>) -> Self {
        self.grant_type = grant_type.into();
        self
    }

    /// Talk to a different host than [`LCTV_BASE_PATH`].
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Uses `http` for every request instead of the default client.
    ///
    /// The default client does not follow redirects; a replacement should probably not either.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// The client ID the application was registered with.
    pub fn client_id(&self) -> &str {
        self.client_id.as_str()
    }

    /// Where Livecoding.tv sends the user back to with the authorization code.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// The space-separated scopes requested in [`Self::authorization_url`].
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Grant type used by [`Self::exchange_code`].
    pub fn grant_type(&self) -> &str {
        &self.grant_type
    }

    /// Scheme and host every end-point is resolved against, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, end_point: &str) -> String {
        format!("{}{}", self.base_url, end_point)
    }

    /// A POST to the token end-point, authenticated with the client credentials.
    pub(crate) fn token_request(&self) -> reqwest::RequestBuilder {
        self.http
            .post(self.url(TOKEN_END_POINT))
            .basic_auth(self.client_id.as_str(), Some(self.client_secret.secret()))
    }

    /// Builds the URL the user must visit to authorize this application.
    ///
    /// A new random `state` is generated on every call. The `scope` parameter is always present,
    /// even if empty.
    ///
    /// # Returns
    ///
    /// An [`AuthorizationRequest`] with the state to remember, the requested scope, and the URL.
    /// Fails with [`Error::InvalidUrl`] if the base URL or redirect URI does not parse.
    pub fn authorization_url(&self) -> Result<AuthorizationRequest> {
        let client = BasicClient::new(self.client_id.clone())
            .set_auth_uri(AuthUrl::new(self.url(AUTHORIZE_END_POINT))?)
            .set_redirect_uri(RedirectUrl::new(self.redirect_uri.clone())?);

        let scopes: Vec<_> = self
            .scope
            .split_whitespace()
            .map(|scope| Scope::new(scope.to_string()))
            .collect();
        let mut request = client.authorize_url(CsrfToken::new_random);
        if scopes.is_empty() {
            // oauth2 leaves out an empty scope list altogether
            request = request.add_extra_param("scope", "");
        } else {
            request = request.add_scopes(scopes);
        }
        let (url, state) = request.url();

        tracing::debug!(%url, "built authorization url");
        Ok(AuthorizationRequest {
            state,
            scope: self.scope.clone(),
            url,
        })
    }

    /// Fetches the API documentation and lists the operations it advertises.
    ///
    /// Nothing is cached; every call hits the network.
    #[instrument(skip(self))]
    pub async fn discover_endpoints(&self) -> Result<EndpointCatalog> {
        let response = self
            .http
            .get(self.url(LCTV_DOC_END_POINT))
            .send()
            .await
            .map_err(|e| Error::transport(LCTV_DOC_END_POINT, e))?;
        let (status, body) = read_json(LCTV_DOC_END_POINT, response, EmptyBody::Reject).await?;

        let docs: ApiDocumentation = serde_json::from_value(body)
            .map_err(|e| Error::parse(LCTV_DOC_END_POINT, status, e))?;

        let catalog: EndpointCatalog = docs
            .apis
            .iter()
            .map(|api| {
                let endpoint = Endpoint::from_path(&api.path);
                (endpoint.end_point.clone(), endpoint)
            })
            .collect();
        tracing::debug!(operations = catalog.len(), "discovered API operations");
        Ok(catalog)
    }

    /// Exchanges the authorization code handed to the redirect URI for an access token.
    ///
    /// The body is decoded before the status is looked at, so an error response that isn't JSON
    /// surfaces as [`Error::Parse`] rather than as an authentication error.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(self: &Arc<Self>, code: &str) -> Result<LctvToken> {
        let response = self
            .token_request()
            .form(&[
                ("grant_type", self.grant_type.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::transport(TOKEN_END_POINT, e))?;
        let (status, body) = read_json(TOKEN_END_POINT, response, EmptyBody::Reject).await?;

        check_response(TOKEN_END_POINT, status)?;

        let token: TokenResponse =
            serde_json::from_value(body).map_err(|e| Error::parse(TOKEN_END_POINT, status, e))?;
        LctvToken::new(Arc::clone(self), token)
    }

    /// Calls an API operation with an explicit access token.
    ///
    /// `end_point` is any operation from <https://www.livecoding.tv/developer/documentation/>,
    /// and `params` are passed through as the query string. Livecoding.tv understands, among
    /// others:
    ///
    /// * searching: `search=russell`
    /// * filtering: `coding__name=python`
    /// * ordering: `ordering=-title`
    /// * format: `format=json`
    /// * pagination: `offset=200&limit=100`
    ///
    /// Non-2xx statuses are returned, not raised. Most callers want
    /// [`LctvToken::call_operation`] instead, which keeps the token fresh.
    #[instrument(skip(self, access_token))]
    pub async fn call_operation(
        &self,
        end_point: &str,
        access_token: &str,
        params: &[(&str, &str)],
    ) -> Result<OperationResponse> {
        let response = self
            .http
            .get(self.url(end_point))
            .query(params)
            .header(reqwest::header::AUTHORIZATION, format!("bearer {access_token}"))
            .send()
            .await
            .map_err(|e| Error::transport(end_point, e))?;
        let (status, body) = read_json(end_point, response, EmptyBody::Null).await?;
        Ok(OperationResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn app() -> LctvApp {
        LctvApp::new("my-client", "my-secret", "https://example.com/callback")
    }

    #[test]
    fn endpoint_from_path_escapes_braces() {
        assert_eq!(
            Endpoint::from_path("/api/livestreams/{id}"),
            Endpoint {
                name: " api livestreams {{id}}".to_string(),
                end_point: "/api/livestreams/{{id}}".to_string(),
            }
        );
        assert_eq!(
            Endpoint::from_path("/api/user/"),
            Endpoint {
                name: " api user ".to_string(),
                end_point: "/api/user/".to_string(),
            }
        );
    }

    #[test]
    fn defaults() {
        let app = app();
        assert_eq!(app.scope(), "read");
        assert_eq!(app.grant_type(), "authorization_code");
        assert_eq!(app.base_url(), LCTV_BASE_PATH);
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let app = app().with_base_url("http://127.0.0.1:8080/");
        assert_eq!(app.url(TOKEN_END_POINT), "http://127.0.0.1:8080/o/token/");
    }

    #[test]
    fn authorization_url_carries_flow_parameters() {
        let app = app().with_scope("read read:user");
        let request = app.authorization_url().unwrap();

        assert_eq!(request.scope, "read read:user");
        assert_eq!(
            &request.url.as_str()[..request.url.as_str().find('?').unwrap()],
            "https://www.livecoding.tv/o/authorize/"
        );
        let query: HashMap<_, _> = request.url.query_pairs().into_owned().collect();
        assert_eq!(query["client_id"], "my-client");
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["redirect_uri"], "https://example.com/callback");
        assert_eq!(query["scope"], "read read:user");
        assert_eq!(&query["state"], request.state.secret());
    }

    #[test]
    fn authorization_url_keeps_empty_scope() {
        let request = app().with_scope("").authorization_url().unwrap();
        let scopes: Vec<_> = request
            .url
            .query_pairs()
            .filter(|(k, _)| k == "scope")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(scopes, vec![String::new()]);
        assert_eq!(request.scope, "");
    }

    #[test]
    fn authorization_url_state_is_fresh_every_time() {
        let app = app();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            let request = app.authorization_url().unwrap();
            assert!(seen.insert(request.state.secret().clone()));
        }
    }

    #[test]
    fn authorization_url_rejects_relative_redirect() {
        let app = LctvApp::new("id", "secret", "/callback");
        assert!(matches!(
            app.authorization_url().unwrap_err(),
            Error::InvalidUrl(_)
        ));
    }
}
