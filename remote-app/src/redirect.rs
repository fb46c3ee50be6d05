//! A one-shot HTTP listener on the redirect URI that catches the authorization code.

use eyre::Context;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response, body};
use livecodingtv_api::reexport::oauth2::CsrfToken;
use livecodingtv_api::reexport::oauth2::url::Url;
use std::future::Future;

const AUTHORIZED_HTML: &str = "<html><body>\
    <h1>Authorized</h1><p>You can close this window and return to lctv-remote-app.</p>\
    </body></html>";

/// Listens on the host and port of `redirect_uri` for Livecoding.tv's redirect.
///
/// Returns once the socket is bound, so the user can be sent off to authorize afterwards; the
/// returned future resolves to the code once a redirect with the expected `state` arrives.
pub(crate) async fn listen(
    redirect_uri: &str,
    state: CsrfToken,
) -> eyre::Result<impl Future<Output = eyre::Result<String>>> {
    let url = Url::parse(redirect_uri).context("parse redirect uri")?;
    let host = url
        .host_str()
        .ok_or_else(|| eyre::eyre!("redirect uri {redirect_uri} has no host"))?
        .to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| eyre::eyre!("redirect uri {redirect_uri} has no port"))?;

    let socket = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("bind to {host}:{port}"))?;
    tracing::debug!(%host, port, "waiting for authorization redirect");

    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let r = async move {
            let (conn, _) = socket.accept().await.context("accept")?;
            let conn = hyper_util::rt::TokioIo::new(conn);
            let (got, mut gotten) = tokio::sync::mpsc::channel(1);
            let service = service_fn(move |req: Request<body::Incoming>| {
                let state = state.clone();
                let got = got.clone();
                async move {
                    let code = match extract_code(req.uri().query().unwrap_or(""), &state) {
                        Ok(code) => code,
                        Err(e) => return Err(e),
                    };
                    got.send(code)
                        .await
                        .expect("channel won't be closed until server exit");
                    Ok(Response::new(Full::<Bytes>::from(AUTHORIZED_HTML)))
                }
            });
            let mut serve = std::pin::pin!(
                hyper::server::conn::http1::Builder::new().serve_connection(conn, service)
            );

            tokio::select! {
                exit = &mut serve => {
                    if let Err(e) = exit {
                        Err(e).context("redirect listener got bad request")
                    } else {
                        eyre::bail!("redirect listener exited prematurely");
                    }
                }
                code = gotten.recv() => {
                    serve.as_mut().graceful_shutdown();
                    let _ = serve.await;
                    let code = code.expect("channel won't be closed until service_fn is dropped");
                    Ok(code)
                }
            }
        };
        let _ = tx.send(r.await);
    });

    Ok(async move { rx.await.context("redirect listener dropped prematurely")? })
}

/// Pulls the code out of the redirect's query string, checking the state we handed out.
fn extract_code(query: &str, expected_state: &CsrfToken) -> Result<String, &'static str> {
    let mut presented_state = None;
    let mut presented_code = None;
    for (k, v) in form_urlencoded::parse(query.as_bytes()) {
        match &*k {
            "state" => presented_state = Some(v),
            "code" => presented_code = Some(v),
            _ => {}
        }
    }
    if presented_state.as_deref() != Some(expected_state.secret().as_str()) {
        return Err("state does not match the authorization request");
    }
    presented_code
        .map(|code| code.into_owned())
        .ok_or("no authorization code found")
}
