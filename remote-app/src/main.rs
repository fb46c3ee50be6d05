//! Walks through the whole Livecoding.tv flow from the command line.
//!
//! ```text
//! lctv-remote-app [CONFIG] [END_POINT]
//! ```
//!
//! `CONFIG` defaults to `lctv-remote-app.json`. On first run the user is sent to Livecoding.tv to
//! authorize the application; the resulting token is kept in the configured tokens file and
//! reused (and refreshed as needed) on later runs.

use eyre::Context;
use livecodingtv_api::{
    LctvApp, LctvToken, Playable, TokenState, get_playable_urls, get_viewing_key,
};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

mod config;
mod redirect;

const DEFAULT_END_POINT: &str = "/api/v1/livestreams/onair/";

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_PATH));
    let end_point = args.next().unwrap_or_else(|| DEFAULT_END_POINT.to_string());

    let config = config::Config::load(&config_path).await?;
    let app = Arc::new(config.app());

    let mut token = match load_token(&app, &config.tokens_path).await? {
        Some(token) => token,
        None => {
            let token = authorize(&app).await?;
            save_token(&config.tokens_path, token.state()).await?;
            token
        }
    };
    tracing::debug!(status = ?token.status(), "token ready");

    let catalog = app
        .discover_endpoints()
        .await
        .context("discover available API operations")?;
    eprintln!("==> {} operations available", catalog.len());
    for endpoint in catalog.values() {
        eprintln!("  {}", endpoint.end_point);
    }

    let response = token
        .call_operation(&end_point, &[], false)
        .await
        .with_context(|| format!("call {end_point}"))?;
    eprintln!("==> {end_point} ({})", response.status);
    println!(
        "{}",
        serde_json::to_string_pretty(&response.body).context("render response")?
    );

    if response.is_success() {
        print_playable_urls(&mut token, &response.body).await;
    }

    save_token(&config.tokens_path, token.state()).await?;
    Ok(())
}

/// Sends the user to Livecoding.tv and trades the code we get back for a token.
async fn authorize(app: &Arc<LctvApp>) -> eyre::Result<LctvToken> {
    let request = app.authorization_url().context("build authorization url")?;
    let eventually_code = redirect::listen(app.redirect_uri(), request.state)
        .await
        .context("set up redirect listener")?;

    tracing::info!(url = %request.url, scope = request.scope.as_str(), "asking user to authorize");
    if let Err(e) = webbrowser::open(request.url.as_str()) {
        tracing::warn!(error = %e, "could not open browser");
        eprintln!("Open this URL to authorize lctv-remote-app:\n{}", request.url);
    }

    let code = eventually_code
        .await
        .context("await user authorization code")?;
    let token = app
        .exchange_code(&code)
        .await
        .context("exchange authorization code for access token")?;
    Ok(token)
}

async fn load_token(app: &Arc<LctvApp>, path: &Path) -> eyre::Result<Option<LctvToken>> {
    if !tokio::fs::try_exists(path)
        .await
        .with_context(|| format!("check for {}", path.display()))?
    {
        return Ok(None);
    }
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    let state: TokenState =
        serde_json::from_str(&raw).with_context(|| format!("parse token in {}", path.display()))?;
    Ok(Some(LctvToken::from_state(Arc::clone(app), state)))
}

async fn save_token(path: &Path, state: &TokenState) -> eyre::Result<()> {
    let json = serde_json::to_string_pretty(state).context("serialize token")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("write {}", path.display()))
}

/// Prints playable URLs for whatever in `body` can be played, if we're allowed to see the key.
async fn print_playable_urls(token: &mut LctvToken, body: &serde_json::Value) {
    let elements: Vec<&serde_json::Value> = match body.get("results").and_then(|r| r.as_array()) {
        Some(results) => results.iter().collect(),
        None => vec![body],
    };
    if !elements.iter().any(|element| element.viewing_urls().is_some()) {
        return;
    }

    let viewing_key = match get_viewing_key(token).await {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!(error = %e, "cannot build playable urls");
            return;
        }
    };
    for element in elements {
        if let Ok(urls) = get_playable_urls(element, &viewing_key) {
            for url in urls {
                println!("{url}");
            }
        }
    }
}
