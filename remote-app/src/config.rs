use eyre::Context;
use livecodingtv_api::{LCTV_BASE_PATH, LctvApp};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub(crate) const DEFAULT_CONFIG_PATH: &str = "lctv-remote-app.json";

/// The application registered at <https://www.livecoding.tv/developer/applications/>.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    /// Must point at this machine, e.g. `http://127.0.0.1:8765/`, so we can catch the code.
    pub(crate) redirect_uri: String,
    #[serde(default = "default_scope")]
    pub(crate) scope: String,
    #[serde(default = "default_base_url")]
    pub(crate) base_url: String,
    #[serde(default = "default_tokens_path")]
    pub(crate) tokens_path: PathBuf,
}

fn default_scope() -> String {
    "read read:user".to_string()
}

fn default_base_url() -> String {
    LCTV_BASE_PATH.to_string()
}

fn default_tokens_path() -> PathBuf {
    PathBuf::from("tokens.json")
}

impl Config {
    pub(crate) async fn load(path: &Path) -> eyre::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read configuration from {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parse configuration in {}", path.display()))
    }

    fn parse(raw: &str) -> eyre::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub(crate) fn app(&self) -> LctvApp {
        LctvApp::new(&self.client_id, &self.client_secret, &self.redirect_uri)
            .with_scope(&self.scope)
            .with_base_url(&self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_filled_in() {
        let config = Config::parse(
            r#"{
                "client_id": "id",
                "client_secret": "secret",
                "redirect_uri": "http://127.0.0.1:8765/"
            }"#,
        )
        .unwrap();
        assert_eq!(config.scope, "read read:user");
        assert_eq!(config.base_url, LCTV_BASE_PATH);
        assert_eq!(config.tokens_path, PathBuf::from("tokens.json"));

        let app = config.app();
        assert_eq!(app.client_id(), "id");
        assert_eq!(app.scope(), "read read:user");
        assert_eq!(app.redirect_uri(), "http://127.0.0.1:8765/");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(
            Config::parse(
                r#"{
                    "client_id": "id",
                    "client_secret": "secret",
                    "redirect_uri": "http://127.0.0.1:8765/",
                    "secret": "typo"
                }"#,
            )
            .is_err()
        );
    }
}
