//! Playable stream URLs.
//!
//! Livecoding.tv only serves a stream to viewers that append their personal viewing key to the
//! stream's URL. The key itself is fetched with a token that has the `read:user` scope.

use crate::error::{Error, Result};
use crate::token::LctvToken;
use serde_json::Value;

/// Returns the viewing key of the token's user.
pub const VIEWING_KEY_END_POINT: &str = "/api/v1/user/viewing_key";

/// Anything that may carry a list of viewing URLs, such as a livestream or a video.
pub trait Playable {
    /// The element's viewing URLs, or `None` if it cannot be played.
    fn viewing_urls(&self) -> Option<Vec<&str>>;
}

impl Playable for Value {
    fn viewing_urls(&self) -> Option<Vec<&str>> {
        self.get("viewing_urls")?
            .as_array()?
            .iter()
            .map(Value::as_str)
            .collect()
    }
}

impl Playable for [String] {
    fn viewing_urls(&self) -> Option<Vec<&str>> {
        Some(self.iter().map(String::as_str).collect())
    }
}

/// Appends the viewing key to `url` as the `t` query parameter.
pub fn build_playable_url(url: &str, viewing_key: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}t={viewing_key}")
}

pub fn build_playable_urls<'a>(
    urls: impl IntoIterator<Item = &'a str>,
    viewing_key: &str,
) -> Vec<String> {
    urls.into_iter()
        .map(|url| build_playable_url(url, viewing_key))
        .collect()
}

/// Builds the playable URLs of an element, failing if it has no viewing URLs.
pub fn get_playable_urls<P>(element: &P, viewing_key: &str) -> Result<Vec<String>>
where
    P: Playable + ?Sized,
{
    let urls = element
        .viewing_urls()
        .ok_or_else(|| Error::Domain("not a playable element".to_string()))?;
    Ok(build_playable_urls(urls, viewing_key))
}

/// Fetches the viewing key of the user the token belongs to.
///
/// The token needs the `read:user` scope.
pub async fn get_viewing_key(token: &mut LctvToken) -> Result<String> {
    let response = token
        .call_operation(VIEWING_KEY_END_POINT, &[], false)
        .await?;

    let key = response
        .body
        .get("viewing_key")
        .and_then(Value::as_str)
        .filter(|_| response.is_success());
    match key {
        Some(key) => Ok(key.to_string()),
        None => {
            tracing::warn!(status = %response.status, "no viewing key in response");
            Err(Error::Domain(format!(
                "viewing_key not accessible ({}) or missing",
                response.status.as_u16()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn playable_url() {
        assert_eq!(
            build_playable_url("https://x/a", "K123"),
            "https://x/a?t=K123"
        );
    }

    #[test]
    fn playable_url_with_existing_query() {
        assert_eq!(
            build_playable_url("https://x/a?quality=hd", "K123"),
            "https://x/a?quality=hd&t=K123"
        );
    }

    #[test]
    fn playable_urls_are_built_per_element() {
        let element = json!({
            "slug": "someone",
            "viewing_urls": ["https://x/a", "https://x/b"],
        });
        assert_eq!(
            get_playable_urls(&element, "K123").unwrap(),
            vec!["https://x/a?t=K123", "https://x/b?t=K123"]
        );
    }

    #[test]
    fn slice_of_urls_is_playable() {
        let urls = vec!["https://x/a".to_string()];
        assert_eq!(
            get_playable_urls(urls.as_slice(), "K").unwrap(),
            vec!["https://x/a?t=K"]
        );
    }

    #[test]
    fn element_without_viewing_urls_is_not_playable() {
        for element in [
            json!({"slug": "someone"}),
            json!({"viewing_urls": "https://x/a"}),
            json!({"viewing_urls": [1, 2]}),
            json!(null),
        ] {
            let err = get_playable_urls(&element, "K123").unwrap_err();
            assert!(
                matches!(err, Error::Domain(ref msg) if msg == "not a playable element"),
                "{element} => {err:?}"
            );
        }
    }

    #[test]
    fn empty_viewing_urls_are_playable() {
        let element = json!({"viewing_urls": []});
        assert!(get_playable_urls(&element, "K").unwrap().is_empty());
    }
}
