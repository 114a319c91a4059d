use crate::config::CHAT_WITH_PARAM;
use crate::error::Result;
use leptos::window;
use wasm_bindgen::JsValue;

/// The one piece of state persisted in the page url: who the open
/// conversation is with.
pub trait Navigator {
    fn chat_with(&self) -> Option<String>;

    fn set_chat_with(&self, user_id: &str) -> Result<()>;
}

/// Reads and writes `?chat_with=` on the browser location.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserLocation;

impl Navigator for BrowserLocation {
    fn chat_with(&self) -> Option<String> {
        let search = window().location().search().ok()?;
        chat_with_from_search(&search)
    }

    fn set_chat_with(&self, user_id: &str) -> Result<()> {
        let window = window();
        let href = window.location().href()?;
        let url = with_chat_with(&href, user_id)?;
        window
            .history()?
            .push_state_with_url(&JsValue::NULL, "", Some(&url))?;
        Ok(())
    }
}

pub fn chat_with_from_search(search: &str) -> Option<String> {
    let url = url::Url::parse(&format!("http://someUrl.com{search}")).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == CHAT_WITH_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// `href` with its `chat_with` parameter set to `user_id`, other
/// parameters preserved.
pub fn with_chat_with(href: &str, user_id: &str) -> Result<String> {
    let mut url = url::Url::parse(href)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != CHAT_WITH_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(CHAT_WITH_PARAM, user_id);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_param() {
        assert_eq!(
            chat_with_from_search("?chat_with=abc-123"),
            Some("abc-123".to_string())
        );
        assert_eq!(
            chat_with_from_search("?theme=dark&chat_with=a%20b"),
            Some("a b".to_string())
        );
        assert_eq!(chat_with_from_search(""), None);
        assert_eq!(chat_with_from_search("?chat_with="), None);
    }

    #[test]
    fn test_write_param() {
        assert_eq!(
            with_chat_with("http://localhost:8080/", "abc").unwrap(),
            "http://localhost:8080/?chat_with=abc"
        );
        assert_eq!(
            with_chat_with("http://localhost:8080/?theme=dark&chat_with=old", "new").unwrap(),
            "http://localhost:8080/?theme=dark&chat_with=new"
        );
        let href = with_chat_with("http://localhost:8080/", "abc").unwrap();
        let search = &href[href.find('?').unwrap()..];
        assert_eq!(chat_with_from_search(search), Some("abc".to_string()));
    }
}
