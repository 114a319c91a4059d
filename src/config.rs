use crate::error::{Error, Result};

static SUPABASE_URL: Option<&'static str> = option_env!("SUPABASE_URL");
static SUPABASE_ANON_KEY: Option<&'static str> = option_env!("SUPABASE_ANON_KEY");

pub const USERS_TABLE: &str = "users";
pub const MESSAGES_TABLE: &str = "messages";
pub const UNREAD_COUNTS_PROCEDURE: &str = "get_unread_counts";
pub const PRESENCE_CHANNEL: &str = "online-users";
pub const CHANGES_CHANNEL: &str = "realtime-changes";
pub const CHAT_WITH_PARAM: &str = "chat_with";
pub const PLACEHOLDER_PREFIX: &str = "temp-";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub url: String,
    pub anon_key: String,
}

impl Config {
    /// Reads the project url and anon key baked in at build time.
    pub fn from_env() -> Result<Self> {
        Self::from_values(SUPABASE_URL, SUPABASE_ANON_KEY)
    }

    fn from_values(url: Option<&str>, anon_key: Option<&str>) -> Result<Self> {
        let url = url
            .filter(|url| !url.is_empty())
            .ok_or(Error::MissingConfig("SUPABASE_URL"))?;
        let anon_key = anon_key
            .filter(|key| !key.is_empty())
            .ok_or(Error::MissingConfig("SUPABASE_ANON_KEY"))?;
        url::Url::parse(url)?;
        Ok(Self {
            url: url.to_string(),
            anon_key: anon_key.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_values() {
        assert_eq!(
            Config::from_values(None, Some("key")),
            Err(Error::MissingConfig("SUPABASE_URL"))
        );
        assert_eq!(
            Config::from_values(Some("https://abc.supabase.co"), Some("")),
            Err(Error::MissingConfig("SUPABASE_ANON_KEY"))
        );
    }

    #[test]
    fn test_valid_values() {
        let config = Config::from_values(Some("https://abc.supabase.co"), Some("anon")).unwrap();
        assert_eq!(config.url, "https://abc.supabase.co");
        assert_eq!(config.anon_key, "anon");
        assert!(matches!(
            Config::from_values(Some("not a url"), Some("anon")),
            Err(Error::Url(_))
        ));
    }
}
