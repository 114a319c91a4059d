use crate::config::PLACEHOLDER_PREFIX;
use serde::{Deserialize, Deserializer, Serialize};

/// Signed-in actor, taken from the identity provider's session object.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Session {
    pub user: SessionUser,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: String,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

/// Roster row.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub last_seen: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Message {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub content: String,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub read_at: Option<String>,
}

impl Message {
    /// True when the row belongs to the conversation between `me` and `other`.
    pub fn is_between(&self, me: &str, other: &str) -> bool {
        (self.sender_id == me && self.receiver_id == other)
            || (self.sender_id == other && self.receiver_id == me)
    }

    pub fn merge(&mut self, patch: MessagePatch) {
        if let Some(id) = patch.id {
            self.id = id;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(sender_id) = patch.sender_id {
            self.sender_id = sender_id;
        }
        if let Some(receiver_id) = patch.receiver_id {
            self.receiver_id = receiver_id;
        }
        if let Some(created_at) = patch.created_at {
            self.created_at = created_at;
        }
        if let Some(is_read) = patch.is_read {
            self.is_read = is_read;
        }
        if let Some(read_at) = patch.read_at {
            self.read_at = read_at;
        }
    }
}

/// Partial message row as pushed by an update event. Absent columns are
/// left untouched on merge, an explicit null clears a nullable column.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessagePatch {
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub receiver_id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub created_at: Option<Option<String>>,
    #[serde(default)]
    pub is_read: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub read_at: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMessage {
    pub content: String,
    pub sender_id: String,
    pub receiver_id: String,
}

/// One row of the unread aggregate procedure.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnreadCount {
    pub sender_id: String,
    pub unread_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Client-generated id of a message that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaceholderId(String);

impl PlaceholderId {
    pub fn new() -> Self {
        Self(format!("{PLACEHOLDER_PREFIX}{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PlaceholderId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Int(i64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(value) => value,
            StringOrNumber::Int(value) => value.to_string(),
        }
    }
}

// Message ids may be bigint or uuid columns depending on the schema.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    StringOrNumber::deserialize(deserializer).map(String::from)
}

fn optional_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(String::from))
}

// Present field, possibly null. A missing field falls back to the default.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
