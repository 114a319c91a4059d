use crate::error::Result;
use crate::state::{Credentials, Message, MessagePatch, NewMessage, Session, UnreadCount, User};

/// Identity provider session transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
    Other,
}

impl AuthEvent {
    pub fn from_name(name: &str) -> Self {
        match name {
            "INITIAL_SESSION" => Self::InitialSession,
            "SIGNED_IN" => Self::SignedIn,
            "SIGNED_OUT" => Self::SignedOut,
            "TOKEN_REFRESHED" => Self::TokenRefreshed,
            "USER_UPDATED" => Self::UserUpdated,
            "PASSWORD_RECOVERY" => Self::PasswordRecovery,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresenceEvent {
    /// Full membership snapshot, keyed by user id.
    Sync(Vec<String>),
    Join(String),
    Leave(String),
}

/// Row-change notification carrying the new row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowChange {
    UserInserted(User),
    UserUpdated(User),
    MessageInserted(Message),
    MessageUpdated(MessagePatch),
}

pub type AuthHandler = Box<dyn Fn(AuthEvent, Option<Session>)>;
pub type PresenceHandler = Box<dyn Fn(PresenceEvent)>;
pub type ChangeHandler = Box<dyn Fn(RowChange)>;

/// Live subscription. Dropping it tears the underlying channel down.
#[must_use]
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(teardown: impl FnOnce() + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("live", &self.teardown.is_some())
            .finish()
    }
}

/// Everything the chat needs from the hosted backend: identity, the
/// `users`/`messages` tables, the unread aggregate and the two realtime
/// channels.
///
/// Futures are not `Send`, the client runs on the browser event loop.
#[allow(async_fn_in_trait)]
pub trait Backend {
    async fn sign_in(&self, credentials: &Credentials) -> Result<()>;

    async fn sign_up(&self, credentials: &Credentials) -> Result<()>;

    async fn sign_out(&self) -> Result<()>;

    fn on_auth_state_change(&self, handler: AuthHandler) -> Subscription;

    /// Create-or-update by primary key.
    async fn upsert_user(&self, user: &User) -> Result<()>;

    async fn update_last_seen(&self, user_id: &str, at: &str) -> Result<()>;

    async fn fetch_users_except(&self, user_id: &str) -> Result<Vec<User>>;

    async fn fetch_user(&self, user_id: &str) -> Result<Option<User>>;

    async fn fetch_unread_counts(&self, recipient_id: &str) -> Result<Vec<UnreadCount>>;

    /// Both directions between `me` and `other`, oldest first.
    async fn fetch_conversation(&self, me: &str, other: &str) -> Result<Vec<Message>>;

    /// Marks every unread message from `sender_id` to `receiver_id` as read.
    async fn mark_conversation_read(&self, sender_id: &str, receiver_id: &str, at: &str)
        -> Result<()>;

    async fn mark_message_read(&self, message_id: &str, at: &str) -> Result<()>;

    /// Persists the message and returns the authoritative row.
    async fn insert_message(&self, message: &NewMessage) -> Result<Message>;

    /// Joins the presence channel as `key` and tracks the caller as online.
    fn subscribe_presence(&self, key: &str, handler: PresenceHandler) -> Subscription;

    fn subscribe_changes(&self, handler: ChangeHandler) -> Subscription;
}
