use crate::state::{Message, MessagePatch, NewMessage, PlaceholderId, Session, UnreadCount, User};
use std::collections::{HashMap, HashSet};

/// Lifecycle of a thread entry written by this client.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Shown optimistically, the insert has not answered yet.
    Pending(PlaceholderId),
    /// Authoritative row from the store.
    Confirmed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadEntry {
    pub message: Message,
    pub delivery: Delivery,
}

impl ThreadEntry {
    fn confirmed(message: Message) -> Self {
        Self {
            message,
            delivery: Delivery::Confirmed,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.delivery, Delivery::Pending(_))
    }

    fn has_placeholder(&self, placeholder: &PlaceholderId) -> bool {
        matches!(&self.delivery, Delivery::Pending(id) if id == placeholder)
    }
}

/// Follow-up work an event asks the caller to perform against the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    MarkMessageRead { message_id: String },
    TouchLastSeen { user_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub user: User,
    pub online: bool,
    pub unread: u32,
    pub selected: bool,
}

/// Client-side view of one signed-in session: roster, presence, unread
/// counters and the single open conversation.
///
/// Every realtime push and user action goes through here, async callers
/// only fetch and write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chat {
    session: Option<Session>,
    users: Vec<User>,
    receiver: Option<User>,
    thread: Vec<ThreadEntry>,
    unread: HashMap<String, u32>,
    online: HashSet<String>,
    draft: String,
}

impl Chat {
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(Session::user_id)
    }

    pub fn is_session(&self, user_id: &str) -> bool {
        self.session_id() == Some(user_id)
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn receiver(&self) -> Option<&User> {
        self.receiver.as_ref()
    }

    pub fn thread(&self) -> &[ThreadEntry] {
        &self.thread
    }

    pub fn unread(&self, user_id: &str) -> u32 {
        self.unread.get(user_id).copied().unwrap_or(0)
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online.contains(user_id)
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, draft: String) {
        self.draft = draft;
    }

    /// Replaces the session. Returns true when the signed-in identity
    /// changed, in which case all per-session state is dropped.
    pub fn set_session(&mut self, session: Option<Session>) -> bool {
        let changed = self.session_id() != session.as_ref().map(Session::user_id);
        if changed {
            *self = Self {
                session,
                ..Self::default()
            };
        } else {
            self.session = session;
        }
        changed
    }

    pub fn set_users(&mut self, users: Vec<User>) {
        self.users = users;
    }

    pub fn set_unread_counts(&mut self, counts: Vec<UnreadCount>) {
        self.unread = counts
            .into_iter()
            .map(|count| (count.sender_id, count.unread_count))
            .collect();
    }

    pub fn clear_unread(&mut self, user_id: &str) {
        self.unread.insert(user_id.to_string(), 0);
    }

    pub fn user_inserted(&mut self, user: User) {
        if self.is_session(&user.id) || self.users.iter().any(|u| u.id == user.id) {
            return;
        }
        self.users.push(user);
    }

    pub fn user_updated(&mut self, user: User) {
        if let Some(existing) = self.users.iter_mut().find(|u| u.id == user.id) {
            *existing = user.clone();
        }
        if let Some(receiver) = self.receiver.as_mut().filter(|r| r.id == user.id) {
            *receiver = user;
        }
    }

    /// Applies a realtime message insert.
    ///
    /// Rows of the open conversation are appended at most once, a repeated
    /// delivery is ignored. When this session is the recipient the row must
    /// be marked read right away, otherwise the sender's unread counter
    /// moves up by one.
    pub fn message_inserted(&mut self, message: Message) -> Option<Effect> {
        let me = self.session_id()?.to_string();
        let open = self
            .receiver
            .as_ref()
            .is_some_and(|receiver| message.is_between(&me, &receiver.id));

        if open {
            if self.thread.iter().any(|entry| entry.message.id == message.id) {
                return None;
            }
            let effect = (message.receiver_id == me).then(|| {
                self.clear_unread(&message.sender_id);
                Effect::MarkMessageRead {
                    message_id: message.id.clone(),
                }
            });
            self.thread.push(ThreadEntry::confirmed(message));
            effect
        } else {
            if message.receiver_id == me {
                *self.unread.entry(message.sender_id).or_default() += 1;
            }
            None
        }
    }

    /// Merges a pushed update into the thread entry with the same id.
    ///
    /// The row is not checked against the open conversation, so any
    /// message that happens to share an id in the current thread is
    /// overwritten.
    pub fn message_updated(&mut self, patch: MessagePatch) {
        let Some(id) = patch.id.clone() else {
            return;
        };
        for entry in self.thread.iter_mut().filter(|e| e.message.id == id) {
            entry.message.merge(patch.clone());
        }
    }

    pub fn presence_synced(&mut self, keys: Vec<String>) {
        self.online = keys.into_iter().collect();
    }

    pub fn presence_joined(&mut self, key: String) {
        self.online.insert(key);
    }

    pub fn presence_left(&mut self, key: &str) -> Effect {
        self.online.remove(key);
        Effect::TouchLastSeen {
            user_id: key.to_string(),
        }
    }

    /// Returns true when `user` was not the open receiver yet. Re-selecting
    /// the open conversation keeps its thread so a reload can merge into it.
    pub fn select(&mut self, user: User) -> bool {
        let switched = self.receiver.as_ref().map_or(true, |r| r.id != user.id);
        if switched {
            self.thread.clear();
        }
        self.receiver = Some(user);
        switched
    }

    /// Installs fetched history for `receiver_id`.
    ///
    /// Entries that arrived while the fetch was in flight (realtime pushes
    /// and pending sends) are kept after the history. A response for a
    /// conversation that is no longer open is dropped.
    pub fn conversation_loaded(&mut self, receiver_id: &str, history: Vec<Message>) -> bool {
        if self.receiver.as_ref().map(|r| r.id.as_str()) != Some(receiver_id) {
            return false;
        }
        let mut thread: Vec<ThreadEntry> = history.into_iter().map(ThreadEntry::confirmed).collect();
        for entry in self.thread.drain(..) {
            let known = thread.iter().any(|e| e.message.id == entry.message.id);
            if !known {
                thread.push(entry);
            }
        }
        self.thread = thread;
        true
    }

    /// First phase of a send: appends the optimistic entry under
    /// `placeholder` and clears the composer.
    ///
    /// Returns the row to persist, or `None` when there is nothing to send.
    pub fn begin_send(&mut self, placeholder: PlaceholderId, created_at: String) -> Option<NewMessage> {
        let content = self.draft.trim();
        if content.is_empty() {
            return None;
        }
        let sender_id = self.session_id()?.to_string();
        let receiver_id = self.receiver.as_ref()?.id.clone();
        let new = NewMessage {
            content: content.to_string(),
            sender_id,
            receiver_id,
        };
        self.thread.push(ThreadEntry {
            message: Message {
                id: placeholder.as_str().to_string(),
                content: new.content.clone(),
                sender_id: new.sender_id.clone(),
                receiver_id: new.receiver_id.clone(),
                created_at: Some(created_at),
                is_read: false,
                read_at: None,
            },
            delivery: Delivery::Pending(placeholder),
        });
        self.draft.clear();
        Some(new)
    }

    pub fn confirm_send(&mut self, placeholder: &PlaceholderId, saved: Message) {
        let Some(index) = self.thread.iter().position(|e| e.has_placeholder(placeholder)) else {
            return;
        };
        if self.thread.iter().any(|e| e.message.id == saved.id) {
            // A realtime push already delivered this row.
            self.thread.remove(index);
        } else {
            self.thread[index] = ThreadEntry::confirmed(saved);
        }
    }

    pub fn fail_send(&mut self, placeholder: &PlaceholderId, content: String) {
        self.thread.retain(|e| !e.has_placeholder(placeholder));
        self.draft = content;
    }

    pub fn roster(&self) -> Vec<RosterEntry> {
        let selected = self.receiver.as_ref().map(|r| r.id.as_str());
        self.users()
            .iter()
            .map(|user| RosterEntry {
                user: user.clone(),
                online: self.is_online(&user.id),
                unread: self.unread(&user.id),
                selected: selected == Some(user.id.as_str()),
            })
            .collect()
    }
}
