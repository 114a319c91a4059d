//! In-memory backend and location used by the tests.

use crate::backend::{
    AuthEvent, AuthHandler, Backend, ChangeHandler, PresenceEvent, PresenceHandler, RowChange,
    Subscription,
};
use crate::error::{Error, Result};
use crate::location::Navigator;
use crate::state::{
    Credentials, Message, NewMessage, Session, SessionUser, UnreadCount, User,
};
use chrono::Utc;
use futures::channel::oneshot;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub fn session(id: &str) -> Session {
    Session {
        user: SessionUser {
            id: id.to_string(),
            email: format!("{id}@example.com"),
        },
    }
}

pub fn user(id: &str) -> User {
    User {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        last_seen: None,
    }
}

struct Listeners<T: ?Sized> {
    next: Cell<usize>,
    slots: Rc<RefCell<Vec<(usize, Rc<T>)>>>,
}

impl<T: ?Sized> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            next: Cell::new(0),
            slots: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<T: ?Sized + 'static> Listeners<T> {
    fn add(&self, listener: Rc<T>) -> Subscription {
        let id = self.next.get();
        self.next.set(id + 1);
        self.slots.borrow_mut().push((id, listener));
        let slots = self.slots.clone();
        Subscription::new(move || slots.borrow_mut().retain(|(slot, _)| *slot != id))
    }

    /// Copy of the live listeners, so they can be called without holding
    /// the borrow.
    fn live(&self) -> Vec<Rc<T>> {
        self.slots.borrow().iter().map(|(_, l)| l.clone()).collect()
    }

    fn len(&self) -> usize {
        self.slots.borrow().len()
    }
}

#[derive(Default)]
pub struct FakeBackend {
    pub users: RefCell<Vec<User>>,
    pub messages: RefCell<Vec<Message>>,
    pub unread_counts: Vec<UnreadCount>,
    pub sign_in_error: Option<String>,
    pub fail_inserts: Cell<bool>,
    pub fail_fetches: Cell<bool>,
    next_id: Cell<usize>,
    read_marks: RefCell<Vec<String>>,
    upserts: RefCell<Vec<User>>,
    insert_gate: RefCell<Option<oneshot::Receiver<()>>>,
    auth: Listeners<dyn Fn(AuthEvent, Option<Session>)>,
    presence: Listeners<dyn Fn(PresenceEvent)>,
    changes: Listeners<dyn Fn(RowChange)>,
}

impl FakeBackend {
    pub fn with_users(ids: &[&str]) -> Self {
        Self {
            users: RefCell::new(ids.iter().map(|id| user(id)).collect()),
            ..Self::default()
        }
    }

    /// Same rows, no listeners: what a reloaded page would find.
    pub fn snapshot(&self) -> Self {
        Self {
            users: RefCell::new(self.users.borrow().clone()),
            messages: RefCell::new(self.messages.borrow().clone()),
            unread_counts: self.unread_counts.clone(),
            next_id: Cell::new(self.next_id.get()),
            ..Self::default()
        }
    }

    pub fn emit_auth(&self, event: AuthEvent, session: Option<Session>) {
        for listener in self.auth.live() {
            listener(event, session.clone());
        }
    }

    pub fn emit_presence(&self, event: PresenceEvent) {
        for listener in self.presence.live() {
            listener(event.clone());
        }
    }

    pub fn emit_change(&self, change: RowChange) {
        for listener in self.changes.live() {
            listener(change.clone());
        }
    }

    /// Persists `message` under a fresh id and returns the stored row.
    pub fn store(&self, mut message: Message) -> Message {
        let next = self.next_id.get() + 1;
        self.next_id.set(next);
        message.id = format!("m{next}");
        if message.created_at.is_none() {
            message.created_at = Some(Utc::now().to_rfc3339());
        }
        self.messages.borrow_mut().push(message.clone());
        message
    }

    pub fn stored_messages(&self) -> Vec<Message> {
        self.messages.borrow().clone()
    }

    pub fn last_message_id(&self) -> Option<String> {
        self.messages.borrow().last().map(|m| m.id.clone())
    }

    pub fn read_marks(&self) -> Vec<String> {
        self.read_marks.borrow().clone()
    }

    pub fn upserted(&self, id: &str) -> bool {
        self.upserts.borrow().iter().any(|u| u.id == id)
    }

    pub fn last_seen_of(&self, id: &str) -> Option<String> {
        self.users
            .borrow()
            .iter()
            .find(|u| u.id == id)
            .and_then(|u| u.last_seen.clone())
    }

    pub fn live_channels(&self) -> usize {
        self.presence.len() + self.changes.len()
    }

    pub fn auth_listeners(&self) -> usize {
        self.auth.len()
    }

    /// Makes the next insert wait until the returned sender fires. A
    /// successful insert stores the row before the wait.
    pub fn hold_inserts(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.insert_gate.borrow_mut() = Some(rx);
        tx
    }

    fn fetch_guard(&self) -> Result<()> {
        if self.fail_fetches.get() {
            return Err(Error::backend("Failed to fetch"));
        }
        Ok(())
    }
}

impl Backend for FakeBackend {
    async fn sign_in(&self, _credentials: &Credentials) -> Result<()> {
        match &self.sign_in_error {
            Some(message) => Err(Error::backend(message.clone())),
            None => Ok(()),
        }
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<()> {
        if self.users.borrow().iter().any(|u| u.email == credentials.email) {
            return Err(Error::backend("User already registered"));
        }
        Ok(())
    }

    async fn sign_out(&self) -> Result<()> {
        self.emit_auth(AuthEvent::SignedOut, None);
        Ok(())
    }

    fn on_auth_state_change(&self, handler: AuthHandler) -> Subscription {
        self.auth.add(Rc::from(handler))
    }

    async fn upsert_user(&self, user: &User) -> Result<()> {
        self.upserts.borrow_mut().push(user.clone());
        let mut users = self.users.borrow_mut();
        match users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => *existing = user.clone(),
            None => users.push(user.clone()),
        }
        Ok(())
    }

    async fn update_last_seen(&self, user_id: &str, at: &str) -> Result<()> {
        for user in self.users.borrow_mut().iter_mut().filter(|u| u.id == user_id) {
            user.last_seen = Some(at.to_string());
        }
        Ok(())
    }

    async fn fetch_users_except(&self, user_id: &str) -> Result<Vec<User>> {
        self.fetch_guard()?;
        Ok(self
            .users
            .borrow()
            .iter()
            .filter(|u| u.id != user_id)
            .cloned()
            .collect())
    }

    async fn fetch_user(&self, user_id: &str) -> Result<Option<User>> {
        self.fetch_guard()?;
        Ok(self.users.borrow().iter().find(|u| u.id == user_id).cloned())
    }

    async fn fetch_unread_counts(&self, _recipient_id: &str) -> Result<Vec<UnreadCount>> {
        self.fetch_guard()?;
        Ok(self.unread_counts.clone())
    }

    async fn fetch_conversation(&self, me: &str, other: &str) -> Result<Vec<Message>> {
        self.fetch_guard()?;
        let mut messages: Vec<Message> = self
            .messages
            .borrow()
            .iter()
            .filter(|m| m.is_between(me, other))
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn mark_conversation_read(
        &self,
        sender_id: &str,
        receiver_id: &str,
        at: &str,
    ) -> Result<()> {
        for message in self.messages.borrow_mut().iter_mut().filter(|m| {
            m.sender_id == sender_id && m.receiver_id == receiver_id && !m.is_read
        }) {
            message.is_read = true;
            message.read_at = Some(at.to_string());
        }
        Ok(())
    }

    async fn mark_message_read(&self, message_id: &str, at: &str) -> Result<()> {
        self.read_marks.borrow_mut().push(message_id.to_string());
        for message in self.messages.borrow_mut().iter_mut().filter(|m| m.id == message_id) {
            message.is_read = true;
            message.read_at = Some(at.to_string());
        }
        Ok(())
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message> {
        let gate = self.insert_gate.borrow_mut().take();
        if self.fail_inserts.get() {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            return Err(Error::backend("Failed to fetch"));
        }
        let saved = self.store(Message {
            id: String::new(),
            content: message.content.clone(),
            sender_id: message.sender_id.clone(),
            receiver_id: message.receiver_id.clone(),
            created_at: None,
            is_read: false,
            read_at: None,
        });
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(saved)
    }

    fn subscribe_presence(&self, _key: &str, handler: PresenceHandler) -> Subscription {
        self.presence.add(Rc::from(handler))
    }

    fn subscribe_changes(&self, handler: ChangeHandler) -> Subscription {
        self.changes.add(Rc::from(handler))
    }
}

#[derive(Debug, Default)]
pub struct FakeLocation {
    chat_with: RefCell<Option<String>>,
}

impl FakeLocation {
    pub fn at(chat_with: Option<String>) -> Self {
        Self {
            chat_with: RefCell::new(chat_with),
        }
    }

    pub fn current(&self) -> Option<String> {
        self.chat_with.borrow().clone()
    }
}

impl Navigator for FakeLocation {
    fn chat_with(&self) -> Option<String> {
        self.current()
    }

    fn set_chat_with(&self, user_id: &str) -> Result<()> {
        *self.chat_with.borrow_mut() = Some(user_id.to_string());
        Ok(())
    }
}
