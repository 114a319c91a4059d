use crate::backend::{AuthEvent, Backend, PresenceEvent, RowChange, Subscription};
use crate::chat::{Chat, Effect};
use crate::location::Navigator;
use crate::state::{NewMessage, PlaceholderId, Session, User};
use chrono::Utc;
use futures::future::LocalBoxFuture;
use leptos::logging::{error, log, warn};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

pub type Spawner = Rc<dyn Fn(LocalBoxFuture<'static, ()>)>;

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Runs the chat against a backend.
///
/// All state sits in one shared [`Chat`] cell. Realtime handlers are
/// registered once per session and read the cell when they fire, so they
/// always see the conversation that is open now rather than the one that
/// was open when they subscribed.
pub struct Client<B, N> {
    backend: Rc<B>,
    location: Rc<N>,
    chat: Rc<RefCell<Chat>>,
    spawner: Spawner,
    notify: Rc<dyn Fn()>,
    auth: Rc<RefCell<Option<Subscription>>>,
    channels: Rc<RefCell<Vec<Subscription>>>,
}

impl<B, N> Clone for Client<B, N> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            location: self.location.clone(),
            chat: self.chat.clone(),
            spawner: self.spawner.clone(),
            notify: self.notify.clone(),
            auth: self.auth.clone(),
            channels: self.channels.clone(),
        }
    }
}

impl<B, N> Client<B, N>
where
    B: Backend + 'static,
    N: Navigator + 'static,
{
    /// `notify` is called after every state change.
    pub fn new(backend: Rc<B>, location: Rc<N>, spawner: Spawner, notify: Rc<dyn Fn()>) -> Self {
        Self {
            backend,
            location,
            chat: Rc::new(RefCell::new(Chat::default())),
            spawner,
            notify,
            auth: Rc::new(RefCell::new(None)),
            channels: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&Chat) -> R) -> R {
        f(&self.chat.borrow())
    }

    fn update<R>(&self, f: impl FnOnce(&mut Chat) -> R) -> R {
        let result = f(&mut self.chat.borrow_mut());
        (self.notify)();
        result
    }

    fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        (self.spawner)(Box::pin(future))
    }

    fn session_id(&self) -> Option<String> {
        self.with(|chat| chat.session_id().map(str::to_string))
    }

    /// Starts following the identity provider. Call once.
    pub fn start(&self) {
        let client = self.clone();
        let subscription = self
            .backend
            .on_auth_state_change(Box::new(move |event, session| {
                client.auth_changed(event, session)
            }));
        *self.auth.borrow_mut() = Some(subscription);
    }

    pub fn dispose(&self) {
        self.channels.borrow_mut().clear();
        self.auth.borrow_mut().take();
    }

    fn auth_changed(&self, event: AuthEvent, session: Option<Session>) {
        log!("Auth state {event:?}");
        if event == AuthEvent::SignedIn {
            if let Some(session) = &session {
                self.ensure_user_exists(session);
            }
        }
        if !self.update(|chat| chat.set_session(session)) {
            return;
        }
        let previous = std::mem::take(&mut *self.channels.borrow_mut());
        drop(previous);
        if let Some(me) = self.session_id() {
            self.open_session(me);
        }
    }

    fn ensure_user_exists(&self, session: &Session) {
        let user = User {
            id: session.user.id.clone(),
            email: session.user.email.clone(),
            last_seen: Some(now()),
        };
        let backend = self.backend.clone();
        self.spawn(async move {
            if let Err(err) = backend.upsert_user(&user).await {
                error!("Error saving user {}: {err}", user.id);
            }
        });
    }

    fn open_session(&self, me: String) {
        let client = self.clone();
        let presence = self
            .backend
            .subscribe_presence(&me, Box::new(move |event| client.presence_changed(event)));
        let client = self.clone();
        let changes = self
            .backend
            .subscribe_changes(Box::new(move |change| client.row_changed(change)));
        self.channels.borrow_mut().extend([presence, changes]);

        let client = self.clone();
        self.spawn(async move {
            client.load_roster(&me).await;
            client.restore_from_location(&me).await;
        });
    }

    async fn load_roster(&self, me: &str) {
        match self.backend.fetch_users_except(me).await {
            Ok(users) if self.with(|chat| chat.is_session(me)) => {
                self.update(|chat| chat.set_users(users))
            }
            Ok(_) => {}
            Err(err) => error!("Error fetching users: {err}"),
        }
        match self.backend.fetch_unread_counts(me).await {
            Ok(counts) if self.with(|chat| chat.is_session(me)) => {
                self.update(|chat| chat.set_unread_counts(counts))
            }
            Ok(_) => {}
            Err(err) => error!("Error fetching unread counts: {err}"),
        }
    }

    async fn restore_from_location(&self, me: &str) {
        let Some(receiver_id) = self.location.chat_with() else {
            return;
        };
        match self.backend.fetch_user(&receiver_id).await {
            Ok(Some(user)) if self.with(|chat| chat.is_session(me)) => self.select(user),
            Ok(Some(_)) => {}
            Ok(None) => warn!("No user {receiver_id} to resume a conversation with"),
            Err(err) => error!("Error fetching user {receiver_id}: {err}"),
        }
    }

    fn presence_changed(&self, event: PresenceEvent) {
        match event {
            PresenceEvent::Sync(keys) => self.update(|chat| chat.presence_synced(keys)),
            PresenceEvent::Join(key) => self.update(|chat| chat.presence_joined(key)),
            PresenceEvent::Leave(key) => {
                let effect = self.update(|chat| chat.presence_left(&key));
                self.run(effect);
            }
        }
    }

    fn row_changed(&self, change: RowChange) {
        match change {
            RowChange::UserInserted(user) => self.update(|chat| chat.user_inserted(user)),
            RowChange::UserUpdated(user) => self.update(|chat| chat.user_updated(user)),
            RowChange::MessageInserted(message) => {
                if let Some(effect) = self.update(|chat| chat.message_inserted(message)) {
                    self.run(effect);
                }
            }
            RowChange::MessageUpdated(patch) => self.update(|chat| chat.message_updated(patch)),
        }
    }

    fn run(&self, effect: Effect) {
        let backend = self.backend.clone();
        self.spawn(async move {
            let result = match &effect {
                Effect::MarkMessageRead { message_id } => {
                    backend.mark_message_read(message_id, &now()).await
                }
                Effect::TouchLastSeen { user_id } => backend.update_last_seen(user_id, &now()).await,
            };
            if let Err(err) = result {
                error!("Error running {effect:?}: {err}");
            }
        });
    }

    /// Opens the conversation with `user` and records it in the url.
    /// Selecting the open conversation again reloads its history.
    pub fn select(&self, user: User) {
        let Some(me) = self.session_id() else {
            return;
        };
        let receiver_id = user.id.clone();
        let switched = self.update(|chat| chat.select(user));
        if switched {
            if let Err(err) = self.location.set_chat_with(&receiver_id) {
                warn!("Could not record {receiver_id} in the url: {err}");
            }
        }
        let client = self.clone();
        self.spawn(async move { client.open_conversation(&me, &receiver_id).await });
    }

    async fn open_conversation(&self, me: &str, receiver_id: &str) {
        match self.backend.fetch_conversation(me, receiver_id).await {
            Ok(history) => {
                self.update(|chat| chat.conversation_loaded(receiver_id, history));
            }
            Err(err) => error!("Error fetching conversation: {err}"),
        }
        if let Err(err) = self
            .backend
            .mark_conversation_read(receiver_id, me, &now())
            .await
        {
            error!("Error marking conversation read: {err}");
        }
        if self.with(|chat| chat.is_session(me)) {
            self.update(|chat| chat.clear_unread(receiver_id));
        }
    }

    pub fn set_draft(&self, draft: String) {
        self.update(|chat| chat.set_draft(draft));
    }

    /// The message shows up immediately and is swapped for the stored row
    /// once the insert answers, or removed with the text put back if it
    /// fails.
    pub fn send(&self) {
        let placeholder = PlaceholderId::new();
        let Some(message) = self.update(|chat| chat.begin_send(placeholder.clone(), now())) else {
            return;
        };
        let client = self.clone();
        self.spawn(async move { client.deliver(placeholder, message).await });
    }

    async fn deliver(&self, placeholder: PlaceholderId, message: NewMessage) {
        match self.backend.insert_message(&message).await {
            Ok(saved) => self.update(|chat| chat.confirm_send(&placeholder, saved)),
            Err(err) => {
                error!("Error sending message: {err}");
                if self.with(|chat| chat.is_session(&message.sender_id)) {
                    self.update(|chat| chat.fail_send(&placeholder, message.content));
                }
            }
        }
    }

    pub fn sign_out(&self) {
        let backend = self.backend.clone();
        self.spawn(async move {
            if let Err(err) = backend.sign_out().await {
                error!("Error signing out: {err}");
            }
        });
    }
}
