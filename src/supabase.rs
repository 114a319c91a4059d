use crate::backend::{
    AuthEvent, AuthHandler, Backend, ChangeHandler, PresenceEvent, PresenceHandler, RowChange,
    Subscription,
};
use crate::config::{
    Config, CHANGES_CHANNEL, MESSAGES_TABLE, PRESENCE_CHANNEL, UNREAD_COUNTS_PROCEDURE,
    USERS_TABLE,
};
use crate::error::{Error, Result};
use crate::state::{Credentials, Message, MessagePatch, NewMessage, Session, UnreadCount, User};
use chrono::Utc;
use js_sys::{Function, Object, Promise, Reflect};
use leptos::logging::{error, log};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};

const MESSAGE_COLUMNS: &str = "id, content, sender_id, receiver_id, created_at, is_read, read_at";
const USER_COLUMNS: &str = "id, email, last_seen";

#[wasm_bindgen]
extern "C" {
    #[derive(Debug, Clone)]
    type Client;

    #[wasm_bindgen(catch, js_namespace = ["window", "supabase"], js_name = createClient)]
    fn create_client(url: &str, key: &str) -> std::result::Result<Client, JsValue>;

    #[wasm_bindgen(method, getter)]
    fn auth(this: &Client) -> Auth;

    #[wasm_bindgen(method)]
    fn from(this: &Client, table: &str) -> Query;

    #[wasm_bindgen(method)]
    fn rpc(this: &Client, procedure: &str, args: &JsValue) -> Query;

    #[wasm_bindgen(method)]
    fn channel(this: &Client, name: &str, options: &JsValue) -> Channel;

    #[wasm_bindgen(method, js_name = removeChannel)]
    fn remove_channel(this: &Client, channel: &Channel) -> Promise;

    #[wasm_bindgen(method, js_name = removeAllChannels)]
    fn remove_all_channels(this: &Client) -> Promise;

    type Auth;

    #[wasm_bindgen(method, js_name = signInWithPassword)]
    fn sign_in_with_password(this: &Auth, credentials: &JsValue) -> Promise;

    #[wasm_bindgen(method, js_name = signUp)]
    fn sign_up(this: &Auth, credentials: &JsValue) -> Promise;

    #[wasm_bindgen(method, js_name = signOut)]
    fn sign_out(this: &Auth) -> Promise;

    #[wasm_bindgen(method, js_name = onAuthStateChange)]
    fn on_auth_state_change(this: &Auth, callback: &Closure<dyn FnMut(String, JsValue)>) -> JsValue;

    // Query builders are thenables, they run when awaited.
    type Query;

    #[wasm_bindgen(method)]
    fn select(this: &Query, columns: &str) -> Query;

    #[wasm_bindgen(method)]
    fn insert(this: &Query, values: &JsValue) -> Query;

    #[wasm_bindgen(method)]
    fn update(this: &Query, values: &JsValue) -> Query;

    #[wasm_bindgen(method)]
    fn upsert(this: &Query, values: &JsValue, options: &JsValue) -> Query;

    #[wasm_bindgen(method)]
    fn eq(this: &Query, column: &str, value: &JsValue) -> Query;

    #[wasm_bindgen(method)]
    fn neq(this: &Query, column: &str, value: &JsValue) -> Query;

    #[wasm_bindgen(method)]
    fn or(this: &Query, filters: &str) -> Query;

    #[wasm_bindgen(method)]
    fn order(this: &Query, column: &str, options: &JsValue) -> Query;

    #[wasm_bindgen(method)]
    fn single(this: &Query) -> Query;

    #[wasm_bindgen(method, js_name = maybeSingle)]
    fn maybe_single(this: &Query) -> Query;

    #[derive(Debug, Clone)]
    type Channel;

    #[wasm_bindgen(method)]
    fn on(
        this: &Channel,
        kind: &str,
        filter: &JsValue,
        callback: &Closure<dyn FnMut(JsValue)>,
    ) -> Channel;

    #[wasm_bindgen(method)]
    fn subscribe(this: &Channel, callback: &Closure<dyn FnMut(JsValue)>) -> Channel;

    #[wasm_bindgen(method)]
    fn track(this: &Channel, payload: &JsValue) -> Promise;

    #[wasm_bindgen(method, js_name = presenceState)]
    fn presence_state(this: &Channel) -> JsValue;
}

#[derive(Serialize)]
struct ChannelOptions<'a> {
    config: ChannelConfig<'a>,
}

#[derive(Serialize)]
struct ChannelConfig<'a> {
    presence: PresenceConfig<'a>,
}

#[derive(Serialize)]
struct PresenceConfig<'a> {
    key: &'a str,
}

#[derive(Serialize)]
struct ChangeFilter<'a> {
    event: &'a str,
    schema: &'a str,
    table: &'a str,
}

#[derive(Serialize)]
struct EventFilter<'a> {
    event: &'a str,
}

#[derive(Serialize)]
struct Ordering {
    ascending: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertOptions<'a> {
    on_conflict: &'a str,
}

#[derive(Serialize)]
struct LastSeen<'a> {
    last_seen: &'a str,
}

#[derive(Serialize)]
struct ReadReceipt<'a> {
    is_read: bool,
    read_at: &'a str,
}

#[derive(Serialize)]
struct UnreadArgs<'a> {
    current_user_id: &'a str,
}

#[derive(Serialize)]
struct Tracked {
    online_at: String,
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue> {
    Ok(serde_wasm_bindgen::to_value(value)?)
}

fn field(object: &JsValue, name: &str) -> Result<JsValue> {
    Ok(Reflect::get(object, &JsValue::from_str(name))?)
}

/// Fails with the backend's own message when the response carries an error.
fn check(response: &JsValue) -> Result<()> {
    let error = field(response, "error")?;
    if error.is_null() || error.is_undefined() {
        return Ok(());
    }
    let message = field(&error, "message")?
        .as_string()
        .unwrap_or_else(|| format!("{error:?}"));
    Err(Error::backend(message))
}

fn data<T: DeserializeOwned>(response: &JsValue) -> Result<T> {
    check(response)?;
    Ok(serde_wasm_bindgen::from_value(field(response, "data")?)?)
}

async fn run(query: Query) -> Result<JsValue> {
    Ok(JsFuture::from(Promise::resolve(&query)).await?.into())
}

async fn run_promise(promise: Promise) -> Result<JsValue> {
    Ok(JsFuture::from(promise).await?)
}

/// Awaits `promise` in the background and logs a rejection.
fn settle(promise: Promise, what: &'static str) {
    spawn_local(async move {
        if let Err(err) = run_promise(promise).await {
            error!("Error {what}: {err}");
        }
    });
}

/// Hosted backend reached through its browser SDK, loaded on the page as
/// `window.supabase`.
#[derive(Debug, Clone)]
pub struct Supabase {
    client: Client,
}

impl Supabase {
    pub fn connect(config: &Config) -> Result<Self> {
        let client = create_client(&config.url, &config.anon_key)?;
        log!("Connected to {}", config.url);
        Ok(Self { client })
    }

    /// Closes every realtime channel still open on the client.
    pub fn dispose(&self) {
        settle(self.client.remove_all_channels(), "removing channels");
    }

    fn table(&self, table: &str) -> Query {
        self.client.from(table)
    }

    fn teardown(&self, channel: Channel, closures: Vec<Closure<dyn FnMut(JsValue)>>) -> Subscription {
        let client = self.client.clone();
        Subscription::new(move || {
            let removed = client.remove_channel(&channel);
            // The channel still reports "CLOSED" to its status callback
            // before the removal settles.
            spawn_local(async move {
                if let Err(err) = run_promise(removed).await {
                    error!("Error removing channel: {err}");
                }
                drop(closures);
            });
        })
    }
}

impl Backend for Supabase {
    async fn sign_in(&self, credentials: &Credentials) -> Result<()> {
        let args = to_js(credentials)?;
        check(&run_promise(self.client.auth().sign_in_with_password(&args)).await?)
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<()> {
        let args = to_js(credentials)?;
        check(&run_promise(self.client.auth().sign_up(&args)).await?)
    }

    async fn sign_out(&self) -> Result<()> {
        check(&run_promise(self.client.auth().sign_out()).await?)
    }

    fn on_auth_state_change(&self, handler: AuthHandler) -> Subscription {
        let callback = Closure::<dyn FnMut(String, JsValue)>::new(
            move |event: String, session: JsValue| {
                let session = if session.is_null() || session.is_undefined() {
                    None
                } else {
                    match serde_wasm_bindgen::from_value::<Session>(session) {
                        Ok(session) => Some(session),
                        Err(err) => {
                            error!("Invalid session for {event}: {err}");
                            None
                        }
                    }
                };
                handler(AuthEvent::from_name(&event), session);
            },
        );
        let registration = self.client.auth().on_auth_state_change(&callback);
        Subscription::new(move || {
            let unsubscribed = field(&registration, "data")
                .and_then(|data| field(&data, "subscription"))
                .and_then(|subscription| {
                    let unsubscribe: Function = field(&subscription, "unsubscribe")?
                        .dyn_into()
                        .map_err(Error::from)?;
                    unsubscribe.call0(&subscription)?;
                    Ok(())
                });
            if let Err(err) = unsubscribed {
                error!("Error leaving auth state changes: {err}");
            }
            drop(callback);
        })
    }

    async fn upsert_user(&self, user: &User) -> Result<()> {
        let values = to_js(user)?;
        let options = to_js(&UpsertOptions { on_conflict: "id" })?;
        check(&run(self.table(USERS_TABLE).upsert(&values, &options)).await?)
    }

    async fn update_last_seen(&self, user_id: &str, at: &str) -> Result<()> {
        let values = to_js(&LastSeen { last_seen: at })?;
        let query = self
            .table(USERS_TABLE)
            .update(&values)
            .eq("id", &JsValue::from_str(user_id));
        check(&run(query).await?)
    }

    async fn fetch_users_except(&self, user_id: &str) -> Result<Vec<User>> {
        let query = self
            .table(USERS_TABLE)
            .select(USER_COLUMNS)
            .neq("id", &JsValue::from_str(user_id));
        let users: Option<Vec<User>> = data(&run(query).await?)?;
        Ok(users.unwrap_or_default())
    }

    async fn fetch_user(&self, user_id: &str) -> Result<Option<User>> {
        let query = self
            .table(USERS_TABLE)
            .select("*")
            .eq("id", &JsValue::from_str(user_id))
            .maybe_single();
        data(&run(query).await?)
    }

    async fn fetch_unread_counts(&self, recipient_id: &str) -> Result<Vec<UnreadCount>> {
        let args = to_js(&UnreadArgs {
            current_user_id: recipient_id,
        })?;
        let counts: Option<Vec<UnreadCount>> =
            data(&run(self.client.rpc(UNREAD_COUNTS_PROCEDURE, &args)).await?)?;
        Ok(counts.unwrap_or_default())
    }

    async fn fetch_conversation(&self, me: &str, other: &str) -> Result<Vec<Message>> {
        let filter = format!(
            "and(sender_id.eq.{me},receiver_id.eq.{other}),and(sender_id.eq.{other},receiver_id.eq.{me})"
        );
        let query = self
            .table(MESSAGES_TABLE)
            .select(MESSAGE_COLUMNS)
            .or(&filter)
            .order("created_at", &to_js(&Ordering { ascending: true })?);
        let messages: Option<Vec<Message>> = data(&run(query).await?)?;
        Ok(messages.unwrap_or_default())
    }

    async fn mark_conversation_read(
        &self,
        sender_id: &str,
        receiver_id: &str,
        at: &str,
    ) -> Result<()> {
        let values = to_js(&ReadReceipt {
            is_read: true,
            read_at: at,
        })?;
        let query = self
            .table(MESSAGES_TABLE)
            .update(&values)
            .eq("sender_id", &JsValue::from_str(sender_id))
            .eq("receiver_id", &JsValue::from_str(receiver_id))
            .eq("is_read", &JsValue::FALSE);
        check(&run(query).await?)
    }

    async fn mark_message_read(&self, message_id: &str, at: &str) -> Result<()> {
        let values = to_js(&ReadReceipt {
            is_read: true,
            read_at: at,
        })?;
        let query = self
            .table(MESSAGES_TABLE)
            .update(&values)
            .eq("id", &JsValue::from_str(message_id));
        check(&run(query).await?)
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message> {
        let values = to_js(message)?;
        let query = self
            .table(MESSAGES_TABLE)
            .insert(&values)
            .select(MESSAGE_COLUMNS)
            .single();
        data(&run(query).await?)
    }

    fn subscribe_presence(&self, key: &str, handler: PresenceHandler) -> Subscription {
        let handler: Rc<dyn Fn(PresenceEvent)> = Rc::from(handler);
        let options = to_js(&ChannelOptions {
            config: ChannelConfig {
                presence: PresenceConfig { key },
            },
        })
        .unwrap_or(JsValue::UNDEFINED);
        let channel = self.client.channel(PRESENCE_CHANNEL, &options);

        let sync = {
            let handler = handler.clone();
            let channel = channel.clone();
            Closure::<dyn FnMut(JsValue)>::new(move |_payload: JsValue| {
                let state = channel.presence_state();
                let keys = Object::keys(state.unchecked_ref::<Object>())
                    .iter()
                    .filter_map(|key| key.as_string())
                    .collect();
                handler(PresenceEvent::Sync(keys));
            })
        };
        let join = {
            let handler = handler.clone();
            Closure::<dyn FnMut(JsValue)>::new(move |payload: JsValue| {
                match field(&payload, "key").map(|key| key.as_string()) {
                    Ok(Some(key)) => handler(PresenceEvent::Join(key)),
                    _ => error!("Presence join without key"),
                }
            })
        };
        let leave = {
            let handler = handler.clone();
            Closure::<dyn FnMut(JsValue)>::new(move |payload: JsValue| {
                match field(&payload, "key").map(|key| key.as_string()) {
                    Ok(Some(key)) => handler(PresenceEvent::Leave(key)),
                    _ => error!("Presence leave without key"),
                }
            })
        };
        let status = {
            let channel = channel.clone();
            Closure::<dyn FnMut(JsValue)>::new(move |status: JsValue| {
                if status.as_string().as_deref() != Some("SUBSCRIBED") {
                    return;
                }
                let tracked = Tracked {
                    online_at: Utc::now().to_rfc3339(),
                };
                match to_js(&tracked) {
                    Ok(payload) => settle(channel.track(&payload), "tracking presence"),
                    Err(err) => error!("Error tracking presence: {err}"),
                }
            })
        };

        for (event, callback) in [("sync", &sync), ("join", &join), ("leave", &leave)] {
            let filter = to_js(&EventFilter { event }).unwrap_or(JsValue::UNDEFINED);
            channel.on("presence", &filter, callback);
        }
        channel.subscribe(&status);

        self.teardown(channel, vec![sync, join, leave, status])
    }

    fn subscribe_changes(&self, handler: ChangeHandler) -> Subscription {
        let handler: Rc<dyn Fn(RowChange)> = Rc::from(handler);
        let channel = self.client.channel(CHANGES_CHANNEL, &JsValue::UNDEFINED);

        fn listener<T, F>(handler: &Rc<dyn Fn(RowChange)>, wrap: F) -> Closure<dyn FnMut(JsValue)>
        where
            T: DeserializeOwned + 'static,
            F: Fn(T) -> RowChange + 'static,
        {
            let handler = handler.clone();
            Closure::<dyn FnMut(JsValue)>::new(move |payload: JsValue| {
                let row = field(&payload, "new")
                    .and_then(|row| Ok(serde_wasm_bindgen::from_value::<T>(row)?));
                match row {
                    Ok(row) => handler(wrap(row)),
                    Err(err) => error!("Invalid realtime row: {err}"),
                }
            })
        }

        let listeners = [
            ("INSERT", USERS_TABLE, listener(&handler, RowChange::UserInserted)),
            ("UPDATE", USERS_TABLE, listener(&handler, RowChange::UserUpdated)),
            ("INSERT", MESSAGES_TABLE, listener(&handler, RowChange::MessageInserted)),
            (
                "UPDATE",
                MESSAGES_TABLE,
                listener(&handler, |patch: MessagePatch| {
                    log!("Message update {patch:?}");
                    RowChange::MessageUpdated(patch)
                }),
            ),
        ];

        let mut closures = Vec::with_capacity(listeners.len() + 1);
        for (event, table, callback) in listeners {
            let filter = to_js(&ChangeFilter {
                event,
                schema: "public",
                table,
            })
            .unwrap_or(JsValue::UNDEFINED);
            channel.on("postgres_changes", &filter, &callback);
            closures.push(callback);
        }
        let status = Closure::<dyn FnMut(JsValue)>::new(move |status: JsValue| {
            log!("Realtime changes {status:?}");
        });
        channel.subscribe(&status);
        closures.push(status);

        self.teardown(channel, closures)
    }
}
