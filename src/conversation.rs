use crate::app::AppClient;
use crate::message::Message;
use crate::nav::presence_label;
use chrono::Local;
use leptos::html::Div;
use leptos::leptos_dom::ev::SubmitEvent;
use leptos::*;

#[component]
pub fn Conversation(client: AppClient, trigger: Trigger) -> impl IntoView {
    let receiver = {
        let client = client.clone();
        create_memo(move |_| {
            trigger.track();
            client.with(|chat| {
                chat.receiver()
                    .map(|user| (user.clone(), chat.is_online(&user.id)))
            })
        })
    };
    let thread = {
        let client = client.clone();
        create_memo(move |_| {
            trigger.track();
            client.with(|chat| {
                let me = chat.session_id().unwrap_or_default().to_string();
                chat.thread()
                    .iter()
                    .map(|entry| {
                        let mine = entry.message.sender_id == me;
                        (entry.clone(), mine)
                    })
                    .collect::<Vec<_>>()
            })
        })
    };
    let draft = {
        let client = client.clone();
        create_memo(move |_| {
            trigger.track();
            client.with(|chat| chat.draft().to_string())
        })
    };

    let bottom = create_node_ref::<Div>();
    create_effect(move |_| {
        thread.with(|_| ());
        if let Some(bottom) = bottom.get() {
            bottom.scroll_into_view();
        }
    });

    let update_message = {
        let client = client.clone();
        move |ev| client.set_draft(event_target_value(&ev))
    };
    let send_message = move |ev: SubmitEvent| {
        ev.prevent_default();
        client.send();
    };

    view! {
        <div class="h-dvh max-h-dvh grow flex flex-col">
            {move || match receiver.get() {
                None => {
                    view! {
                        <div class="grow flex items-center justify-center text-gray-500">
                            "Select a user to start chatting"
                        </div>
                    }
                        .into_view()
                }
                Some((user, online)) => {
                    let status = presence_label(online, user.last_seen.as_deref(), Local::now());
                    view! {
                        <div class="p-4 border-b border-gray-200">
                            <h3 class="text-lg font-semibold">"Chat with " {user.email}</h3>
                            <span class="text-sm text-gray-500">{status}</span>
                        </div>
                    }
                        .into_view()
                }
            }}
            <main class="grow flex flex-col gap-2 p-4 overflow-auto">
                {move || {
                    let entries = thread.get();
                    if entries.is_empty() && receiver.with(Option::is_some) {
                        view! { <p class="text-center text-gray-400">"No messages yet."</p> }
                            .into_view()
                    } else {
                        entries
                            .into_iter()
                            .map(|(entry, mine)| view! { <Message entry mine /> })
                            .collect_view()
                    }
                }}
                <div node_ref=bottom></div>
            </main>
            <form class="w-full" on:submit=send_message class:hidden=move || receiver.with(Option::is_none)>
                <label for="chat" class="sr-only">
                    Your message
                </label>
                <div class="flex items-center px-3 py-2 bg-gray-50">
                    <input
                        id="chat"
                        class="block mx-4 p-2.5 w-full text-sm text-gray-900 bg-white rounded-lg border border-gray-300 focus:ring-blue-500 focus:border-blue-500"
                        placeholder="Type a message..."
                        on:input=update_message
                        prop:value=draft
                    />
                    <button
                        type="submit"
                        class="inline-flex justify-center p-2 text-blue-600 rounded-full cursor-pointer hover:bg-blue-100"
                    >
                        <svg
                            class="w-5 h-5 rotate-90 rtl:-rotate-90"
                            aria-hidden="true"
                            xmlns="http://www.w3.org/2000/svg"
                            fill="currentColor"
                            viewBox="0 0 18 20"
                        >
                            <path d="m17.914 18.594-8-18a1 1 0 0 0-1.828 0l-8 18a1 1 0 0 0 1.157 1.376L8 18.281V9a1 1 0 0 1 2 0v9.281l6.758 1.689a1 1 0 0 0 1.156-1.376Z" />
                        </svg>
                        <span class="sr-only">Send message</span>
                    </button>
                </div>
            </form>
        </div>
    }
}
