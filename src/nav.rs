use crate::app::AppClient;
use crate::chat::RosterEntry;
use crate::format::format_last_seen_at;
use crate::state::User;
use chrono::{DateTime, Local, TimeZone};
use ev::MouseEvent;
use leptos::*;
use std::fmt::Display;

/// Status line for a user: "Online" while present, otherwise when they
/// were last seen, or "Offline" if that was never recorded.
pub fn presence_label<Tz>(online: bool, last_seen: Option<&str>, now: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if online {
        return "Online".to_string();
    }
    match last_seen.filter(|last_seen| !last_seen.is_empty()) {
        Some(last_seen) => format_last_seen_at(Some(last_seen), now),
        None => "Offline".to_string(),
    }
}

#[component]
pub fn Nav(client: AppClient, trigger: Trigger, email: String) -> impl IntoView {
    let roster = {
        let client = client.clone();
        create_memo(move |_| {
            trigger.track();
            client.with(|chat| chat.roster())
        })
    };
    let sign_out = {
        let client = client.clone();
        move |_| client.sign_out()
    };

    view! {
        <div class="w-1/4 min-w-[250px] border-e-2 border-gray-200 min-h-dvh max-h-dvh overflow-y-auto flex flex-col">
            <div class="flex flex-row items-center justify-between p-4 border-b border-gray-200">
                <h5 class="text-base font-semibold text-gray-600 truncate">"Matches - " {email}</h5>
                <button
                    type="button"
                    class="text-white bg-gray-800 hover:bg-gray-900 font-medium rounded-lg text-sm px-3 py-1.5"
                    on:click=sign_out
                >
                    Logout
                </button>
            </div>
            <ul class="grow space-y-1 font-medium p-2">
                {move || {
                    roster
                        .get()
                        .into_iter()
                        .map(|entry| {
                            let client = client.clone();
                            view! { <RosterItem entry on_select=move |user: User| client.select(user) /> }
                        })
                        .collect::<Vec<_>>()
                }}
            </ul>
        </div>
    }
}

#[component]
fn RosterItem<F>(entry: RosterEntry, on_select: F) -> impl IntoView
where
    F: Fn(User) + 'static,
{
    let RosterEntry {
        user,
        online,
        unread,
        selected,
    } = entry;
    let status = presence_label(online, user.last_seen.as_deref(), Local::now());
    let email = user.email.clone();
    let onclick = move |ev: MouseEvent| {
        ev.prevent_default();
        on_select(user.clone());
    };

    view! {
        <li on:click=onclick>
            <a
                href="#"
                class="flex items-center p-2 text-gray-900 rounded-lg hover:bg-gray-100 group"
                class:bg-blue-100=selected
            >
                <span
                    class="w-2.5 h-2.5 rounded-full shrink-0"
                    class:bg-green-500=online
                    class:bg-gray-400=move || !online
                ></span>
                <div class="ms-3 flex flex-col grow min-w-0 text-left">
                    <span class="truncate">{email}</span>
                    <span class="text-xs text-gray-500">{status}</span>
                </div>
                {(unread > 0)
                    .then(|| {
                        view! {
                            <span class="ms-2 px-2 py-0.5 text-xs font-semibold text-white bg-red-500 rounded-full">
                                {unread}
                            </span>
                        }
                    })}
            </a>
        </li>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_presence_label() {
        let now = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 10, 15, 0, 0)
            .unwrap();
        let seen = Some("2024-05-10T13:00:00+00:00");
        assert_eq!(presence_label(true, seen, now), "Online");
        assert_eq!(presence_label(false, seen, now), "2h ago");
        assert_eq!(presence_label(false, None, now), "Offline");
        assert_eq!(presence_label(false, Some(""), now), "Offline");
        assert_eq!(presence_label(false, Some("garbage"), now), "Invalid date");
    }
}
