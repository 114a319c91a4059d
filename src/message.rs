use crate::chat::ThreadEntry;
use crate::format::format_last_seen_at;
use crate::state::Message as Row;
use chrono::{DateTime, Local, TimeZone};
use leptos::*;
use std::fmt::Display;

/// Delivery annotation under one of our own messages.
pub fn receipt_label<Tz>(message: &Row, now: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match (message.is_read, message.read_at.as_deref()) {
        (true, Some(read_at)) => format!("Read at {}", format_last_seen_at(Some(read_at), now)),
        (true, None) => "Read".to_string(),
        (false, _) => "Sent".to_string(),
    }
}

#[component]
pub fn Message(entry: ThreadEntry, mine: bool) -> impl IntoView {
    let receipt = mine.then(|| receipt_label(&entry.message, Local::now()));
    let class = if mine {
        "px-4 py-2 rounded-2xl max-w-[70%] break-words bg-blue-500 text-white self-end"
    } else {
        "px-4 py-2 rounded-2xl max-w-[70%] break-words bg-gray-200 text-gray-800 self-start"
    };
    view! {
        <div class=class class:opacity-60=entry.is_pending()>
            <div>{entry.message.content}</div>
            {receipt
                .map(|receipt| {
                    view! { <div class="text-xs mt-1 opacity-70 text-right">{receipt}</div> }
                })}
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn row(is_read: bool, read_at: Option<&str>) -> Row {
        Row {
            id: "m1".to_string(),
            content: "hello world".to_string(),
            sender_id: "me".to_string(),
            receiver_id: "alice".to_string(),
            created_at: None,
            is_read,
            read_at: read_at.map(str::to_string),
        }
    }

    #[test]
    fn test_receipts() {
        let now = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 10, 15, 0, 0)
            .unwrap();
        assert_eq!(receipt_label(&row(false, None), now), "Sent");
        assert_eq!(receipt_label(&row(true, None), now), "Read");
        assert_eq!(
            receipt_label(&row(true, Some("2024-05-10T14:55:00+00:00")), now),
            "Read at 5m ago"
        );
        // Read flag wins over a stale timestamp.
        assert_eq!(
            receipt_label(&row(false, Some("2024-05-10T14:55:00+00:00")), now),
            "Sent"
        );
    }
}
