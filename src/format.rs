use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::fmt::Display;

/// Human label for a stored timestamp, relative to the local clock.
pub fn format_last_seen(timestamp: Option<&str>) -> String {
    format_last_seen_at(timestamp, Local::now())
}

/// Same as [`format_last_seen`] with an explicit "now".
///
/// Missing input yields `"never"` and anything that cannot be read as a
/// date yields `"Invalid date"`. Every threshold compares rounded values,
/// so 59.5 minutes already counts as an hour.
pub fn format_last_seen_at<Tz>(timestamp: Option<&str>, now: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let Some(timestamp) = timestamp.filter(|timestamp| !timestamp.is_empty()) else {
        return "never".to_string();
    };
    let tz = now.timezone();
    let Some(date) = parse_timestamp(timestamp, &tz) else {
        return "Invalid date".to_string();
    };

    let millis = now.clone().signed_duration_since(date.clone()).num_milliseconds();
    let seconds = round_div(millis, 1000);
    let minutes = round_div(seconds, 60);
    let hours = round_div(minutes, 60);
    let days = round_div(hours, 24);

    if seconds < 10 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    if hours < 24 {
        return format!("{hours}h ago");
    }
    let yesterday = now.date_naive().pred_opt();
    if yesterday.is_some_and(|yesterday| date.date_naive() >= yesterday) {
        return format!("yesterday at {}", date.format("%-I:%M %P"));
    }
    if days < 7 {
        return format!("{days}d ago");
    }
    date.format("%b %-d, %Y").to_string()
}

fn round_div(value: i64, divisor: i64) -> i64 {
    (value as f64 / divisor as f64 + 0.5).floor() as i64
}

fn parse_timestamp<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<Tz>> {
    // The database hands out "2024-05-01 12:00:00+00".
    let normalized = raw.trim().replacen(' ', "T", 1);

    if let Ok(date) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(date.with_timezone(tz));
    }
    if let Ok(date) = DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f%#z") {
        return Some(date.with_timezone(tz));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, pattern) {
            return tz.from_local_datetime(&naive).earliest();
        }
    }
    // A bare date is midnight UTC.
    let date = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight).with_timezone(tz))
}
