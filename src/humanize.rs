use chrono::{DateTime, Duration, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 12 * MONTH;
const LONG_TIME: i64 = 37 * YEAR;

/// Renders how long ago (or how far ahead) `then` is from `now`, e.g. "3 hours ago".
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let (elapsed, label) = if then <= now {
        (now.signed_duration_since(then), "ago")
    } else {
        (then.signed_duration_since(now), "from now")
    };

    describe(elapsed, label)
}

fn describe(elapsed: Duration, label: &str) -> String {
    let seconds = elapsed.num_seconds();

    // an amount of 0 means the text already carries its quantity
    let (text, amount) = match seconds {
        s if s < 1 => return "now".to_string(),
        s if s < 2 => ("1 second", 0),
        s if s < MINUTE => ("seconds", s),
        s if s < 2 * MINUTE => ("1 minute", 0),
        s if s < HOUR => ("minutes", s / MINUTE),
        s if s < 2 * HOUR => ("1 hour", 0),
        s if s < DAY => ("hours", s / HOUR),
        s if s < 2 * DAY => ("1 day", 0),
        s if s < WEEK => ("days", s / DAY),
        s if s < 2 * WEEK => ("1 week", 0),
        s if s < MONTH => ("weeks", s / WEEK),
        s if s < 2 * MONTH => ("1 month", 0),
        s if s < YEAR => ("months", s / MONTH),
        s if s < 18 * MONTH => ("1 year", 0),
        s if s < 2 * YEAR => ("2 years", 0),
        s if s < LONG_TIME => ("years", s / YEAR),
        _ => ("a long while", 0),
    };

    if amount == 0 {
        format!("{text} {label}")
    } else {
        format!("{amount} {text} {label}")
    }
}
