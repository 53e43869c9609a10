use chrono::{DateTime, Duration, Utc};

/// Posts at most this old get a relative label.
pub const RELATIVE_WINDOW_DAYS: i64 = 7;

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// "just now", "5 minutes ago", "1 day ago" up to seven days inclusive,
/// then the calendar date ("Jan 15, 2025").
pub fn time_label(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(created);

    if age > Duration::days(RELATIVE_WINDOW_DAYS) {
        return created.format("%b %-d, %Y").to_string();
    }

    if age.num_seconds() < 60 {
        return "just now".to_string();
    }

    let minutes = age.num_minutes();
    if minutes < 60 {
        return plural(minutes, "minute");
    }

    let hours = age.num_hours();
    if hours < 24 {
        return plural(hours, "hour");
    }

    plural(age.num_days(), "day")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn recent_is_just_now() {
        assert_eq!(time_label(now(), now()), "just now");
        assert_eq!(time_label(now() - Duration::seconds(59), now()), "just now");
    }

    #[test]
    fn future_timestamps_are_just_now() {
        assert_eq!(time_label(now() + Duration::minutes(3), now()), "just now");
    }

    #[test]
    fn minutes_and_hours() {
        assert_eq!(time_label(now() - Duration::minutes(1), now()), "1 minute ago");
        assert_eq!(time_label(now() - Duration::minutes(5), now()), "5 minutes ago");
        assert_eq!(time_label(now() - Duration::hours(1), now()), "1 hour ago");
        assert_eq!(time_label(now() - Duration::hours(23), now()), "23 hours ago");
        assert_eq!(time_label(now() - Duration::days(1), now()), "1 day ago");
    }

    #[test]
    fn just_inside_the_window() {
        let created = now() - Duration::days(6) - Duration::hours(23);
        assert_eq!(time_label(created, now()), "6 days ago");
    }

    #[test]
    fn exactly_seven_days_is_relative() {
        assert_eq!(time_label(now() - Duration::days(7), now()), "7 days ago");
    }

    #[test]
    fn past_the_window_is_a_date() {
        assert_eq!(time_label(now() - Duration::days(8), now()), "Mar 12, 2025");
        let created = now() - Duration::days(7) - Duration::seconds(1);
        assert_eq!(time_label(created, now()), "Mar 13, 2025");
    }
}
