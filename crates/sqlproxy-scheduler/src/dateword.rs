use chrono::{Local, NaiveTime, TimeZone, Utc};

/// Resolve a scheduled-job parameter value, substituting the dynamic date
/// keywords `now|today|yesterday|tomorrow` (case-insensitive) for an
/// absolute instant at run time (spec §4.4 point 1): `today`/`yesterday`/
/// `tomorrow` resolve to local midnight, `now` to the instant of resolution.
/// Any other value passes through unchanged.
pub fn resolve(raw: &str) -> String {
    match raw.to_ascii_lowercase().as_str() {
        "now" => Utc::now().to_rfc3339(),
        "today" => local_midnight(0),
        "yesterday" => local_midnight(-1),
        "tomorrow" => local_midnight(1),
        _ => raw.to_string(),
    }
}

fn local_midnight(day_offset: i64) -> String {
    let today = Local::now().date_naive();
    let date = today + chrono::Duration::days(day_offset);
    let midnight = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .single()
        .unwrap_or_else(|| Local.from_utc_datetime(&midnight))
        .to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_non_keyword_values() {
        assert_eq!(resolve("active"), "active");
        assert_eq!(resolve("42"), "42");
    }

    #[test]
    fn is_case_insensitive() {
        let today = resolve("today");
        assert_eq!(resolve("TODAY"), today);
        assert_eq!(resolve("Today"), today);
    }

    #[test]
    fn now_resolves_to_rfc3339() {
        let resolved = resolve("now");
        assert!(chrono::DateTime::parse_from_rfc3339(&resolved).is_ok());
    }

    #[test]
    fn yesterday_and_tomorrow_bracket_today() {
        let yesterday = resolve("yesterday");
        let today = resolve("today");
        let tomorrow = resolve("tomorrow");
        assert!(yesterday < today);
        assert!(today < tomorrow);
    }
}
