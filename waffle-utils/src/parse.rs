const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
const YEAR: u64 = 365 * DAY;

fn unit_seconds(unit: char) -> Option<u64> {
    match unit.to_ascii_lowercase() {
        's' => Some(1),
        'm' => Some(MINUTE),
        'h' => Some(HOUR),
        'd' => Some(DAY),
        'w' => Some(WEEK),
        'y' => Some(YEAR),
        _ => None,
    }
}

/// Parse a compact duration like `1y2w3d4h5m6s` into seconds.
///
/// Every number needs a unit. Zero-length durations and overflow are rejected.
pub fn parse_duration_seconds(raw: &str) -> Option<u64> {
    let compact: String = raw.chars().filter(|ch| !ch.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let mut total_seconds = 0_u64;
    let mut digits = String::new();

    for ch in compact.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }

        let multiplier = unit_seconds(ch)?;
        if digits.is_empty() {
            return None;
        }
        let number = digits.parse::<u64>().ok()?;
        digits.clear();

        total_seconds = total_seconds.checked_add(number.checked_mul(multiplier)?)?;
    }

    if !digits.is_empty() || total_seconds == 0 {
        return None;
    }

    Some(total_seconds)
}

/// Cheap shape check used to decide whether a leading argument is a duration.
pub fn looks_like_duration(raw: &str) -> bool {
    let value = raw.trim();
    value.chars().next().is_some_and(|ch| ch.is_ascii_digit())
        && value.chars().last().and_then(unit_seconds).is_some()
        && value
            .chars()
            .all(|ch| ch.is_ascii_digit() || unit_seconds(ch).is_some())
}

/// Parse a raw id or a `<@id>`, `<@!id>`, `<@&id>` or `<#id>` mention.
pub fn parse_snowflake(raw: &str) -> Option<u64> {
    let value = raw.trim();
    let inner = value
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .map(|rest| rest.trim_start_matches(['@', '#', '!', '&']))
        .unwrap_or(value);

    inner.parse::<u64>().ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_grammar_sums_every_unit() {
        let expected = YEAR + 2 * WEEK + 3 * DAY + 4 * HOUR + 5 * MINUTE + 6;
        assert_eq!(parse_duration_seconds("1y2w3d4h5m6s"), Some(expected));
        assert_eq!(parse_duration_seconds("1h 30m"), Some(5_400));
        assert_eq!(parse_duration_seconds("10M"), Some(600));
    }

    #[test]
    fn invalid_durations_are_rejected() {
        for raw in ["", "0s", "0h0m", "5", "h", "5x", "1h30", "99999999999999999999y"] {
            assert_eq!(parse_duration_seconds(raw), None, "{raw}");
        }
    }

    #[test]
    fn duration_shape_check() {
        assert!(looks_like_duration("2d"));
        assert!(looks_like_duration("1w2d"));
        assert!(!looks_like_duration("spamming"));
        assert!(!looks_like_duration("42"));
        assert!(!looks_like_duration("d2"));
    }

    #[test]
    fn snowflakes_parse_from_mentions() {
        assert_eq!(parse_snowflake("123"), Some(123));
        assert_eq!(parse_snowflake("<#456>"), Some(456));
        assert_eq!(parse_snowflake("<@&789>"), Some(789));
        assert_eq!(parse_snowflake("<@!10>"), Some(10));
        assert_eq!(parse_snowflake("<@abc>"), None);
        assert_eq!(parse_snowflake("0"), None);
    }
}
