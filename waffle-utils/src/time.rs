use chrono::{DateTime, Duration, Utc};

/// Expiry timestamp `seconds` from now, or `None` if it would overflow.
pub fn expiry_after(seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(seconds).ok()?;
    let delta = Duration::try_seconds(seconds)?;
    Utc::now().checked_add_signed(delta)
}

/// Discord relative timestamp markup, e.g. `<t:1700000000:R>`.
pub fn relative_timestamp(at: DateTime<Utc>) -> String {
    format!("<t:{}:R>", at.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_in_the_future() {
        let before = Utc::now();
        let expiry = expiry_after(60).unwrap();
        assert!(expiry > before);
        assert!(expiry_after(u64::MAX).is_none());
    }

    #[test]
    fn relative_markup() {
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(relative_timestamp(at), "<t:1700000000:R>");
    }
}
