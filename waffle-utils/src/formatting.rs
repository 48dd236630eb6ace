/// Longest nickname the platform accepts, in characters.
pub const NICKNAME_MAX_CHARS: usize = 32;

/// Separator between a member's base name and a reaction-role tag.
pub const NICKNAME_TAG_SEPARATOR: &str = " || ";

/// Drop a reaction-role tag from a display name, if present.
pub fn strip_nickname_tag(display_name: &str) -> &str {
    match display_name.find("||") {
        Some(index) => display_name[..index].trim(),
        None => display_name,
    }
}

/// Build `"base || tag"`, shortening `base` so the result fits the nickname limit.
pub fn tag_nickname(display_name: &str, tag: &str) -> String {
    let base = strip_nickname_tag(display_name);
    let suffix = format!("{NICKNAME_TAG_SEPARATOR}{tag}");
    let budget = NICKNAME_MAX_CHARS.saturating_sub(suffix.chars().count());

    let tagged: String = base.chars().take(budget).chain(suffix.chars()).collect();
    tagged.chars().take(NICKNAME_MAX_CHARS).collect()
}

/// Format seconds compactly, largest unit first (e.g. `1d 2h`, `5m 30s`).
pub fn format_compact_duration(total_seconds: u64) -> String {
    const UNITS: [(u64, &str); 6] = [
        (365 * 86_400, "y"),
        (7 * 86_400, "w"),
        (86_400, "d"),
        (3_600, "h"),
        (60, "m"),
        (1, "s"),
    ];

    if total_seconds == 0 {
        return "0s".to_owned();
    }

    let mut remaining = total_seconds;
    let mut parts = Vec::new();
    for (size, label) in UNITS {
        let count = remaining / size;
        if count > 0 {
            parts.push(format!("{count}{label}"));
            remaining %= size;
        }
    }

    parts.into_iter().take(2).collect::<Vec<_>>().join(" ")
}
