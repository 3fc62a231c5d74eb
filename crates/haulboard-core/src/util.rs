//! Shared utility functions used across multiple modules.

/// Length of the id prefix shown in listings.
pub const SHORT_ID_LEN: usize = 13;

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Leading characters of an id, for compact listings.
pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

/// Truncate text to at most `max` characters, marking the cut with `…`.
pub fn truncate_text(value: &str, max: usize) -> String {
    let value = value.trim();
    if value.chars().count() <= max {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(max.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_option_rejects_empty() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("   ".to_string())), None);
    }

    #[test]
    fn normalize_text_option_trims_value() {
        assert_eq!(
            normalize_text_option(Some(" D-104 ".to_string())),
            Some("D-104".to_string())
        );
    }

    #[test]
    fn short_id_takes_prefix() {
        assert_eq!(short_id("0192f3a1-7c00-7abc-9def-000000000000"), "0192f3a1-7c00");
        assert_eq!(short_id("s1"), "s1");
    }

    #[test]
    fn truncate_text_marks_cut() {
        assert_eq!(truncate_text("Osaka port", 20), "Osaka port");
        assert_eq!(truncate_text("Osaka port terminal", 8), "Osaka p…");
    }
}
