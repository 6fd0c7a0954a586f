// Copyright (c) 2026 rezky_nightky

//! Shared with `build.rs`, which pulls this file in by path.

pub const SHORT_SHA_LEN: usize = 7;

/// First seven characters of a commit id, lowercased. `None` when the value
/// is empty or not hex.
pub fn short_sha(raw: &str) -> Option<String> {
    let short: String = raw.trim().chars().take(SHORT_SHA_LEN).collect();
    if short.is_empty() || !short.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(short.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_ids_are_cut_and_lowercased() {
        assert_eq!(
            short_sha("  9F3A1C0DEADBEEF0123\n").as_deref(),
            Some("9f3a1c0")
        );
        assert_eq!(short_sha("abc").as_deref(), Some("abc"));
    }

    #[test]
    fn multibyte_values_are_rejected_without_panicking() {
        assert_eq!(short_sha("abcdeé123"), None);
        assert_eq!(short_sha("ééééééééé"), None);
        assert_eq!(short_sha("   "), None);
    }
}
