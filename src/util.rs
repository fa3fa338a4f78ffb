/// Cut `s` to at most `max` chars without splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        None => s,
        Some((byte_idx, _)) => &s[..byte_idx],
    }
}

/// Truncate a string to `max` chars, appending "..." if truncated.
pub fn ellipsize(s: &str, max: usize) -> String {
    let cut = truncate_chars(s, max);
    if cut.len() == s.len() {
        s.to_string()
    } else {
        format!("{cut}...")
    }
}

/// Format a ratio as a whole percentage, e.g. `0.705` -> `"71"`.
/// Halves round up even when the product lands just below `.5` in binary.
pub fn percent(ratio: f64) -> String {
    let scaled = (ratio * 100.0 * 1e6).round() / 1e6;
    format!("{}", scaled.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn ellipsize_only_marks_truncated_strings() {
        assert_eq!(ellipsize("abcdef", 3), "abc...");
        assert_eq!(ellipsize("abc", 3), "abc");
    }

    #[test]
    fn percent_rounds() {
        assert_eq!(percent(0.705), "71");
        assert_eq!(percent(0.285), "29");
        assert_eq!(percent(0.7049), "70");
        assert_eq!(percent(0.0), "0");
        assert_eq!(percent(1.2), "120");
    }
}
