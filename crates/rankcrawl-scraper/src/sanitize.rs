//! Fixed text sanitation rules for listing fields.
//!
//! These are not general HTML-text cleaners: they strip exactly the
//! decoration the listing template puts around each field.

/// Characters removed from every optional text field.
const STRIPPED: [char; 4] = [' ', '(', ')', '\n'];

/// Removes spaces, parentheses, and newlines.
///
/// `"(1994)"` → `"1994"`, `"142 min"` → `"142min"`,
/// `"\nDrama, Crime   "` → `"Drama,Crime"`.
#[must_use]
pub fn sanitize_text(raw: &str) -> String {
    raw.chars().filter(|c| !STRIPPED.contains(c)).collect()
}

/// Parses a rank ordinal such as `"4."` into `4`.
///
/// Applies [`sanitize_text`], drops trailing periods, and strips thousands
/// separators. Returns `None` for anything that is not a positive integer.
#[must_use]
pub fn sanitize_rank(raw: &str) -> Option<u32> {
    let cleaned = sanitize_text(raw);
    let digits = cleaned.trim_end_matches('.').replace(',', "");
    digits.parse::<u32>().ok().filter(|rank| *rank > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_parentheses_from_year() {
        assert_eq!(sanitize_text("(1994)"), "1994");
    }

    #[test]
    fn keeps_year_range_text() {
        assert_eq!(sanitize_text("(2008\u{2013}2013)"), "2008\u{2013}2013");
    }

    #[test]
    fn strips_spaces_from_runtime() {
        assert_eq!(sanitize_text("142 min"), "142min");
    }

    #[test]
    fn strips_newlines_and_padding_from_genres() {
        assert_eq!(
            sanitize_text("\nDrama, Crime            "),
            "Drama,Crime"
        );
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(sanitize_text(""), "");
    }

    #[test]
    fn rank_with_trailing_period() {
        assert_eq!(sanitize_rank("4."), Some(4));
        assert_eq!(sanitize_rank(" 1,000. "), Some(1000));
    }

    #[test]
    fn rank_rejects_non_numeric_and_zero() {
        assert_eq!(sanitize_rank("N/A"), None);
        assert_eq!(sanitize_rank(""), None);
        assert_eq!(sanitize_rank("0."), None);
    }
}
