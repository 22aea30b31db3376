//! Text normalizers shared by identity derivation and resolution.

/// Slug used when a name normalizes to nothing.
pub const EMPTY_NAME_SLUG: &str = "worker";

/// Strip everything except ASCII digits.
///
/// `"+91 98765-43210"` becomes `"919876543210"`.
pub fn phone_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Lowercase ASCII alphanumerics of a name, with no separators.
///
/// The slug never contains `_`, so it is always the segment before the first
/// `_` of a derived frontend id. Returns an empty string for names without any
/// alphanumerics; see [`name_slug_or_default`].
pub fn name_slug(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// [`name_slug`], falling back to [`EMPTY_NAME_SLUG`].
pub fn name_slug_or_default(raw: &str) -> String {
    let slug = name_slug(raw);
    if slug.is_empty() {
        EMPTY_NAME_SLUG.to_string()
    } else {
        slug
    }
}

/// `true` when either non-empty string contains the other.
pub fn overlaps(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_digits_strips_formatting() {
        assert_eq!(phone_digits("+91 98765-43210"), "919876543210");
        assert_eq!(phone_digits("n/a"), "");
    }

    #[test]
    fn slug_drops_separators_and_case() {
        assert_eq!(name_slug("Ravi  Kumar"), "ravikumar");
        assert_eq!(name_slug("O'Neil_Jr."), "oneiljr");
        assert_eq!(name_slug_or_default("  --  "), "worker");
    }

    #[test]
    fn overlaps_requires_both_sides() {
        assert!(overlaps("ravikumar", "ravi"));
        assert!(overlaps("ravi", "ravikumar"));
        assert!(!overlaps("", "ravi"));
        assert!(!overlaps("priya", "ravi"));
    }
}
