//! Company name to tenant identifier

/// Longest DNS label
pub const MAX_LABEL_LEN: usize = 63;

/// Shortest identifier a signup may use
pub const MIN_SUBDOMAIN_LEN: usize = 3;

/// Derive a DNS-label-safe identifier from a free-text company name.
///
/// Lower-cases, drops everything outside `[a-z0-9-]` and whitespace, turns
/// whitespace runs into single hyphens, collapses hyphen runs, trims edge
/// hyphens and truncates to 63 characters. Never fails; the result may be
/// empty or shorter than [`MIN_SUBDOMAIN_LEN`] and callers must check.
pub fn derive_subdomain(company_name: &str) -> String {
    let mut label = String::with_capacity(company_name.len());

    for c in company_name.to_lowercase().chars() {
        let c = if c.is_whitespace() { '-' } else { c };
        let allowed = c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-';
        if !allowed {
            continue;
        }
        if c == '-' && label.ends_with('-') {
            continue;
        }
        label.push(c);
    }

    let trimmed = label.trim_matches('-');
    // Every remaining char is ASCII, so byte truncation is char-safe
    let truncated = &trimmed[..trimmed.len().min(MAX_LABEL_LEN)];
    truncated.trim_end_matches('-').to_string()
}

/// Whether a derived identifier is long enough to provision
pub fn is_usable(subdomain: &str) -> bool {
    subdomain.len() >= MIN_SUBDOMAIN_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_company_names() {
        assert_eq!(derive_subdomain("Acme Corp!"), "acme-corp");
        assert_eq!(derive_subdomain("Acme Corp"), "acme-corp");
        assert_eq!(derive_subdomain("  Big   Data  Inc  "), "big-data-inc");
    }

    #[test]
    fn test_leading_digits_are_kept() {
        // Digits are legal label characters, only hyphens are trimmed
        assert_eq!(derive_subdomain("123 Tech Co."), "123-tech-co");
    }

    #[test]
    fn test_punctuation_and_hyphen_runs() {
        assert_eq!(derive_subdomain("--Foo -- Bar--"), "foo-bar");
        assert_eq!(derive_subdomain("R&D / Labs"), "rd-labs");
        assert_eq!(derive_subdomain("a.b.c"), "abc");
    }

    #[test]
    fn test_unicode_is_stripped() {
        assert_eq!(derive_subdomain("Café Müller"), "caf-mller");
        assert_eq!(derive_subdomain("東京"), "");
    }

    #[test]
    fn test_truncates_to_dns_label() {
        let long = "x".repeat(100);
        assert_eq!(derive_subdomain(&long).len(), MAX_LABEL_LEN);

        // Truncation landing on a hyphen must not leave a trailing hyphen
        let name = format!("{} tail", "a".repeat(62));
        let derived = derive_subdomain(&name);
        assert_eq!(derived, "a".repeat(62));
        assert!(!derived.ends_with('-'));
    }

    #[test]
    fn test_output_is_a_dns_label() {
        let inputs = [
            "Acme Corp!",
            "  --  ",
            "Ünïcödé Ltd.",
            "a   -   b",
            "The Quick Brown Fox Jumps Over The Lazy Dog Trading Company International Limited",
        ];
        for input in inputs {
            let derived = derive_subdomain(input);
            assert_eq!(derived, derive_subdomain(input));
            assert!(derived.len() <= MAX_LABEL_LEN);
            assert!(!derived.starts_with('-') && !derived.ends_with('-'));
            assert!(!derived.contains("--"));
            assert!(derived
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }
    }

    #[test]
    fn test_usable_length() {
        assert!(!is_usable(&derive_subdomain("A!")));
        assert!(!is_usable(""));
        assert!(is_usable("abc"));
    }
}
