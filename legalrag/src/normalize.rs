//! Whitespace normalization applied to document text before chunking.

/// Collapse every run of whitespace (spaces, tabs, `\r\n`, `\n`, Unicode
/// spaces) into a single ASCII space and trim both ends.
///
/// ```
/// use legalrag::normalize::normalize;
///
/// assert_eq!(normalize("  Term\r\n\tof\u{00A0}Agreement \n"), "Term of Agreement");
/// ```
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_line_breaks_and_tabs() {
        assert_eq!(normalize("1. Parties\n\n2. Term\t\tand  Termination"), "1. Parties 2. Term and Termination");
    }

    #[test]
    fn whitespace_only_becomes_empty() {
        assert_eq!(normalize(" \n\t \r\n"), "");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn already_normalized_text_is_unchanged() {
        let text = "The Recipient shall hold Confidential Information in strict confidence.";
        assert_eq!(normalize(text), text);
    }
}
