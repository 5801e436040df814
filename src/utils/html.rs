//! HTML escaping for recognizer diagnostics.

/// Escape HTML special characters so untrusted backend output can be
/// embedded in a page.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape_basic() {
        assert_eq!(html_escape("hello"), "hello");
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("a & b"), "a &amp; b");
        assert_eq!(html_escape("'single'"), "&#039;single&#039;");
    }

    #[test]
    fn test_html_escape_stderr_output() {
        assert_eq!(
            html_escape("Error opening data file <eng.traineddata> & \"tessdata\""),
            "Error opening data file &lt;eng.traineddata&gt; &amp; &quot;tessdata&quot;"
        );
    }
}
