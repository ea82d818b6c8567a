use ammonia;

/// Clean user-supplied rich text using the ammonia library.
///
/// Whitelist-based sanitization: safe tags (<b>, <p>, ...) survive,
/// dangerous tags (<script>, <iframe>) and event-handler attributes are
/// stripped. Serves as a fail-safe against stored XSS in post, comment
/// and message bodies.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_tags() {
        let cleaned = clean_html("hello <script>alert(1)</script>world");
        assert!(!cleaned.contains("<script>"));
        assert!(cleaned.contains("hello"));
    }

    #[test]
    fn keeps_basic_formatting() {
        let cleaned = clean_html("<b>pitch deck</b> attached");
        assert_eq!(cleaned, "<b>pitch deck</b> attached");
    }
}
