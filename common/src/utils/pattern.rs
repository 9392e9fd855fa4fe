//! Search pattern builders.
//!
//! User text is never spliced into a statement. These helpers turn it into a
//! value that is bound as a parameter: a `LIKE` pattern for SQL or an escaped
//! regular expression for Cypher and MongoDB.

/// Builds bound match patterns from raw search text.
pub struct SearchPattern;

impl SearchPattern {
    /// Escapes `LIKE` wildcards and the escape character itself.
    pub fn escape_like(text: &str) -> String {
        let mut escaped = String::with_capacity(text.len());
        for ch in text.chars() {
            if matches!(ch, '\\' | '%' | '_') {
                escaped.push('\\');
            }
            escaped.push(ch);
        }
        escaped
    }

    /// Lowercased `LIKE` pattern matching the text anywhere.
    pub fn like_contains(text: &str) -> String {
        format!("%{}%", Self::escape_like(&text.trim().to_lowercase()))
    }

    /// Lowercased `LIKE` pattern where every name part must appear, in order.
    ///
    /// `"jon smith"` becomes `%jon%smith%`.
    pub fn like_name(name: &str) -> String {
        let parts: Vec<String> = Self::name_parts(name)
            .iter()
            .map(|part| Self::escape_like(part))
            .collect();
        if parts.is_empty() {
            return "%".to_string();
        }
        format!("%{}%", parts.join("%"))
    }

    /// Escaped regular expression matching the text anywhere.
    /// Case-insensitivity is requested separately (`$options: "i"`).
    pub fn regex_contains(text: &str) -> String {
        regex::escape(text.trim())
    }

    /// Regular expression equivalent of [`SearchPattern::like_name`].
    pub fn regex_name(name: &str) -> String {
        Self::name_parts(name)
            .iter()
            .map(|part| regex::escape(part))
            .collect::<Vec<_>>()
            .join(".*")
    }

    /// Full-string, case-insensitive name regex for Cypher's `=~`.
    pub fn cypher_name(name: &str) -> String {
        format!("(?i).*{}.*", Self::regex_name(name))
    }

    fn name_parts(name: &str) -> Vec<String> {
        name.split_whitespace().map(str::to_lowercase).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::RegexBuilder;

    #[test]
    fn test_like_wildcards_are_escaped() {
        assert_eq!(SearchPattern::escape_like("100%_a\\b"), "100\\%\\_a\\\\b");
        assert_eq!(SearchPattern::like_contains(" Machine Learning "), "%machine learning%");
    }

    #[test]
    fn test_like_name_keeps_part_order() {
        assert_eq!(SearchPattern::like_name("Jon  Smith"), "%jon%smith%");
        assert_eq!(SearchPattern::like_name("   "), "%");
    }

    #[test]
    fn test_regex_name_tolerates_partial_names() {
        let pattern = SearchPattern::regex_name("jon smith");
        let re = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .unwrap();
        assert!(re.is_match("Jonathan A. Smith"));
        assert!(!re.is_match("Smith Jonathan"));
    }

    #[test]
    fn test_regex_metacharacters_are_escaped() {
        let pattern = SearchPattern::regex_contains("c++ (parallel)");
        let re = regex::Regex::new(&pattern).unwrap();
        assert!(re.is_match("notes on c++ (parallel) runtimes"));
        assert!(!re.is_match("cc parallel"));
    }

    #[test]
    fn test_cypher_name_wraps_parts() {
        assert_eq!(SearchPattern::cypher_name("Ann Lee"), "(?i).*ann.*lee.*");
    }
}
