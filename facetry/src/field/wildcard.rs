//! Wildcard field-name patterns
//!
//! `*` matches any run of characters, `?` exactly one. Matching is
//! case-insensitive and anchored on both ends.

use regex::Regex;

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct WildcardMatcher {
    pattern: String,
    regex: Regex,
}

impl WildcardMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Self::pattern_to_regex(pattern).map_err(|e| {
            Error::Schema(format!("Invalid wildcard pattern '{}': {}", pattern, e))
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    fn pattern_to_regex(pattern: &str) -> std::result::Result<Regex, regex::Error> {
        let mut regex_str = String::from("(?is)^");
        let mut literal = String::new();
        let mut previous_star = false;

        for c in pattern.chars() {
            match c {
                '*' | '?' => {
                    if !literal.is_empty() {
                        regex_str.push_str(&regex::escape(&literal));
                        literal.clear();
                    }
                    if c == '?' {
                        regex_str.push('.');
                        previous_star = false;
                    } else if !previous_star {
                        // consecutive stars collapse into one
                        regex_str.push_str(".*");
                        previous_star = true;
                    }
                }
                _ => {
                    literal.push(c);
                    previous_star = false;
                }
            }
        }
        if !literal.is_empty() {
            regex_str.push_str(&regex::escape(&literal));
        }

        regex_str.push('$');
        Regex::new(&regex_str)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, name: &str) -> bool {
        WildcardMatcher::new(pattern).unwrap().matches(name)
    }

    #[test]
    fn test_wildcard_suffix() {
        assert!(matches("tag_*", "tag_color"));
        assert!(matches("tag_*", "tag_"));
        assert!(!matches("tag_*", "tags_color"));
    }

    #[test]
    fn test_wildcard_prefix_and_middle() {
        assert!(matches("*_i", "price_i"));
        assert!(matches("attr_*_s", "attr_color_s"));
        assert!(matches("attr_*_s", "attr__s"));
        assert!(!matches("attr_*_s", "attr_color_i"));
    }

    #[test]
    fn test_question_mark_is_single_char() {
        assert!(matches("f?", "f1"));
        assert!(!matches("f?", "f"));
        assert!(!matches("f?", "f12"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(matches("Tag_*", "TAG_color"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert!(matches("price.$*", "price.$usd"));
        assert!(!matches("price.$*", "priceX$usd"));
        assert!(matches("a+b*", "a+bc"));
        assert!(!matches("a+b*", "aabc"));
    }

    #[test]
    fn test_repeated_stars() {
        assert!(matches("a**b", "axxb"));
        assert!(matches("a**b", "ab"));
    }
}
