//! URL match patterns.
//!
//! `*` matches any substring (including `/`); every other character is
//! literal; the whole URL must match.

use regex::Regex;

/// Compile a glob pattern into an anchored regex.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{body}$"))
}

/// Whether any of `patterns` accepts `url`.
pub fn matches_any(patterns: &[String], url: &str) -> bool {
    patterns.iter().any(|pattern| match glob_to_regex(pattern) {
        Ok(re) => re.is_match(url),
        Err(e) => {
            crate::debug!("registry"; "unusable pattern `{}`: {}", pattern, e);
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_matches_any_substring() {
        let re = glob_to_regex("https://a.example/*").unwrap();
        assert!(re.is_match("https://a.example/"));
        assert!(re.is_match("https://a.example/deep/path?q=1"));
        assert!(!re.is_match("https://b.example/"));
    }

    #[test]
    fn test_anchored() {
        let re = glob_to_regex("https://a.example/page").unwrap();
        assert!(re.is_match("https://a.example/page"));
        assert!(!re.is_match("https://a.example/page2"));
        assert!(!re.is_match("xhttps://a.example/page"));
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let re = glob_to_regex("https://a.example/?q=(1)").unwrap();
        assert!(re.is_match("https://a.example/?q=(1)"));
        assert!(!re.is_match("https://aXexample/?q=(1)"));
    }

    #[test]
    fn test_scheme_wildcard() {
        let patterns = vec!["*://*/*".to_string()];
        assert!(matches_any(&patterns, "http://localhost/"));
        assert!(!matches_any(&patterns, "about:blank"));
        assert!(!matches_any(&[], "http://localhost/"));
    }
}
