use regex::Regex;

/// A key pattern where `*` matches any (possibly empty) run of characters and everything else matches literally.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    regex: Regex,
}

impl KeyPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let body = pattern.split('*').map(regex::escape).collect::<Vec<_>>().join(".*");
        Ok(Self {
            regex: Regex::new(&format!("(?s)^{body}$"))?,
        })
    }

    #[inline]
    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }
}

/// Include pattern with an optional exclude pattern, as taken by [`Backend::find_keys`](crate::Backend::find_keys).
#[derive(Debug, Clone)]
pub struct KeyFilter {
    include: KeyPattern,
    exclude: Option<KeyPattern>,
}

impl KeyFilter {
    pub fn new(pattern: &str, exclude: Option<&str>) -> Result<Self, regex::Error> {
        Ok(Self {
            include: KeyPattern::new(pattern)?,
            exclude: exclude.map(KeyPattern::new).transpose()?,
        })
    }

    pub fn matches(&self, key: &str) -> bool {
        self.include.matches(key) && !self.exclude.as_ref().is_some_and(|ex| ex.matches(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: [&str; 3] = ["test:id1", "test:id1:chat:id2", "chat:id3:test:id4"];

    fn select(pattern: &str, exclude: Option<&str>) -> Vec<&'static str> {
        let filter = KeyFilter::new(pattern, exclude).unwrap();
        KEYS.into_iter().filter(|k| filter.matches(k)).collect()
    }

    #[test]
    fn wildcard_prefix() {
        assert_eq!(select("test:*", None), vec!["test:id1", "test:id1:chat:id2"]);
        assert_eq!(select("test:*", Some("*:*:*")), vec!["test:id1"]);
        assert_eq!(select("*test*", None), KEYS.to_vec());
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let p = KeyPattern::new("a.b+(c)*").unwrap();
        assert!(p.matches("a.b+(c)"));
        assert!(p.matches("a.b+(c)whatever"));
        assert!(!p.matches("axb+(c)"));
        assert!(KeyPattern::new("").unwrap().matches(""));
        assert!(!KeyPattern::new("").unwrap().matches("x"));
    }
}
