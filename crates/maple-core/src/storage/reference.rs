//! Bundle references.
//!
//! A reference is `name[:tag]`. Only the first colon separates name from
//! tag, so `a:b:c` names tag `b:c` of bundle `a`. A missing tag means
//! `latest`.

use crate::config::StoreConfig;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// `(name, tag)` pair naming at most one manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    pub name: String,
    pub tag: String,
}

impl Reference {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }

    /// Split on the first colon. Total: every string is at least a bare name.
    pub fn parse(s: &str) -> Self {
        match s.split_once(':') {
            Some((name, tag)) => Self::new(name, tag),
            None => Self::new(s, StoreConfig::DEFAULT_TAG),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

impl FromStr for Reference {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for Reference {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Reference::parse("openvla"), Reference::new("openvla", "latest"));
        assert_eq!(Reference::parse("openvla:7b"), Reference::new("openvla", "7b"));
        assert_eq!(Reference::parse("a:b:c"), Reference::new("a", "b:c"));
    }

    #[test]
    fn test_parse_edge_cases() {
        assert_eq!(Reference::parse(""), Reference::new("", "latest"));
        assert_eq!(Reference::parse("m:"), Reference::new("m", ""));
        assert_eq!(Reference::parse(":v1"), Reference::new("", "v1"));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let reference = Reference::new("gr00t", "n1.5");
        assert_eq!(reference.to_string(), "gr00t:n1.5");
        assert_eq!(Reference::parse(&reference.to_string()), reference);
    }
}
