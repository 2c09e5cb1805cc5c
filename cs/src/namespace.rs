//! Namespaces and key validation

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::StoreError;

const MAX_KEY_LEN: usize = 200;

/// An ordered tuple of string segments that scopes a set of keys
///
/// Segments and keys share one alphabet (ASCII alphanumerics, `-`, `_`, `.`)
/// so a namespace maps onto a directory path without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace(Vec<String>);

impl Namespace {
    /// Build a namespace from already-clean segments
    pub fn new<I, S>(segments: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(StoreError::InvalidNamespace {
                namespace: String::new(),
                reason: "at least one segment is required".to_string(),
            });
        }
        for segment in &segments {
            check_token(segment).map_err(|reason| StoreError::InvalidNamespace {
                namespace: segments.join("/"),
                reason,
            })?;
        }
        Ok(Self(segments))
    }

    /// Parse a `/`-separated namespace such as `demo_user/tools_updates`
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        Self::new(raw.split('/').filter(|s| !s.is_empty()))
    }

    /// Namespace nested one level below this one
    pub fn child(&self, segment: &str) -> Result<Self, StoreError> {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self::new(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// Validate a record key
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    check_token(key).map_err(|reason| StoreError::InvalidKey {
        key: key.to_string(),
        reason,
    })
}

/// Turn arbitrary text (an email, a user name) into a valid namespace segment
///
/// Periods are not allowed in identifiers coming from the outside world, so
/// `a.b@example.com` becomes `a_b_at_example_com`.
pub fn sanitize_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        match c {
            '@' => out.push_str("_at_"),
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => out.push(c),
            _ => out.push('_'),
        }
    }
    if out.is_empty() {
        out.push_str("anonymous");
    }
    out.truncate(MAX_KEY_LEN);
    out
}

fn check_token(token: &str) -> Result<(), String> {
    if token.is_empty() {
        return Err("must not be empty".to_string());
    }
    if token.len() > MAX_KEY_LEN {
        return Err(format!("longer than {} bytes", MAX_KEY_LEN));
    }
    if token.starts_with('.') {
        return Err("must not start with '.'".to_string());
    }
    if let Some(bad) = token
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || *c == '.'))
    {
        return Err(format!("contains '{}'", bad));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_namespace_display_and_parse() {
        let ns = Namespace::new(["demo_user", "tools_updates"]).unwrap();
        assert_eq!(ns.to_string(), "demo_user/tools_updates");
        assert_eq!(Namespace::parse("demo_user/tools_updates").unwrap(), ns);
    }

    #[test]
    fn test_namespace_rejects_bad_segments() {
        assert!(Namespace::new(Vec::<String>::new()).is_err());
        assert!(Namespace::new(["ok", ""]).is_err());
        assert!(Namespace::new(["a b"]).is_err());
        assert!(Namespace::new(["..", "x"]).is_err());
    }

    #[test]
    fn test_child() {
        let ns = Namespace::new(["u", "f"]).unwrap();
        let child = ns.child("threads").unwrap();
        assert_eq!(child.segments(), &["u", "f", "threads"]);
        assert!(ns.child("a/b").is_err());
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("main_status").is_ok());
        assert!(validate_key("working-tool-status-update").is_ok());
        assert!(validate_key("thread-0192").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key(".hidden").is_err());
    }

    #[test]
    fn test_sanitize_segment_email() {
        assert_eq!(sanitize_segment("jane.doe@example.com"), "jane_doe_at_example_com");
        assert_eq!(sanitize_segment("   "), "anonymous");
    }

    proptest! {
        #[test]
        fn sanitized_segments_are_always_valid(raw in ".{0,300}") {
            let segment = sanitize_segment(&raw);
            prop_assert!(Namespace::new([segment]).is_ok());
        }
    }
}
