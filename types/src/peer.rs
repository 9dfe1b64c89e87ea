//! Peer identity handling.
//!
//! Group members are addressed two ways: the short display name the roster
//! API returns (`"Addra"`) and the realm-qualified form that message senders
//! carry (`"Addra-TarroBlood"`). Two different players on different realms
//! can share a display name, so matching prefers the qualified form whenever
//! one is available.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A group member's name, with optional realm qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerName {
    display: String,
    realm: Option<String>,
}

impl PeerName {
    /// Build a name from a short display form with no realm qualifier.
    pub fn short(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            realm: None,
        }
    }

    /// Build a realm-qualified name.
    pub fn qualified(display: impl Into<String>, realm: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            realm: Some(realm.into()),
        }
    }

    /// Parse a sender string as delivered by the channel transport.
    ///
    /// Splits on the first `-`: `"Addra-TarroBlood"` becomes display `Addra`
    /// with realm `TarroBlood`; a bare `"Addra"` has no realm.
    ///
    /// # Examples
    /// ```
    /// use kickwatch_types::PeerName;
    /// let p = PeerName::parse("Addra-TarroBlood");
    /// assert_eq!(p.display(), "Addra");
    /// assert_eq!(p.full(), "Addra-TarroBlood");
    /// assert_eq!(PeerName::parse("Addra").full(), "Addra");
    /// ```
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('-') {
            Some((display, realm)) if !display.is_empty() && !realm.is_empty() => {
                Self::qualified(display, realm)
            }
            _ => Self::short(raw),
        }
    }

    /// Short display form (no realm).
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Realm qualifier, if known.
    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }

    /// Fully qualified form when a realm is known, display form otherwise.
    pub fn full(&self) -> String {
        match &self.realm {
            Some(realm) => format!("{}-{}", self.display, realm),
            None => self.display.clone(),
        }
    }

    /// Whether this name refers to the same player as `other`.
    ///
    /// Qualified forms must match exactly; if either side lacks a realm the
    /// comparison falls back to display names.
    pub fn matches(&self, other: &PeerName) -> bool {
        if self.display != other.display {
            return false;
        }
        match (&self.realm, &other.realm) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

impl fmt::Display for PeerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.realm {
            Some(realm) => write!(f, "{}-{}", self.display, realm),
            None => write!(f, "{}", self.display),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_qualified() {
        let p = PeerName::parse("Mira-ShadowCouncil");
        assert_eq!(p.display(), "Mira");
        assert_eq!(p.realm(), Some("ShadowCouncil"));
        assert_eq!(p.full(), "Mira-ShadowCouncil");
    }

    #[test]
    fn test_parse_short() {
        let p = PeerName::parse("Mira");
        assert_eq!(p.display(), "Mira");
        assert_eq!(p.realm(), None);
        assert_eq!(p.full(), "Mira");
    }

    #[test]
    fn test_parse_degenerate_dash_forms() {
        // Leading/trailing dash is not a realm separator
        assert_eq!(PeerName::parse("-Realm").display(), "-Realm");
        assert_eq!(PeerName::parse("Mira-").display(), "Mira-");
    }

    #[test]
    fn test_matches_prefers_qualified() {
        let a = PeerName::parse("Mira-ShadowCouncil");
        let b = PeerName::parse("Mira-TarroBlood");
        let short = PeerName::parse("Mira");
        assert!(!a.matches(&b));
        assert!(a.matches(&short));
        assert!(short.matches(&b));
    }
}
