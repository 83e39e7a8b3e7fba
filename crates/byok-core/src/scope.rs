//! Consent scopes
//!
//! A scope is a dot-separated path of `[a-z0-9_-]` segments such as
//! `domain.finance.read`. A granted scope may end in a single `.*` segment
//! (or be exactly `*`) to cover every scope below that prefix. Requested
//! scopes are matched against granted ones either exactly or by such a
//! wildcard prefix; nothing else is inferred.

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scope that covers everything
pub const WILDCARD: &str = "*";

/// Scope required for vault metadata and index reads
pub const VAULT_METADATA_READ: &str = "vault.metadata.read";

/// Longest accepted scope string
pub const MAX_SCOPE_LEN: usize = 256;

/// Scopes granted to the vault holder's own session tokens
pub const OWNER_SCOPES: [&str; 2] = ["vault.*", "domain.*"];

/// A validated consent scope
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConsentScope(String);

/// Action part of a domain scope
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScopeAction {
    Read,
    Write,
    Delete,
}

impl ScopeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
        }
    }
}

/// Check a single non-wildcard segment
pub(crate) fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

impl ConsentScope {
    /// Parse and validate a scope string
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(CoreError::InvalidScope("scope must not be empty".to_string()));
        }
        if s.len() > MAX_SCOPE_LEN {
            return Err(CoreError::InvalidScope(format!(
                "scope exceeds {} characters",
                MAX_SCOPE_LEN
            )));
        }
        if s == WILDCARD {
            return Ok(Self(s.to_string()));
        }

        let segments: Vec<&str> = s.split('.').collect();
        let last = segments.len() - 1;
        for (i, segment) in segments.iter().enumerate() {
            if *segment == WILDCARD && i == last {
                continue;
            }
            if !is_valid_segment(segment) {
                return Err(CoreError::InvalidScope(format!(
                    "invalid segment '{}' in scope '{}'",
                    segment, s
                )));
            }
        }
        Ok(Self(s.to_string()))
    }

    /// `domain.<domain>.<action>`
    pub fn domain(domain: &str, action: ScopeAction) -> Result<Self> {
        if !is_valid_segment(domain) {
            return Err(CoreError::InvalidScope(format!("invalid domain '{}'", domain)));
        }
        Ok(Self(format!("domain.{}.{}", domain, action.as_str())))
    }

    /// The `vault.metadata.read` scope
    pub fn metadata_read() -> Self {
        Self(VAULT_METADATA_READ.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this scope is a wildcard grant
    pub fn is_wildcard(&self) -> bool {
        self.wildcard_prefix().is_some()
    }

    /// Prefix covered by a wildcard, `""` for the global wildcard
    fn wildcard_prefix(&self) -> Option<&str> {
        if self.0 == WILDCARD {
            return Some("");
        }
        self.0.strip_suffix(".*")
    }

    /// Whether holding this scope permits `requested`
    pub fn contains(&self, requested: &ConsentScope) -> bool {
        if self == requested {
            return true;
        }
        match self.wildcard_prefix() {
            None => false,
            Some("") => true,
            Some(prefix) => {
                let r = requested.as_str();
                r.len() > prefix.len() + 1
                    && r.starts_with(prefix)
                    && r.as_bytes()[prefix.len()] == b'.'
            }
        }
    }
}

impl fmt::Display for ConsentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ConsentScope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ConsentScope {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ConsentScope> for String {
    fn from(scope: ConsentScope) -> Self {
        scope.0
    }
}

/// The set of scopes carried by a token
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeSet(Vec<ConsentScope>);

impl ScopeSet {
    /// Parse a list of scope strings, dropping duplicates and keeping order
    pub fn parse_all<S: AsRef<str>>(scopes: &[S]) -> Result<Self> {
        let mut set: Vec<ConsentScope> = Vec::with_capacity(scopes.len());
        for s in scopes {
            let scope = ConsentScope::parse(s.as_ref())?;
            if !set.contains(&scope) {
                set.push(scope);
            }
        }
        Ok(Self(set))
    }

    /// Owner scopes (`vault.*`, `domain.*`)
    pub fn owner() -> Self {
        Self(OWNER_SCOPES.iter().map(|s| ConsentScope(s.to_string())).collect())
    }

    /// Whether any granted scope permits `requested`
    pub fn permits(&self, requested: &ConsentScope) -> bool {
        self.0.iter().any(|granted| granted.contains(requested))
    }

    /// Whether every scope of `other` is permitted by this set
    pub fn covers(&self, other: &ScopeSet) -> bool {
        other.0.iter().all(|s| self.permits(s))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConsentScope> {
        self.0.iter()
    }

    /// Scopes as plain strings, in grant order
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|s| s.0.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("*")]
    #[case("vault.metadata.read")]
    #[case("domain.finance.read")]
    #[case("domain.*")]
    #[case("domain.health-records.write")]
    #[case("domain.food_prefs.*")]
    fn test_valid_scopes(#[case] scope: &str) {
        assert!(ConsentScope::parse(scope).is_ok(), "{}", scope);
    }

    #[rstest]
    #[case("")]
    #[case("domain..read")]
    #[case("Domain.finance.read")]
    #[case("domain.*.read")]
    #[case("*.read")]
    #[case("domain.fin ance.read")]
    #[case(".domain")]
    #[case("domain.")]
    #[case("domain.fin*")]
    fn test_invalid_scopes(#[case] scope: &str) {
        assert!(
            matches!(ConsentScope::parse(scope), Err(CoreError::InvalidScope(_))),
            "{}",
            scope
        );
    }

    #[rstest]
    #[case("domain.finance.read", "domain.finance.read", true)]
    #[case("domain.finance.read", "domain.finance.write", false)]
    #[case("domain.*", "domain.finance.read", true)]
    #[case("domain.*", "domain", false)]
    #[case("domain.*", "domainx.finance.read", false)]
    #[case("domain.finance.*", "domain.food.read", false)]
    #[case("domain.finance.*", "domain.finance.read", true)]
    #[case("*", "vault.metadata.read", true)]
    #[case("vault.*", "domain.finance.read", false)]
    #[case("domain.finance.read", "domain.*", false)]
    #[case("domain.*", "domain.finance.*", true)]
    fn test_containment(#[case] granted: &str, #[case] requested: &str, #[case] expected: bool) {
        let g = ConsentScope::parse(granted).unwrap();
        let r = ConsentScope::parse(requested).unwrap();
        assert_eq!(g.contains(&r), expected, "{} ⊇ {}", granted, requested);
    }

    #[test]
    fn test_domain_scope() {
        let scope = ConsentScope::domain("finance", ScopeAction::Write).unwrap();
        assert_eq!(scope.as_str(), "domain.finance.write");
        assert!(ConsentScope::domain("Fin.ance", ScopeAction::Read).is_err());
        assert!(ConsentScope::domain("*", ScopeAction::Read).is_err());
    }

    #[test]
    fn test_scope_set_dedup_and_covers() {
        let set = ScopeSet::parse_all(&["domain.finance.read", "domain.finance.read", "vault.*"]).unwrap();
        assert_eq!(set.len(), 2);

        let narrower = ScopeSet::parse_all(&["vault.metadata.read"]).unwrap();
        assert!(set.covers(&narrower));
        assert!(!narrower.covers(&set));

        assert!(ScopeSet::owner().permits(&ConsentScope::metadata_read()));
    }

    #[test]
    fn test_serde_validates() {
        let set: ScopeSet = serde_json::from_str(r#"["domain.food.read"]"#).unwrap();
        assert_eq!(set.to_strings(), vec!["domain.food.read"]);
        assert!(serde_json::from_str::<ScopeSet>(r#"["domain.*.read"]"#).is_err());
    }

    proptest! {
        #[test]
        fn prop_exact_scope_contains_itself_only_under_its_prefix(
            domain in "[a-z][a-z0-9_-]{0,15}",
            other in "[a-z][a-z0-9_-]{0,15}",
        ) {
            let read = ConsentScope::domain(&domain, ScopeAction::Read).unwrap();
            let wildcard = ConsentScope::parse(&format!("domain.{}.*", domain)).unwrap();
            prop_assert!(read.contains(&read));
            prop_assert!(wildcard.contains(&read));

            let other_read = ConsentScope::domain(&other, ScopeAction::Read).unwrap();
            prop_assert_eq!(wildcard.contains(&other_read), domain == other);
        }
    }
}
