//! The grant entity and its entries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{GrantError, SchemaError};
use crate::types::ReferenceTriple;

/// Identity of a grant: the namespace it was declared in and its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrantKey {
    /// Owner namespace, which is also the target-side namespace.
    pub namespace: String,

    /// Grant name, unique within the namespace.
    pub name: String,
}

impl GrantKey {
    /// Create a new grant key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for GrantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Monotonic object version delivered by the event feed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ResourceVersion(pub u64);

impl ResourceVersion {
    /// The version that precedes every real version.
    pub const ZERO: ResourceVersion = ResourceVersion(0);

    /// Get the raw version number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceVersion {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(ResourceVersion)
            .map_err(|_| SchemaError::InvalidResourceVersion(s.to_string()))
    }
}

/// A trusted source class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FromEntry {
    /// Namespace the referencing objects live in.
    pub namespace: String,

    /// API group of the referencing objects; empty for the core group.
    #[serde(default)]
    pub group: String,

    /// Kind of the referencing objects.
    pub kind: String,
}

impl FromEntry {
    /// Create a new from entry.
    pub fn new(
        namespace: impl Into<String>,
        group: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            group: group.into(),
            kind: kind.into(),
        }
    }

    /// Whether this entry trusts the given referencing object.
    pub fn matches(&self, from: &ReferenceTriple) -> bool {
        self.namespace == from.namespace && self.group == from.group && self.kind == from.kind
    }
}

/// Which names of a target kind a to entry admits.
///
/// This is explicit rather than an empty string: on the wire an omitted
/// name and an empty name both mean [`TargetName::All`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum TargetName {
    /// Every object of the kind.
    #[default]
    All,

    /// Exactly the named object.
    Named(String),
}

impl TargetName {
    /// Whether a referenced object with the given name is admitted.
    ///
    /// A reference without a name only satisfies [`TargetName::All`].
    pub fn admits(&self, name: Option<&str>) -> bool {
        match self {
            Self::All => true,
            Self::Named(expected) => name == Some(expected.as_str()),
        }
    }
}

impl From<Option<String>> for TargetName {
    fn from(name: Option<String>) -> Self {
        match name {
            Some(name) if !name.is_empty() => Self::Named(name),
            _ => Self::All,
        }
    }
}

impl From<TargetName> for Option<String> {
    fn from(name: TargetName) -> Self {
        match name {
            TargetName::All => None,
            TargetName::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "*"),
            Self::Named(name) => write!(f, "{}", name),
        }
    }
}

/// An allowed target class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToEntry {
    /// API group of the referenced objects; empty for the core group.
    #[serde(default)]
    pub group: String,

    /// Kind of the referenced objects.
    pub kind: String,

    /// Which objects of the kind may be referenced.
    #[serde(default)]
    pub name: TargetName,
}

impl ToEntry {
    /// Create a to entry admitting every object of the kind.
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
            name: TargetName::All,
        }
    }

    /// Create a to entry admitting exactly one named object.
    pub fn named(group: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
            name: TargetName::from(Some(name.into())),
        }
    }

    /// Whether this entry admits the given referenced object.
    pub fn matches(&self, to: &ReferenceTriple) -> bool {
        self.group == to.group && self.kind == to.kind && self.name.admits(to.name.as_deref())
    }
}

/// An immutable snapshot of one trust declaration.
///
/// A grant is owned by its target namespace: it can only ever admit
/// references *into* `key.namespace`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    key: GrantKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uid: Option<Uuid>,
    from: BTreeSet<FromEntry>,
    to: BTreeSet<ToEntry>,
    version: ResourceVersion,
}

impl Grant {
    /// Create a grant with no entries.
    ///
    /// Entries are added with [`Grant::with_from`] and [`Grant::with_to`];
    /// a grant left without either is malformed.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        version: ResourceVersion,
    ) -> Self {
        Self {
            key: GrantKey::new(namespace, name),
            uid: None,
            from: BTreeSet::new(),
            to: BTreeSet::new(),
            version,
        }
    }

    /// Add a trusted source class.
    pub fn with_from(mut self, entry: FromEntry) -> Self {
        self.from.insert(entry);
        self
    }

    /// Add an allowed target class.
    pub fn with_to(mut self, entry: ToEntry) -> Self {
        self.to.insert(entry);
        self
    }

    /// Set the object uid.
    pub fn with_uid(mut self, uid: Uuid) -> Self {
        self.uid = Some(uid);
        self
    }

    /// Restamp the grant with a different version.
    pub fn with_version(mut self, version: ResourceVersion) -> Self {
        self.version = version;
        self
    }

    /// The grant identity.
    pub fn key(&self) -> &GrantKey {
        &self.key
    }

    /// The owner (and target-side) namespace.
    pub fn namespace(&self) -> &str {
        &self.key.namespace
    }

    /// The grant name.
    pub fn name(&self) -> &str {
        &self.key.name
    }

    /// The object uid, if the feed supplied one.
    pub fn uid(&self) -> Option<Uuid> {
        self.uid
    }

    /// The version this snapshot was taken at.
    pub fn version(&self) -> ResourceVersion {
        self.version
    }

    /// Trusted source classes.
    pub fn from_entries(&self) -> impl Iterator<Item = &FromEntry> {
        self.from.iter()
    }

    /// Allowed target classes.
    pub fn to_entries(&self) -> impl Iterator<Item = &ToEntry> {
        self.to.iter()
    }

    /// Check the grant is well formed.
    ///
    /// `max_entries` bounds each entry list.
    pub fn validate(&self, max_entries: usize) -> Result<(), GrantError> {
        if self.key.namespace.is_empty() || self.key.name.is_empty() {
            return Err(GrantError::MissingIdentity(self.key.clone()));
        }
        if self.from.is_empty() {
            return Err(GrantError::EmptyFrom(self.key.clone()));
        }
        if self.to.is_empty() {
            return Err(GrantError::EmptyTo(self.key.clone()));
        }
        for (list, count) in [("from", self.from.len()), ("to", self.to.len())] {
            if count > max_entries {
                return Err(GrantError::TooManyEntries {
                    key: self.key.clone(),
                    list,
                    count,
                    limit: max_entries,
                });
            }
        }
        for entry in &self.from {
            if entry.kind.is_empty() {
                return Err(GrantError::MissingKind {
                    key: self.key.clone(),
                    list: "from",
                });
            }
            if entry.namespace.is_empty() {
                return Err(GrantError::MissingNamespace(self.key.clone()));
            }
        }
        if self.to.iter().any(|entry| entry.kind.is_empty()) {
            return Err(GrantError::MissingKind {
                key: self.key.clone(),
                list: "to",
            });
        }
        Ok(())
    }

    /// Whether this grant admits a reference from `from` to `to`.
    ///
    /// Entries are OR-ed within each list. The target must live in the
    /// grant's own namespace.
    pub fn admits(&self, from: &ReferenceTriple, to: &ReferenceTriple) -> bool {
        to.namespace == self.key.namespace
            && self.from.iter().any(|entry| entry.matches(from))
            && self.to.iter().any(|entry| entry.matches(to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_grant() -> Grant {
        Grant::new("b", "g1", ResourceVersion(1))
            .with_from(FromEntry::new("a", "", "Secret"))
            .with_to(ToEntry::new("", "Secret"))
    }

    #[test]
    fn test_admits_matching_reference() {
        let grant = secret_grant();
        let from = ReferenceTriple::named("a", "", "Secret", "s1");
        let to = ReferenceTriple::named("b", "", "Secret", "s1");
        assert!(grant.admits(&from, &to));
    }

    #[test]
    fn test_never_admits_outside_own_namespace() {
        let grant = secret_grant();
        let from = ReferenceTriple::named("a", "", "Secret", "s1");
        let to = ReferenceTriple::named("c", "", "Secret", "s1");
        assert!(!grant.admits(&from, &to));
    }

    #[test]
    fn test_group_must_match_exactly() {
        let grant = secret_grant();
        let from = ReferenceTriple::new("a", "core", "Secret");
        let to = ReferenceTriple::named("b", "", "Secret", "s1");
        assert!(!grant.admits(&from, &to));
    }

    #[test]
    fn test_target_name_scoping() {
        let entry = ToEntry::named("", "Secret", "only-this");
        assert!(entry.matches(&ReferenceTriple::named("b", "", "Secret", "only-this")));
        assert!(!entry.matches(&ReferenceTriple::named("b", "", "Secret", "other")));
        assert!(!entry.matches(&ReferenceTriple::new("b", "", "Secret")));
    }

    #[test]
    fn test_empty_name_means_all() {
        let entry = ToEntry::named("", "Secret", "");
        assert_eq!(entry.name, TargetName::All);
        assert!(entry.matches(&ReferenceTriple::named("b", "", "Secret", "anything")));
    }

    #[test]
    fn test_target_name_serde() {
        let entry: ToEntry = serde_json::from_str(r#"{"kind":"Secret"}"#).unwrap();
        assert_eq!(entry.name, TargetName::All);

        let entry: ToEntry = serde_json::from_str(r#"{"kind":"Secret","name":""}"#).unwrap();
        assert_eq!(entry.name, TargetName::All);

        let entry: ToEntry = serde_json::from_str(r#"{"kind":"Secret","name":"x"}"#).unwrap();
        assert_eq!(entry.name, TargetName::Named("x".to_string()));
    }

    #[test]
    fn test_validate_rejects_empty_lists() {
        let no_to = Grant::new("b", "g1", ResourceVersion(1)).with_from(FromEntry::new("a", "", "Secret"));
        assert!(matches!(no_to.validate(16), Err(GrantError::EmptyTo(_))));

        let no_from = Grant::new("b", "g1", ResourceVersion(1)).with_to(ToEntry::new("", "Secret"));
        assert!(matches!(no_from.validate(16), Err(GrantError::EmptyFrom(_))));

        assert!(secret_grant().validate(16).is_ok());
    }

    #[test]
    fn test_validate_rejects_oversized_lists() {
        let mut grant = Grant::new("b", "g1", ResourceVersion(1)).with_to(ToEntry::new("", "Secret"));
        for i in 0..3 {
            grant = grant.with_from(FromEntry::new(format!("ns{}", i), "", "Secret"));
        }
        assert!(matches!(
            grant.validate(2),
            Err(GrantError::TooManyEntries { list: "from", count: 3, limit: 2, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_incomplete_entries() {
        let grant = Grant::new("b", "g1", ResourceVersion(1))
            .with_from(FromEntry::new("", "", "Secret"))
            .with_to(ToEntry::new("", "Secret"));
        assert!(matches!(grant.validate(16), Err(GrantError::MissingNamespace(_))));

        let grant = Grant::new("b", "g1", ResourceVersion(1))
            .with_from(FromEntry::new("a", "", "Secret"))
            .with_to(ToEntry::new("", ""));
        assert!(matches!(grant.validate(16), Err(GrantError::MissingKind { list: "to", .. })));
    }

    #[test]
    fn test_duplicate_entries_collapse() {
        let grant = secret_grant().with_from(FromEntry::new("a", "", "Secret"));
        assert_eq!(grant.from_entries().count(), 1);
    }

    #[test]
    fn test_resource_version_parse() {
        assert_eq!("42".parse::<ResourceVersion>().unwrap(), ResourceVersion(42));
        assert!("abc".parse::<ResourceVersion>().is_err());
        assert!(ResourceVersion(2) > ResourceVersion(1));
    }
}
