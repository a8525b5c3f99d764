//! List/watch feed records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Grant, GrantKey, ResourceVersion};

/// The kind of change a watch event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    /// The object was created.
    Added,
    /// The object was changed.
    Modified,
    /// The object was removed.
    Deleted,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "ADDED"),
            Self::Modified => write!(f, "MODIFIED"),
            Self::Deleted => write!(f, "DELETED"),
        }
    }
}

/// One incremental change delivered by the watch stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantEvent {
    /// A grant appeared.
    Added(Grant),

    /// A grant's entries changed.
    Modified(Grant),

    /// A grant was removed.
    Deleted {
        /// Identity of the removed grant
        key: GrantKey,
        /// Version at which the removal happened
        version: ResourceVersion,
    },
}

impl GrantEvent {
    /// Build a deletion event for the last known state of a grant.
    pub fn deleted(grant: &Grant) -> Self {
        Self::Deleted {
            key: grant.key().clone(),
            version: grant.version(),
        }
    }

    /// The kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Added(_) => EventKind::Added,
            Self::Modified(_) => EventKind::Modified,
            Self::Deleted { .. } => EventKind::Deleted,
        }
    }

    /// The key of the grant this event concerns.
    pub fn key(&self) -> &GrantKey {
        match self {
            Self::Added(grant) | Self::Modified(grant) => grant.key(),
            Self::Deleted { key, .. } => key,
        }
    }

    /// The version carried by this event.
    pub fn version(&self) -> ResourceVersion {
        match self {
            Self::Added(grant) | Self::Modified(grant) => grant.version(),
            Self::Deleted { version, .. } => *version,
        }
    }
}

/// A full listing of every grant, as returned by the list half of
/// list/watch.
///
/// A listing is authoritative: anything absent from it no longer exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantListing {
    /// Collection version the listing was taken at.
    pub version: ResourceVersion,

    /// Every grant that existed at `version`.
    pub grants: Vec<Grant>,
}

impl GrantListing {
    /// Create a listing.
    pub fn new(version: ResourceVersion, grants: Vec<Grant>) -> Self {
        Self { version, grants }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FromEntry, ToEntry};

    #[test]
    fn test_event_accessors() {
        let grant = Grant::new("b", "g1", ResourceVersion(7))
            .with_from(FromEntry::new("a", "", "Secret"))
            .with_to(ToEntry::new("", "Secret"));

        let added = GrantEvent::Added(grant.clone());
        assert_eq!(added.kind(), EventKind::Added);
        assert_eq!(added.key(), &GrantKey::new("b", "g1"));
        assert_eq!(added.version(), ResourceVersion(7));

        let deleted = GrantEvent::deleted(&grant);
        assert_eq!(deleted.kind(), EventKind::Deleted);
        assert_eq!(deleted.key(), grant.key());
    }

    #[test]
    fn test_event_kind_wire_names() {
        let kind: EventKind = serde_json::from_str(r#""MODIFIED""#).unwrap();
        assert_eq!(kind, EventKind::Modified);
        assert_eq!(EventKind::Deleted.to_string(), "DELETED");
    }
}
