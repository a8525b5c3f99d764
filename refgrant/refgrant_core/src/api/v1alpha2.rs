//! The `v1alpha2` schema.
//!
//! Its fields have the same shape as [`v1beta1`](super::v1beta1), but it is
//! a distinct served version. Conversions in both directions are explicit
//! so each can be tested on its own.

use serde::{Deserialize, Serialize};

use super::meta::{ListMeta, ObjectMeta};
use super::v1beta1;

/// Version name within the API group.
pub const VERSION: &str = "v1alpha2";

/// A grant as served at `v1alpha2`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceGrant {
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Desired trust relationship
    #[serde(default)]
    pub spec: ReferenceGrantSpec,
}

/// Spec of a `v1alpha2` grant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceGrantSpec {
    /// Trusted namespaces and kinds
    #[serde(default)]
    pub from: Vec<ReferenceGrantFrom>,

    /// Kinds (and optionally names) that may be referenced
    #[serde(default)]
    pub to: Vec<ReferenceGrantTo>,
}

/// A trusted namespace and kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceGrantFrom {
    /// API group; empty for the core group
    #[serde(default)]
    pub group: String,

    /// Kind of the referent
    #[serde(default)]
    pub kind: String,

    /// Namespace of the referent
    #[serde(default)]
    pub namespace: String,
}

/// An allowed target kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceGrantTo {
    /// API group; empty for the core group
    #[serde(default)]
    pub group: String,

    /// Kind of the referent
    #[serde(default)]
    pub kind: String,

    /// Name of the referent; omitted means all objects of the kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A list of `v1alpha2` grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceGrantList {
    /// List metadata
    #[serde(default)]
    pub metadata: ListMeta,

    /// Items in the list
    #[serde(default)]
    pub items: Vec<ReferenceGrant>,
}

impl From<ReferenceGrantFrom> for v1beta1::ReferenceGrantFrom {
    fn from(from: ReferenceGrantFrom) -> Self {
        Self {
            group: from.group,
            kind: from.kind,
            namespace: from.namespace,
        }
    }
}

impl From<v1beta1::ReferenceGrantFrom> for ReferenceGrantFrom {
    fn from(from: v1beta1::ReferenceGrantFrom) -> Self {
        Self {
            group: from.group,
            kind: from.kind,
            namespace: from.namespace,
        }
    }
}

impl From<ReferenceGrantTo> for v1beta1::ReferenceGrantTo {
    fn from(to: ReferenceGrantTo) -> Self {
        Self {
            group: to.group,
            kind: to.kind,
            name: to.name,
        }
    }
}

impl From<v1beta1::ReferenceGrantTo> for ReferenceGrantTo {
    fn from(to: v1beta1::ReferenceGrantTo) -> Self {
        Self {
            group: to.group,
            kind: to.kind,
            name: to.name,
        }
    }
}

impl From<ReferenceGrant> for v1beta1::ReferenceGrant {
    fn from(grant: ReferenceGrant) -> Self {
        Self {
            metadata: grant.metadata,
            spec: v1beta1::ReferenceGrantSpec {
                from: grant.spec.from.into_iter().map(Into::into).collect(),
                to: grant.spec.to.into_iter().map(Into::into).collect(),
            },
        }
    }
}

impl From<v1beta1::ReferenceGrant> for ReferenceGrant {
    fn from(grant: v1beta1::ReferenceGrant) -> Self {
        Self {
            metadata: grant.metadata,
            spec: ReferenceGrantSpec {
                from: grant.spec.from.into_iter().map(Into::into).collect(),
                to: grant.spec.to.into_iter().map(Into::into).collect(),
            },
        }
    }
}

impl From<ReferenceGrantList> for v1beta1::ReferenceGrantList {
    fn from(list: ReferenceGrantList) -> Self {
        Self {
            metadata: list.metadata,
            items: list.items.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ReferenceGrant {
        ReferenceGrant {
            metadata: ObjectMeta {
                namespace: "b".to_string(),
                name: "g1".to_string(),
                resource_version: "5".to_string(),
                uid: None,
            },
            spec: ReferenceGrantSpec {
                from: vec![ReferenceGrantFrom {
                    group: String::new(),
                    kind: "Secret".to_string(),
                    namespace: "a".to_string(),
                }],
                to: vec![ReferenceGrantTo {
                    group: String::new(),
                    kind: "Secret".to_string(),
                    name: Some("x".to_string()),
                }],
            },
        }
    }

    #[test]
    fn test_convert_to_canonical() {
        let canonical: v1beta1::ReferenceGrant = sample().into();
        assert_eq!(canonical.metadata.name, "g1");
        assert_eq!(canonical.spec.from[0].namespace, "a");
        assert_eq!(canonical.spec.to[0].name.as_deref(), Some("x"));
    }

    #[test]
    fn test_convert_back_preserves_content() {
        let original = sample();
        let canonical: v1beta1::ReferenceGrant = original.clone().into();
        let back: ReferenceGrant = canonical.into();
        assert_eq!(back, original);
    }

    #[test]
    fn test_both_versions_build_the_same_grant() {
        let alpha = sample();
        let beta: v1beta1::ReferenceGrant = alpha.into();
        let grant = beta.to_grant().unwrap();
        assert_eq!(grant.from_entries().count(), 1);
        assert_eq!(grant.to_entries().count(), 1);
    }
}
