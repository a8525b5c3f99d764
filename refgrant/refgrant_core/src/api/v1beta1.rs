//! The `v1beta1` schema, the canonical version for conversion.
//!
//! Every other served version converts into these types before a
//! [`Grant`] is built.

use serde::{Deserialize, Serialize};

use super::meta::{ListMeta, ObjectMeta};
use crate::error::SchemaError;
use crate::types::{FromEntry, Grant, GrantListing, ResourceVersion, TargetName, ToEntry};

/// Version name within the API group.
pub const VERSION: &str = "v1beta1";

/// Kinds of resources in other namespaces that are trusted to reference
/// the specified kinds of resources in the grant's own namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceGrant {
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Desired trust relationship
    #[serde(default)]
    pub spec: ReferenceGrantSpec,
}

/// A cross namespace relationship that is trusted.
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

/// A list of grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceGrantList {
    /// List metadata
    #[serde(default)]
    pub metadata: ListMeta,

    /// Items in the list
    #[serde(default)]
    pub items: Vec<ReferenceGrant>,
}

impl ReferenceGrant {
    /// Build the engine's grant snapshot from this object.
    ///
    /// Entry content is not validated here; the index decides whether the
    /// grant is well formed.
    pub fn to_grant(&self) -> Result<Grant, SchemaError> {
        let mut grant = Grant::new(
            self.metadata.namespace.clone(),
            self.metadata.name.clone(),
            self.metadata.version()?,
        );
        if let Some(uid) = self.metadata.uid {
            grant = grant.with_uid(uid);
        }
        for from in &self.spec.from {
            grant = grant.with_from(FromEntry::new(
                from.namespace.clone(),
                from.group.clone(),
                from.kind.clone(),
            ));
        }
        for to in &self.spec.to {
            grant = grant.with_to(ToEntry {
                group: to.group.clone(),
                kind: to.kind.clone(),
                name: TargetName::from(to.name.clone()),
            });
        }
        Ok(grant)
    }
}

impl ReferenceGrantList {
    /// Build an authoritative listing from this list.
    ///
    /// When the list carries no collection version, the newest item
    /// version stands in for it.
    pub fn to_listing(&self) -> Result<GrantListing, SchemaError> {
        let grants = self
            .items
            .iter()
            .map(ReferenceGrant::to_grant)
            .collect::<Result<Vec<_>, _>>()?;

        let version = if self.metadata.resource_version.is_empty() {
            grants
                .iter()
                .map(Grant::version)
                .max()
                .unwrap_or(ResourceVersion::ZERO)
        } else {
            self.metadata.resource_version.parse()?
        };

        Ok(GrantListing::new(version, grants))
    }
}
