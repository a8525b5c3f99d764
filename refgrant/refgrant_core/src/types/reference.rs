//! Reference endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The API group name of the core group.
///
/// The core group is written as the empty string; there is no other
/// group wildcard.
pub const CORE_GROUP: &str = "";

/// One side of a candidate cross-namespace reference.
///
/// The same type identifies the referencing object (`from`) and the
/// referenced object (`to`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceTriple {
    /// Namespace of the object.
    pub namespace: String,

    /// API group of the object; empty for the core group.
    #[serde(default)]
    pub group: String,

    /// Kind of the object.
    pub kind: String,

    /// Name of the object, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ReferenceTriple {
    /// Create an unnamed reference endpoint.
    pub fn new(
        namespace: impl Into<String>,
        group: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            group: group.into(),
            kind: kind.into(),
            name: None,
        }
    }

    /// Create a named reference endpoint.
    pub fn named(
        namespace: impl Into<String>,
        group: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::new(namespace, group, kind).with_name(name)
    }

    /// Set the object name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Whether the object lives in the core API group.
    pub fn is_core_group(&self) -> bool {
        self.group == CORE_GROUP
    }
}

impl fmt::Display for ReferenceTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let group = if self.is_core_group() {
            "core"
        } else {
            &self.group
        };
        write!(f, "{}/{}/{}", self.namespace, group, self.kind)?;
        if let Some(name) = &self.name {
            write!(f, "/{}", name)?;
        }
        Ok(())
    }
}
