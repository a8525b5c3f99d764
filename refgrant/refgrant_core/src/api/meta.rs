//! Object and list metadata shared by every schema version.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SchemaError;
use crate::types::ResourceVersion;

/// Metadata of a single object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Namespace the object was declared in
    #[serde(default)]
    pub namespace: String,

    /// Object name
    #[serde(default)]
    pub name: String,

    /// Opaque-on-the-wire, monotonic-in-practice object version
    #[serde(default)]
    pub resource_version: String,

    /// Identity of this incarnation of the object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,
}

impl ObjectMeta {
    /// Parse the object's resource version.
    pub fn version(&self) -> Result<ResourceVersion, SchemaError> {
        self.resource_version.parse()
    }
}

/// Metadata of a list response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    /// Collection version the list was taken at
    #[serde(default)]
    pub resource_version: String,
}
