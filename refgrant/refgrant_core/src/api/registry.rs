//! Static registration table for the served schema versions.
//!
//! The table is plain data, reviewable in one place, and validated when the
//! registry is built. Decoding dispatches through it: a document names its
//! `apiVersion` and `kind`, the table picks the decoder for that version,
//! and the decoder converts to the canonical version. The canonical
//! version is the conversion hub only; which version objects are stored in
//! is a separate flag of the table.

use serde::Deserialize;
use serde_json::Value;

use super::{v1alpha2, v1beta1};
use crate::error::SchemaError;
use crate::types::{EventKind, Grant, GrantEvent, GrantListing};

/// API group the resource belongs to.
pub const GROUP: &str = "gateway.networking.k8s.io";

/// Kind of a single grant object.
pub const KIND: &str = "ReferenceGrant";

/// Kind of a grant list.
pub const LIST_KIND: &str = "ReferenceGrantList";

type DecodeObjectFn = fn(Value) -> Result<v1beta1::ReferenceGrant, SchemaError>;
type DecodeListFn = fn(Value) -> Result<v1beta1::ReferenceGrantList, SchemaError>;

/// One served version of a kind.
#[derive(Debug, Clone, Copy)]
pub struct VersionRegistration {
    /// Version name, e.g. `v1beta1`
    pub version: &'static str,

    /// Whether clients may still use this version
    pub served: bool,

    /// Whether this is the version objects are stored in
    pub storage: bool,

    decode_object: DecodeObjectFn,
    decode_list: DecodeListFn,
}

/// An extra column shown when objects of a kind are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrinterColumn {
    /// Column header
    pub name: &'static str,

    /// Value type, e.g. `date` or `string`
    pub column_type: &'static str,

    /// JSON path of the value within the object
    pub json_path: &'static str,
}

/// A registered kind and all its versions.
#[derive(Debug, Clone, Copy)]
pub struct KindRegistration {
    /// API group
    pub group: &'static str,

    /// Object kind
    pub kind: &'static str,

    /// List kind
    pub list_kind: &'static str,

    /// Abbreviations accepted in place of the kind
    pub short_names: &'static [&'static str],

    /// Categories the kind is listed under
    pub categories: &'static [&'static str],

    /// Extra listing columns
    pub printer_columns: &'static [PrinterColumn],

    /// Versions, in no particular order
    pub versions: &'static [VersionRegistration],
}

fn decode_v1beta1_object(value: Value) -> Result<v1beta1::ReferenceGrant, SchemaError> {
    serde_json::from_value(value).map_err(|e| decode_error("v1beta1 ReferenceGrant", e))
}

fn decode_v1beta1_list(value: Value) -> Result<v1beta1::ReferenceGrantList, SchemaError> {
    serde_json::from_value(value).map_err(|e| decode_error("v1beta1 ReferenceGrantList", e))
}

fn decode_v1alpha2_object(value: Value) -> Result<v1beta1::ReferenceGrant, SchemaError> {
    serde_json::from_value::<v1alpha2::ReferenceGrant>(value)
        .map(Into::into)
        .map_err(|e| decode_error("v1alpha2 ReferenceGrant", e))
}

fn decode_v1alpha2_list(value: Value) -> Result<v1beta1::ReferenceGrantList, SchemaError> {
    serde_json::from_value::<v1alpha2::ReferenceGrantList>(value)
        .map(Into::into)
        .map_err(|e| decode_error("v1alpha2 ReferenceGrantList", e))
}

fn decode_error(what: &'static str, err: serde_json::Error) -> SchemaError {
    SchemaError::Decode {
        what,
        message: err.to_string(),
    }
}

static REFERENCE_GRANT_VERSIONS: [VersionRegistration; 2] = [
    VersionRegistration {
        version: v1alpha2::VERSION,
        served: true,
        storage: true,
        decode_object: decode_v1alpha2_object,
        decode_list: decode_v1alpha2_list,
    },
    VersionRegistration {
        version: v1beta1::VERSION,
        served: true,
        storage: false,
        decode_object: decode_v1beta1_object,
        decode_list: decode_v1beta1_list,
    },
];

static REFERENCE_GRANT: KindRegistration = KindRegistration {
    group: GROUP,
    kind: KIND,
    list_kind: LIST_KIND,
    short_names: &["refgrant"],
    categories: &["gateway-api"],
    printer_columns: &[PrinterColumn {
        name: "Age",
        column_type: "date",
        json_path: ".metadata.creationTimestamp",
    }],
    versions: &REFERENCE_GRANT_VERSIONS,
};

/// Envelope of one watch stream record.
#[derive(Deserialize)]
struct WatchEnvelope {
    #[serde(rename = "type")]
    kind: EventKind,
    object: Value,
}

/// The set of registered kinds.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    kinds: Vec<&'static KindRegistration>,
}

impl SchemaRegistry {
    /// Build the registry of built-in kinds and validate it.
    pub fn builtin() -> Result<Self, SchemaError> {
        Self::from_kinds(vec![&REFERENCE_GRANT])
    }

    /// Build a registry from an explicit table and validate it.
    pub fn from_kinds(kinds: Vec<&'static KindRegistration>) -> Result<Self, SchemaError> {
        let registry = Self { kinds };
        registry.validate()?;
        Ok(registry)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        let mut seen_short_names: Vec<&str> = Vec::new();

        for kind in &self.kinds {
            let storage: Vec<_> = kind.versions.iter().filter(|v| v.storage).collect();
            if storage.len() != 1 {
                return Err(SchemaError::InvalidRegistration(format!(
                    "{} declares {} storage versions, expected exactly one",
                    kind.kind,
                    storage.len()
                )));
            }
            if !storage[0].served {
                return Err(SchemaError::InvalidRegistration(format!(
                    "{} storage version {} is not served",
                    kind.kind, storage[0].version
                )));
            }

            for (i, version) in kind.versions.iter().enumerate() {
                if kind.versions[..i]
                    .iter()
                    .any(|other| other.version == version.version)
                {
                    return Err(SchemaError::InvalidRegistration(format!(
                        "{} registers version {} twice",
                        kind.kind, version.version
                    )));
                }
            }

            for column in kind.printer_columns {
                if column.name.is_empty() || !column.json_path.starts_with('.') {
                    return Err(SchemaError::InvalidRegistration(format!(
                        "{} printer column {:?} needs a name and a path starting with '.'",
                        kind.kind, column.name
                    )));
                }
            }

            for short_name in kind.short_names {
                if seen_short_names.contains(short_name) {
                    return Err(SchemaError::InvalidRegistration(format!(
                        "short name {} is registered twice",
                        short_name
                    )));
                }
                seen_short_names.push(*short_name);
            }
        }

        Ok(())
    }

    /// All registered kinds.
    pub fn kinds(&self) -> impl Iterator<Item = &KindRegistration> {
        self.kinds.iter().map(|k| &**k)
    }

    /// Find a kind by group and kind (or list kind).
    pub fn kind(&self, group: &str, kind: &str) -> Result<&KindRegistration, SchemaError> {
        self.kinds
            .iter()
            .copied()
            .find(|k| k.group == group && (k.kind == kind || k.list_kind == kind))
            .ok_or_else(|| SchemaError::UnknownKind(format!("{}/{}", group, kind)))
    }

    /// Find a kind by one of its short names.
    pub fn resolve_short_name(&self, short_name: &str) -> Option<&KindRegistration> {
        self.kinds
            .iter()
            .copied()
            .find(|k| k.short_names.contains(&short_name))
    }

    /// The storage version of a kind.
    pub fn storage_version(
        &self,
        group: &str,
        kind: &str,
    ) -> Result<&VersionRegistration, SchemaError> {
        let registration = self.kind(group, kind)?;
        registration
            .versions
            .iter()
            .find(|v| v.storage)
            .ok_or_else(|| SchemaError::InvalidRegistration(format!("{} has no storage version", kind)))
    }

    /// Resolve a served version from an `apiVersion` string and a kind.
    pub fn served_version(
        &self,
        api_version: &str,
        kind: &str,
    ) -> Result<&VersionRegistration, SchemaError> {
        let (group, version) = api_version
            .split_once('/')
            .ok_or_else(|| SchemaError::UnknownVersion(api_version.to_string()))?;

        let registration = self.kind(group, kind)?;
        let version = registration
            .versions
            .iter()
            .find(|v| v.version == version)
            .ok_or_else(|| SchemaError::UnknownVersion(api_version.to_string()))?;

        if !version.served {
            return Err(SchemaError::NotServed(api_version.to_string()));
        }
        Ok(version)
    }

    /// Decode a single object, whatever served version it is written in.
    pub fn decode_object(&self, value: Value) -> Result<Grant, SchemaError> {
        let (api_version, kind) = type_meta(&value)?;
        let version = self.served_version(&api_version, &kind)?;
        (version.decode_object)(value)?.to_grant()
    }

    /// Decode a single object from JSON text.
    pub fn decode_grant(&self, json: &str) -> Result<Grant, SchemaError> {
        self.decode_object(serde_json::from_str(json)?)
    }

    /// Decode a list response from JSON text.
    pub fn decode_list(&self, json: &str) -> Result<GrantListing, SchemaError> {
        let value: Value = serde_json::from_str(json)?;
        let (api_version, kind) = type_meta(&value)?;
        let version = self.served_version(&api_version, &kind)?;
        (version.decode_list)(value)?.to_listing()
    }

    /// Decode one watch stream record from JSON text.
    ///
    /// The embedded object is expected to carry its own `apiVersion` and
    /// `kind`.
    pub fn decode_watch_event(&self, json: &str) -> Result<GrantEvent, SchemaError> {
        let envelope: WatchEnvelope = serde_json::from_str(json).map_err(|e| SchemaError::Decode {
            what: "watch event",
            message: e.to_string(),
        })?;
        let grant = self.decode_object(envelope.object)?;

        Ok(match envelope.kind {
            EventKind::Added => GrantEvent::Added(grant),
            EventKind::Modified => GrantEvent::Modified(grant),
            EventKind::Deleted => GrantEvent::deleted(&grant),
        })
    }
}

fn type_meta(value: &Value) -> Result<(String, String), SchemaError> {
    let field = |name: &'static str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SchemaError::Decode {
                what: "type metadata",
                message: format!("missing {}", name),
            })
    };
    Ok((field("apiVersion")?, field("kind")?))
}
