//! Wire schema of the `ReferenceGrant` resource.
//!
//! `v1beta1` is the canonical version. `v1alpha2` is still served and is
//! converted explicitly. Which versions exist, and which one is stored, is
//! declared in the static table in [`registry`].

pub mod meta;
pub mod registry;
pub mod v1alpha2;
pub mod v1beta1;

pub use meta::{ListMeta, ObjectMeta};
pub use registry::{
    KindRegistration, PrinterColumn, SchemaRegistry, VersionRegistration, GROUP, KIND, LIST_KIND,
};
