//! Data model of the engine.

mod event;
mod grant;
mod reference;

pub use event::{EventKind, GrantEvent, GrantListing};
pub use grant::{FromEntry, Grant, GrantKey, ResourceVersion, TargetName, ToEntry};
pub use reference::{ReferenceTriple, CORE_GROUP};
