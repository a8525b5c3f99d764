//! # Refgrant Policy
//!
//! `refgrant_policy` holds the active grants and decides cross-namespace
//! references against them.
//!
//! Key concepts:
//!
//! 1. **Grant Index**: A concurrent store of active grants, bucketed by the
//!    namespace that owns them. Reads are point-in-time snapshots.
//!
//! 2. **Evaluation**: A reference from `from` to `to` is allowed when some
//!    grant owned by `to.namespace` trusts `from` and admits `to`. With no
//!    such grant the answer is `Denied`.
//!
//! 3. **Revocation**: Nothing is cached between calls. Once a grant is
//!    deleted from the index, no later decision can rely on it.

pub mod engine;
pub mod model;
pub mod store;

// Re-export key types and traits for convenience
pub use engine::GrantEvaluator;
pub use model::{Evaluation, Verdict};
pub use store::{GrantIndex, GrantSnapshot, GrantStore, UpsertOutcome};
