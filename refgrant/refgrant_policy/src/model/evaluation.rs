//! Reference evaluation model.
//!
//! This module defines the result types of a reference decision.

use chrono::{DateTime, Utc};
use refgrant_core::{GrantKey, ReferenceTriple};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The answer to "may `from` reference `to`?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Some active grant admits the reference.
    Allowed,

    /// No active grant admits the reference.
    Denied,
}

impl Verdict {
    /// Whether the reference is permitted.
    pub fn is_allowed(self) -> bool {
        self == Self::Allowed
    }
}

impl From<bool> for Verdict {
    fn from(allowed: bool) -> Self {
        if allowed {
            Self::Allowed
        } else {
            Self::Denied
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allowed => write!(f, "Allowed"),
            Self::Denied => write!(f, "Denied"),
        }
    }
}

/// A reference evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// The referencing object.
    pub from: ReferenceTriple,

    /// The referenced object.
    pub to: ReferenceTriple,

    /// The decision.
    pub verdict: Verdict,

    /// The first grant, in name order, that admitted the reference.
    pub matched_grant: Option<GrantKey>,

    /// Whether the index might have been behind the feed when the decision
    /// was made.
    pub provisional: bool,

    /// When the evaluation was performed.
    pub timestamp: DateTime<Utc>,
}

impl Evaluation {
    /// Create a new evaluation.
    ///
    /// # Arguments
    ///
    /// * `from` - The referencing object.
    /// * `to` - The referenced object.
    /// * `matched_grant` - The grant that admitted the reference, if any.
    /// * `provisional` - Whether the index was not known to be in sync.
    ///
    /// # Returns
    ///
    /// An evaluation whose verdict is `Allowed` exactly when a grant
    /// matched.
    pub fn new(
        from: ReferenceTriple,
        to: ReferenceTriple,
        matched_grant: Option<GrantKey>,
        provisional: bool,
    ) -> Self {
        Self {
            from,
            to,
            verdict: Verdict::from(matched_grant.is_some()),
            matched_grant,
            provisional,
            timestamp: Utc::now(),
        }
    }

    /// Whether the reference is permitted.
    pub fn is_allowed(&self) -> bool {
        self.verdict.is_allowed()
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.from, self.to, self.verdict)?;
        if let Some(grant) = &self.matched_grant {
            write!(f, " (grant {})", grant)?;
        }
        if self.provisional {
            write!(f, " [provisional]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_new() {
        let from = ReferenceTriple::new("a", "gateway.networking.k8s.io", "HTTPRoute");
        let to = ReferenceTriple::named("b", "", "Service", "web");

        let allowed = Evaluation::new(
            from.clone(),
            to.clone(),
            Some(GrantKey::new("b", "g1")),
            false,
        );
        assert_eq!(allowed.verdict, Verdict::Allowed);
        assert!(allowed.is_allowed());

        let denied = Evaluation::new(from, to, None, true);
        assert_eq!(denied.verdict, Verdict::Denied);
        assert!(denied.provisional);
    }

    #[test]
    fn test_display() {
        let evaluation = Evaluation::new(
            ReferenceTriple::new("a", "", "Secret"),
            ReferenceTriple::named("b", "", "Secret", "s1"),
            Some(GrantKey::new("b", "g1")),
            true,
        );
        assert_eq!(
            evaluation.to_string(),
            "a/core/Secret -> b/core/Secret/s1: Allowed (grant b/g1) [provisional]"
        );
    }

    #[test]
    fn test_evaluation_serializes_for_audit() {
        let evaluation = Evaluation::new(
            ReferenceTriple::new("a", "", "Secret"),
            ReferenceTriple::named("b", "", "Secret", "s1"),
            None,
            false,
        );
        let json = serde_json::to_value(&evaluation).unwrap();
        assert_eq!(json["verdict"], "Denied");
        assert!(json["matched_grant"].is_null());
        assert_eq!(json["to"]["name"], "s1");
    }

    #[test]
    fn test_verdict_from_bool() {
        assert_eq!(Verdict::from(true), Verdict::Allowed);
        assert_eq!(Verdict::from(false), Verdict::Denied);
        assert!(!Verdict::Denied.is_allowed());
    }
}
