//! Tenant lifecycle state machine.
//!
//! A tenant's activity status describes its current serving tier. The engine
//! only ever requests transitions listed here; anything else is a caller
//! error, caught before a request is made to the backend.
//!
//! Legal transitions:
//!
//! | From        | To          | Driver                 |
//! |-------------|-------------|------------------------|
//! | (created)   | `Active`    | import engine          |
//! | `Active`    | `Cold`      | TTL expiry scanner     |
//! | `Frozen`    | `Active`    | reactivation sampler   |
//! | `Active`    | `Offloaded` | offload orchestrator   |
//! | `Cold`      | `Offloaded` | offload orchestrator   |
//! | `Offloaded` | `Active`    | onload orchestrator    |
//!
//! `Cold` and `Frozen` are deliberately kept distinct: `Cold` is the direct
//! result of TTL expiry, while `Frozen` marks a tenant as eligible for the
//! one-step reactivation path.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A tenant's current serving tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    /// Serving read/write traffic, TTL tracked.
    Active,
    /// Deactivated by TTL expiry. Data retained, not queried.
    Cold,
    /// Eligible for reactivation through the warm-up path.
    Frozen,
    /// Moved to the cold storage tier; requires an explicit onload.
    Offloaded,
}

impl ActivityStatus {
    /// Whether a transition from `self` to `to` is permitted.
    #[must_use]
    pub fn can_transition_to(self, to: ActivityStatus) -> bool {
        use ActivityStatus::{Active, Cold, Frozen, Offloaded};
        matches!(
            (self, to),
            (Active, Cold) | (Frozen, Active) | (Active, Offloaded) | (Cold, Offloaded) | (Offloaded, Active)
        )
    }

    /// All states, in a fixed order. Useful for exhaustive checks.
    #[must_use]
    pub const fn all() -> [ActivityStatus; 4] {
        [Self::Active, Self::Cold, Self::Frozen, Self::Offloaded]
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "ACTIVE",
            Self::Cold => "COLD",
            Self::Frozen => "FROZEN",
            Self::Offloaded => "OFFLOADED",
        };
        write!(f, "{s}")
    }
}

/// Validate a requested transition, rejecting anything outside the table.
pub fn ensure_legal(from: ActivityStatus, to: ActivityStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(Error::IllegalTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ActivityStatus::{Active, Cold, Frozen, Offloaded};

    #[test]
    fn legal_transitions_are_accepted() {
        for (from, to) in [
            (Active, Cold),
            (Frozen, Active),
            (Active, Offloaded),
            (Cold, Offloaded),
            (Offloaded, Active),
        ] {
            assert!(from.can_transition_to(to), "{from} -> {to} should be legal");
            assert!(ensure_legal(from, to).is_ok());
        }
    }

    #[test]
    fn every_other_pair_is_rejected() {
        let legal = [
            (Active, Cold),
            (Frozen, Active),
            (Active, Offloaded),
            (Cold, Offloaded),
            (Offloaded, Active),
        ];
        for from in ActivityStatus::all() {
            for to in ActivityStatus::all() {
                if legal.contains(&(from, to)) {
                    continue;
                }
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
                match ensure_legal(from, to) {
                    Err(Error::IllegalTransition { from: f, to: t }) => {
                        assert_eq!(f, from);
                        assert_eq!(t, to);
                    }
                    other => panic!("expected IllegalTransition for {from} -> {to}, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn self_transitions_are_rejected() {
        for state in ActivityStatus::all() {
            assert!(!state.can_transition_to(state));
        }
    }

    #[test]
    fn status_serializes_in_wire_format() {
        let json = serde_json::to_string(&Offloaded).unwrap();
        assert_eq!(json, "\"OFFLOADED\"");
        let back: ActivityStatus = serde_json::from_str("\"COLD\"").unwrap();
        assert_eq!(back, Cold);
    }
}
