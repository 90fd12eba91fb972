//! Document workflow tests
//!
//! Tests for the shared approval state machine including:
//! - Terminal state idempotence
//! - Cancel reachability from pending only
//! - Role gating of approve/reject
//! - Cache key scoping per document kind

use proptest::prelude::*;
use uuid::Uuid;

use shared::models::{DocumentKind, DocumentStatus, ItemCondition, UserRole};

const ALL_STATUSES: [DocumentStatus; 4] = [
    DocumentStatus::Pending,
    DocumentStatus::Approved,
    DocumentStatus::Rejected,
    DocumentStatus::Cancelled,
];

const ALL_KINDS: [DocumentKind; 5] = [
    DocumentKind::Import,
    DocumentKind::Export,
    DocumentKind::Return,
    DocumentKind::Waste,
    DocumentKind::Reconciliation,
];

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Every document kind runs the same machine: pending reaches approved,
    /// rejected and cancelled, nothing else moves
    #[test]
    fn test_pending_transitions() {
        assert!(DocumentStatus::Pending.can_transition_to(DocumentStatus::Approved));
        assert!(DocumentStatus::Pending.can_transition_to(DocumentStatus::Rejected));
        assert!(DocumentStatus::Pending.can_transition_to(DocumentStatus::Cancelled));
        assert!(!DocumentStatus::Pending.can_transition_to(DocumentStatus::Pending));
    }

    /// Approving or rejecting an already-terminal document must be refused:
    /// no transition out of approved or rejected exists
    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [DocumentStatus::Approved, DocumentStatus::Rejected] {
            assert!(terminal.is_terminal());
            for next in ALL_STATUSES {
                assert!(
                    !terminal.can_transition_to(next),
                    "{:?} must not reach {:?}",
                    terminal,
                    next
                );
            }
        }
    }

    /// Cancelled documents cannot be revived or approved
    #[test]
    fn test_cancelled_is_a_dead_end() {
        for next in ALL_STATUSES {
            assert!(!DocumentStatus::Cancelled.can_transition_to(next));
        }
    }

    /// Only pending is non-terminal and mutable
    #[test]
    fn test_only_pending_is_mutable() {
        let mutable: Vec<_> = ALL_STATUSES
            .iter()
            .filter(|s| ALL_STATUSES.iter().any(|n| s.can_transition_to(*n)))
            .collect();
        assert_eq!(mutable, vec![&DocumentStatus::Pending]);
    }

    /// Status strings round-trip; legacy 'draft' is not part of the machine
    #[test]
    fn test_status_string_round_trip() {
        for status in ALL_STATUSES {
            assert_eq!(DocumentStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(DocumentStatus::from_str("draft"), None);
        assert_eq!(DocumentStatus::from_str(""), None);
    }

    /// Staff cannot approve; managers and admins can
    #[test]
    fn test_approval_role_gate() {
        assert!(UserRole::Admin.can_approve());
        assert!(UserRole::Manager.can_approve());
        assert!(!UserRole::Staff.can_approve());
    }

    /// Only good-condition return lines restock
    #[test]
    fn test_return_condition_restocking() {
        assert!(ItemCondition::Good.restocks());
        assert!(!ItemCondition::Fair.restocks());
        assert!(!ItemCondition::Poor.restocks());
        assert!(!ItemCondition::Damaged.restocks());
        assert!(!ItemCondition::Expired.restocks());
    }

    /// Cache keys are scoped by document kind so an import and an export
    /// with the same id never collide
    #[test]
    fn test_cache_keys_are_kind_scoped() {
        let id = Uuid::new_v4();
        let keys: Vec<String> = ALL_KINDS.iter().map(|k| k.cache_key(id)).collect();

        for (i, key) in keys.iter().enumerate() {
            assert!(key.ends_with(&id.to_string()));
            for other in &keys[i + 1..] {
                assert_ne!(key, other);
            }
        }
        assert_eq!(DocumentKind::Import.cache_key(id), format!("import:{}", id));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn arb_status() -> impl Strategy<Value = DocumentStatus> {
        prop::sample::select(ALL_STATUSES.to_vec())
    }

    proptest! {
        /// Property: at most one transition ever succeeds in a document's
        /// lifetime — whatever the first transition is, nothing moves after it
        #[test]
        fn one_transition_per_document(first in arb_status(), second in arb_status()) {
            let start = DocumentStatus::Pending;
            if start.can_transition_to(first) {
                // After the first transition, no further transition is legal
                prop_assert!(!first.can_transition_to(second));
            }
        }

        /// Property: terminality is stable — a terminal status never admits
        /// any outgoing transition
        #[test]
        fn terminal_means_terminal(status in arb_status(), next in arb_status()) {
            if status.is_terminal() {
                prop_assert!(!status.can_transition_to(next));
            }
        }

        /// Property: the machine has no cycles — no status reaches pending
        #[test]
        fn pending_is_unreachable(status in arb_status()) {
            prop_assert!(!status.can_transition_to(DocumentStatus::Pending));
        }
    }
}
