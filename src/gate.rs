//! Process-wide permission gate for analytics emission.
//!
//! Integrations that have not opted in per-response must not trigger a load
//! of (or traffic to) the analytics backend. The gate starts `Authorized`
//! unless permission verification was requested, in which case it starts
//! `Pending` and transitions exactly once when a qualifying backend response
//! is observed. The transition never reverts.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Observable gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    /// Verification requested, no qualifying response seen yet. No emission
    /// reaches the client adapter in this state.
    Pending,
    /// Events may be sent. Terminal.
    Authorized,
}

const STATE_PENDING: u8 = 0;
const STATE_AUTHORIZED: u8 = 1;

/// Two-state permission gate shared by the change-detection loop and the
/// interaction handlers.
#[derive(Debug)]
pub struct PermissionGate {
    state: AtomicU8,
}

impl PermissionGate {
    /// Gate starting `Pending` when verification is requested, `Authorized`
    /// otherwise.
    #[must_use]
    pub fn new(verify_event_permission: bool) -> Self {
        let initial = if verify_event_permission {
            STATE_PENDING
        } else {
            STATE_AUTHORIZED
        };
        Self {
            state: AtomicU8::new(initial),
        }
    }

    #[must_use]
    pub fn state(&self) -> PermissionState {
        match self.state.load(Ordering::Acquire) {
            STATE_PENDING => PermissionState::Pending,
            _ => PermissionState::Authorized,
        }
    }

    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_AUTHORIZED
    }

    /// Perform the one-way `Pending -> Authorized` transition.
    ///
    /// Returns true only for the call that actually transitioned, so the
    /// caller can run transition side effects (backend load) exactly once.
    pub fn authorize(&self) -> bool {
        self.state
            .compare_exchange(
                STATE_PENDING,
                STATE_AUTHORIZED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_authorized_without_verification() {
        let gate = PermissionGate::new(false);
        assert!(gate.is_authorized());
        assert_eq!(gate.state(), PermissionState::Authorized);
    }

    #[test]
    fn starts_pending_with_verification() {
        let gate = PermissionGate::new(true);
        assert!(!gate.is_authorized());
        assert_eq!(gate.state(), PermissionState::Pending);
    }

    #[test]
    fn authorize_transitions_exactly_once() {
        let gate = PermissionGate::new(true);
        assert!(gate.authorize(), "first call performs the transition");
        assert!(!gate.authorize(), "second call observes terminal state");
        assert!(gate.is_authorized());
    }

    #[test]
    fn authorize_on_open_gate_reports_no_transition() {
        let gate = PermissionGate::new(false);
        assert!(!gate.authorize());
        assert!(gate.is_authorized());
    }
}
