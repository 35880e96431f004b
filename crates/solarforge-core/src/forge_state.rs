use std::fmt;

use crate::error::CoreError;

/// Where an issue sits in the forge lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum IssueForgeState {
    /// Credits accumulate; no forge in flight.
    Open,
    /// A forge has reserved the credits and awaits the gateway.
    Reserved,
    /// A settlement marker is recorded. Final state.
    Settled,
}

impl IssueForgeState {
    /// Whether this is a final (terminal) state.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Settled)
    }
}

impl fmt::Display for IssueForgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Reserved => write!(f, "Reserved"),
            Self::Settled => write!(f, "Settled"),
        }
    }
}

/// Events that move an issue through the forge lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForgeEvent {
    /// A forge zeroes the credits and takes the reservation.
    Reserve,
    /// The gateway confirmed the settlement; the marker is recorded.
    Confirm,
    /// The forge failed downstream; credits are restored.
    Release,
}

/// Valid transitions:
/// - Open → Reserved (Reserve)
/// - Reserved → Settled (Confirm)
/// - Open → Settled (Confirm, marker recorded out of band)
/// - Reserved → Open (Release)
pub struct ForgeStateMachine;

impl ForgeStateMachine {
    /// Attempt a state transition based on an event.
    pub fn transition(
        current: IssueForgeState,
        event: ForgeEvent,
    ) -> Result<IssueForgeState, CoreError> {
        let new_state = match (current, event) {
            (IssueForgeState::Open, ForgeEvent::Reserve) => IssueForgeState::Reserved,
            (IssueForgeState::Open, ForgeEvent::Confirm) => IssueForgeState::Settled,
            (IssueForgeState::Reserved, ForgeEvent::Confirm) => IssueForgeState::Settled,
            (IssueForgeState::Reserved, ForgeEvent::Release) => IssueForgeState::Open,
            _ => {
                let target = match event {
                    ForgeEvent::Reserve => IssueForgeState::Reserved,
                    ForgeEvent::Confirm => IssueForgeState::Settled,
                    ForgeEvent::Release => IssueForgeState::Open,
                };
                return Err(CoreError::InvalidStateTransition {
                    from: current,
                    to: target,
                });
            }
        };

        tracing::debug!(
            from = %current,
            to = %new_state,
            event = ?event,
            "issue forge state transition"
        );

        Ok(new_state)
    }

    /// Check if a transition is valid without performing it.
    pub fn can_transition(current: IssueForgeState, event: ForgeEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}
