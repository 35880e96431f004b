//! Conditional issue updates and record upserts shared by every
//! [`IssueStore`] backend.
//!
//! Callers must hold exclusive access to the record for the duration of the
//! call; these functions only decide and mutate.
//!
//! [`IssueStore`]: crate::traits::IssueStore

use chrono::{DateTime, Utc};
use solarforge_core::{ForgeEvent, ForgeStateMachine, Issue, IssueReservation, User};

/// Reserve `issue` for a forge. See [`crate::IssueStore::apply_forge`].
pub fn reserve(issue: &mut Issue, reward_delta: u64, expected_prior_credits: u64) -> bool {
    if issue.credits != expected_prior_credits {
        tracing::debug!(
            issue_id = %issue.id,
            expected = expected_prior_credits,
            actual = issue.credits,
            "credits changed since read"
        );
        return false;
    }
    if ForgeStateMachine::transition(issue.forge_state(), ForgeEvent::Reserve).is_err() {
        return false;
    }
    issue.credits = 0;
    issue.rewards = issue.rewards.saturating_add(reward_delta);
    issue.reservation = Some(IssueReservation {
        credits: expected_prior_credits,
        reward_delta,
        reserved_at: Utc::now(),
    });
    true
}

/// Record the settlement marker. Rejects blank hashes, already-settled
/// issues, and open issues that still hold credits.
pub fn confirm(issue: &mut Issue, tx_hash: &str) -> bool {
    if tx_hash.trim().is_empty() {
        return false;
    }
    if issue.reservation.is_none() && issue.credits != 0 {
        return false;
    }
    if ForgeStateMachine::transition(issue.forge_state(), ForgeEvent::Confirm).is_err() {
        return false;
    }
    issue.settlement_marker = Some(tx_hash.to_string());
    issue.reservation = None;
    true
}

/// Give the reserved credits back and take the reserved rewards away.
pub fn release(issue: &mut Issue, reward_delta: u64, restored_credits: u64) -> bool {
    if ForgeStateMachine::transition(issue.forge_state(), ForgeEvent::Release).is_err() {
        return false;
    }
    issue.credits = issue.credits.saturating_add(restored_credits);
    issue.rewards = issue.rewards.saturating_sub(reward_delta);
    issue.reservation = None;
    true
}

/// Release a reservation taken at or before `cutoff` using the amounts it
/// recorded. Returns the released reservation.
pub fn release_stale(issue: &mut Issue, cutoff: DateTime<Utc>) -> Option<IssueReservation> {
    let held = issue.reservation.clone().filter(|r| r.is_stale(cutoff))?;
    if !release(issue, held.reward_delta, held.credits) {
        return None;
    }
    Some(held)
}

/// Fold an externally written issue record into the stored one.
///
/// The forge lifecycle fields (`rewards`, `settlement_marker`,
/// `reservation`) are owned by the forge and never taken from `incoming`.
/// Credits are only accepted when the issue is created; after that they
/// move through `add_credits` and the forge.
pub fn upsert_issue(stored: Option<&Issue>, mut incoming: Issue) -> Issue {
    match stored {
        Some(stored) => {
            incoming.credits = stored.credits;
            incoming.rewards = stored.rewards;
            incoming.settlement_marker = stored.settlement_marker.clone();
            incoming.reservation = stored.reservation.clone();
        }
        None => {
            incoming.rewards = 0;
            incoming.settlement_marker = None;
            incoming.reservation = None;
        }
    }
    incoming
}

/// Fold an externally written user record into the stored one. An existing
/// reward balance is kept; it only grows through `add_reward`.
pub fn upsert_user(stored: Option<&User>, mut incoming: User) -> User {
    if let Some(stored) = stored {
        incoming.reward_balance = stored.reward_balance;
    }
    incoming
}

#[cfg(test)]
mod tests {
    use super::*;
    use solarforge_core::IssueForgeState;

    fn issue(credits: u64) -> Issue {
        let mut issue = Issue::new("issue".into());
        issue.credits = credits;
        issue
    }

    #[test]
    fn test_reserve_zeroes_credits() {
        let mut i = issue(720);
        assert!(reserve(&mut i, 2, 720));
        assert_eq!(i.credits, 0);
        assert_eq!(i.rewards, 2);
        assert_eq!(i.forge_state(), IssueForgeState::Reserved);
    }

    #[test]
    fn test_reserve_stale_credits() {
        let mut i = issue(800);
        assert!(!reserve(&mut i, 2, 720));
        assert_eq!(i.credits, 800);
        assert_eq!(i.rewards, 0);
    }

    #[test]
    fn test_second_reserve_fails() {
        let mut i = issue(720);
        assert!(reserve(&mut i, 2, 720));
        assert!(!reserve(&mut i, 0, 0));
        assert_eq!(i.rewards, 2);
    }

    #[test]
    fn test_confirm_after_reserve() {
        let mut i = issue(360);
        reserve(&mut i, 1, 360);
        assert!(confirm(&mut i, "0xabc"));
        assert_eq!(i.settlement_marker.as_deref(), Some("0xabc"));
        assert!(i.reservation.is_none());
        assert!(!confirm(&mut i, "0xdef"));
        assert_eq!(i.settlement_marker.as_deref(), Some("0xabc"));
    }

    #[test]
    fn test_confirm_rejects_blank_hash() {
        let mut i = issue(0);
        assert!(!confirm(&mut i, " "));
        assert!(i.settlement_marker.is_none());
    }

    #[test]
    fn test_confirm_open_issue_with_credits_rejected() {
        let mut i = issue(10);
        assert!(!confirm(&mut i, "0xabc"));
    }

    #[test]
    fn test_release_restores() {
        let mut i = issue(1080);
        i.rewards = 5;
        reserve(&mut i, 3, 1080);
        // Funders topped up while the forge was in flight.
        i.credits = 40;
        assert!(release(&mut i, 3, 1080));
        assert_eq!(i.credits, 1120);
        assert_eq!(i.rewards, 5);
        assert_eq!(i.forge_state(), IssueForgeState::Open);
    }

    #[test]
    fn test_reserve_records_amounts() {
        let mut i = issue(1080);
        assert!(reserve(&mut i, 3, 1080));
        let held = i.reservation.clone().unwrap();
        assert_eq!(held.credits, 1080);
        assert_eq!(held.reward_delta, 3);
    }

    #[test]
    fn test_release_stale_restores_recorded_amounts() {
        let mut i = issue(1080);
        i.rewards = 5;
        reserve(&mut i, 3, 1080);

        let before = Utc::now() - chrono::Duration::seconds(60);
        assert!(release_stale(&mut i, before).is_none());
        assert_eq!(i.forge_state(), IssueForgeState::Reserved);

        let held = release_stale(&mut i, Utc::now()).unwrap();
        assert_eq!(held.credits, 1080);
        assert_eq!(i.credits, 1080);
        assert_eq!(i.rewards, 5);
        assert_eq!(i.forge_state(), IssueForgeState::Open);
        assert!(release_stale(&mut i, Utc::now()).is_none());
    }

    #[test]
    fn test_release_stale_ignores_settled() {
        let mut i = issue(360);
        reserve(&mut i, 1, 360);
        confirm(&mut i, "0xabc");
        assert!(release_stale(&mut i, Utc::now()).is_none());
        assert_eq!(i.settlement_marker.as_deref(), Some("0xabc"));
    }

    #[test]
    fn test_upsert_keeps_settlement() {
        let mut stored = issue(720);
        reserve(&mut stored, 2, 720);
        confirm(&mut stored, "0xabc");

        let mut edit = Issue::new("issue".into());
        edit.credits = 1080;
        edit.author = Some("alice".into());
        let merged = upsert_issue(Some(&stored), edit);

        assert_eq!(merged.author.as_ref().map(|a| a.as_str()), Some("alice"));
        assert_eq!(merged.credits, 0);
        assert_eq!(merged.rewards, 2);
        assert_eq!(merged.settlement_marker.as_deref(), Some("0xabc"));
        assert_eq!(merged.forge_state(), IssueForgeState::Settled);
    }

    #[test]
    fn test_upsert_keeps_reservation() {
        let mut stored = issue(720);
        reserve(&mut stored, 2, 720);

        let mut edit = Issue::new("issue".into());
        edit.credits = 360;
        let mut merged = upsert_issue(Some(&stored), edit);

        assert_eq!(merged.forge_state(), IssueForgeState::Reserved);
        assert!(confirm(&mut merged, "0xabc"));
    }

    #[test]
    fn test_upsert_new_issue_starts_open() {
        let mut body = issue(360);
        body.rewards = 9;
        body.settlement_marker = Some("0xforged".into());
        let created = upsert_issue(None, body);
        assert_eq!(created.credits, 360);
        assert_eq!(created.rewards, 0);
        assert_eq!(created.forge_state(), IssueForgeState::Open);
    }

    #[test]
    fn test_upsert_user_keeps_reward_balance() {
        let mut stored = User::new("alice".into(), "Alice");
        stored.reward_balance = 7;
        let edit = User::new("alice".into(), "Alice L.");
        let merged = upsert_user(Some(&stored), edit);
        assert_eq!(merged.reward_balance, 7);
        assert_eq!(merged.nickname, "Alice L.");

        let mut fresh = User::new("bob".into(), "Bob");
        fresh.reward_balance = 4;
        assert_eq!(upsert_user(None, fresh).reward_balance, 4);
    }

    #[test]
    fn test_release_without_reservation() {
        let mut i = issue(10);
        assert!(!release(&mut i, 1, 10));
        assert_eq!(i.credits, 10);
    }
}
