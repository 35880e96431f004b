use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use solarforge_core::{
    ForgeStats, Galaxy, GalaxyId, Issue, IssueForgeState, IssueId, User, UserId, UserStarSnapshot,
    Version, VersionId,
};

use crate::error::StoreError;
use crate::ledger;
use crate::traits::{
    GalaxySpaceStore, GalaxyStore, IssueStore, StatsStore, UserStore, VersionStore,
};

/// In-memory implementation of every store.
///
/// Conditional updates run under the map's per-entry write lock, so each one
/// is atomic with respect to concurrent callers.
pub struct MemoryStore {
    issues: DashMap<IssueId, Issue>,
    users: DashMap<UserId, User>,
    galaxies: DashMap<GalaxyId, Galaxy>,
    versions: DashMap<VersionId, Version>,
    /// (galaxy, user) -> display snapshot.
    space: DashMap<(GalaxyId, UserId), UserStarSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            issues: DashMap::new(),
            users: DashMap::new(),
            galaxies: DashMap::new(),
            versions: DashMap::new(),
            space: DashMap::new(),
        }
    }

    pub fn insert_issue(&self, issue: Issue) {
        self.issues.insert(issue.id.clone(), issue);
    }

    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn insert_galaxy(&self, galaxy: Galaxy) {
        self.galaxies.insert(galaxy.id.clone(), galaxy);
    }

    pub fn insert_version(&self, version: Version) {
        self.versions.insert(version.id.clone(), version);
    }

    /// Attach more sunshines to an open issue. Returns `false` if the issue
    /// does not exist or is reserved or settled.
    pub fn add_credits(&self, id: &IssueId, amount: u64) -> bool {
        match self.issues.get_mut(id) {
            Some(mut issue) if issue.forge_state() == IssueForgeState::Open => {
                issue.credits = issue.credits.saturating_add(amount);
                true
            }
            _ => false,
        }
    }

    /// Synchronous read, for tests and seeding.
    pub fn issue(&self, id: &IssueId) -> Option<Issue> {
        self.issues.get(id).map(|i| i.value().clone())
    }

    /// Synchronous read, for tests and seeding.
    pub fn user(&self, id: &UserId) -> Option<User> {
        self.users.get(id).map(|u| u.value().clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IssueStore for MemoryStore {
    async fn get_issue(&self, id: &IssueId) -> Result<Option<Issue>, StoreError> {
        Ok(self.issue(id))
    }

    async fn has_settlement_marker(&self, id: &IssueId) -> Result<bool, StoreError> {
        Ok(self
            .issues
            .get(id)
            .map(|i| i.settlement_marker.is_some())
            .unwrap_or(false))
    }

    async fn apply_forge(
        &self,
        id: &IssueId,
        reward_delta: u64,
        expected_prior_credits: u64,
    ) -> Result<bool, StoreError> {
        Ok(match self.issues.get_mut(id) {
            Some(mut issue) => ledger::reserve(&mut issue, reward_delta, expected_prior_credits),
            None => false,
        })
    }

    async fn set_settlement_marker(
        &self,
        id: &IssueId,
        tx_hash: &str,
    ) -> Result<bool, StoreError> {
        Ok(match self.issues.get_mut(id) {
            Some(mut issue) => ledger::confirm(&mut issue, tx_hash),
            None => false,
        })
    }

    async fn revert_forge(
        &self,
        id: &IssueId,
        reward_delta: u64,
        restored_credits: u64,
    ) -> Result<bool, StoreError> {
        Ok(match self.issues.get_mut(id) {
            Some(mut issue) => ledger::release(&mut issue, reward_delta, restored_credits),
            None => false,
        })
    }

    async fn release_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<IssueId>, StoreError> {
        let mut released = Vec::new();
        for mut entry in self.issues.iter_mut() {
            if ledger::release_stale(entry.value_mut(), cutoff).is_some() {
                released.push(entry.key().clone());
            }
        }
        Ok(released)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn add_reward(&self, user_id: &UserId, amount: u64) -> Result<bool, StoreError> {
        Ok(match self.users.get_mut(user_id) {
            Some(mut user) => {
                user.reward_balance = user.reward_balance.saturating_add(amount);
                true
            }
            None => false,
        })
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.user(id))
    }
}

#[async_trait]
impl GalaxyStore for MemoryStore {
    async fn get_galaxy(&self, id: &GalaxyId) -> Result<Option<Galaxy>, StoreError> {
        Ok(self.galaxies.get(id).map(|g| g.value().clone()))
    }
}

#[async_trait]
impl VersionStore for MemoryStore {
    async fn get_version(&self, id: &VersionId) -> Result<Option<Version>, StoreError> {
        Ok(self.versions.get(id).map(|v| v.value().clone()))
    }
}

#[async_trait]
impl GalaxySpaceStore for MemoryStore {
    async fn upsert_user_star(&self, snapshot: UserStarSnapshot) -> Result<(), StoreError> {
        let key = (snapshot.galaxy_id.clone(), snapshot.user_id.clone());
        self.space.insert(key, snapshot);
        Ok(())
    }

    async fn get_user_star(
        &self,
        galaxy_id: &GalaxyId,
        user_id: &UserId,
    ) -> Result<Option<UserStarSnapshot>, StoreError> {
        let key = (galaxy_id.clone(), user_id.clone());
        Ok(self.space.get(&key).map(|s| s.value().clone()))
    }

    async fn galaxy_space(
        &self,
        galaxy_id: &GalaxyId,
    ) -> Result<Vec<UserStarSnapshot>, StoreError> {
        let mut stars: Vec<UserStarSnapshot> = self
            .space
            .iter()
            .filter(|entry| entry.key().0 == *galaxy_id)
            .map(|entry| entry.value().clone())
            .collect();
        stars.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(stars)
    }
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn stats(&self) -> Result<ForgeStats, StoreError> {
        let mut stats = ForgeStats {
            total_galaxies: self.galaxies.len() as u64,
            total_users: self.users.len() as u64,
            ..ForgeStats::default()
        };
        for user in self.users.iter() {
            stats.total_stars = stats.total_stars.saturating_add(user.reward_balance);
        }
        for issue in self.issues.iter() {
            stats.total_sunshines = stats.total_sunshines.saturating_add(issue.credits);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let mut issue = Issue::new("i-1".into());
        issue.credits = 720;
        store.insert_issue(issue);
        store.insert_user(User::new("alice".into(), "Alice"));
        store
    }

    #[tokio::test]
    async fn test_get_missing_issue() {
        let store = MemoryStore::new();
        assert!(store.get_issue(&"nope".into()).await.unwrap().is_none());
        assert!(!store.has_settlement_marker(&"nope".into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_apply_forge_conditional() {
        let store = seeded();
        let id = IssueId::from("i-1");

        assert!(!store.apply_forge(&id, 2, 100).await.unwrap());
        assert!(store.apply_forge(&id, 2, 720).await.unwrap());
        assert!(!store.apply_forge(&id, 2, 0).await.unwrap());

        let issue = store.issue(&id).unwrap();
        assert_eq!(issue.credits, 0);
        assert_eq!(issue.rewards, 2);
        assert_eq!(issue.reservation.map(|r| r.credits), Some(720));
    }

    #[tokio::test]
    async fn test_apply_forge_missing_issue() {
        let store = MemoryStore::new();
        assert!(!store.apply_forge(&"x".into(), 1, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_marker_is_set_once() {
        let store = seeded();
        let id = IssueId::from("i-1");
        store.apply_forge(&id, 2, 720).await.unwrap();

        assert!(store.set_settlement_marker(&id, "0x01").await.unwrap());
        assert!(!store.set_settlement_marker(&id, "0x02").await.unwrap());
        assert!(store.has_settlement_marker(&id).await.unwrap());
        assert_eq!(
            store.issue(&id).unwrap().settlement_marker.as_deref(),
            Some("0x01")
        );
    }

    #[tokio::test]
    async fn test_revert_forge() {
        let store = seeded();
        let id = IssueId::from("i-1");
        store.apply_forge(&id, 2, 720).await.unwrap();
        assert!(store.revert_forge(&id, 2, 720).await.unwrap());

        let issue = store.issue(&id).unwrap();
        assert_eq!(issue.credits, 720);
        assert_eq!(issue.rewards, 0);
        assert!(issue.reservation.is_none());
    }

    #[tokio::test]
    async fn test_release_stale_reopens_reserved_issue() {
        let store = seeded();
        let id = IssueId::from("i-1");
        store.apply_forge(&id, 2, 720).await.unwrap();

        let long_ago = Utc::now() - chrono::Duration::seconds(300);
        assert!(store.release_stale(long_ago).await.unwrap().is_empty());
        assert_eq!(store.release_stale(Utc::now()).await.unwrap(), vec![id.clone()]);

        let issue = store.issue(&id).unwrap();
        assert_eq!(issue.credits, 720);
        assert_eq!(issue.rewards, 0);
        assert_eq!(issue.forge_state(), IssueForgeState::Open);
        assert!(store.add_credits(&id, 40));
    }

    #[tokio::test]
    async fn test_stats_totals() {
        let store = seeded();
        let mut bob = User::new("bob".into(), "Bob");
        bob.reward_balance = 4;
        store.insert_user(bob);
        store.add_reward(&"alice".into(), 3).await.unwrap();
        store.insert_galaxy(Galaxy {
            id: "g-1".into(),
            name: "G".into(),
            chain_namespace_id: None,
        });

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_galaxies, 1);
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.total_stars, 7);
        assert_eq!(stats.total_sunshines, 720);
        assert_eq!(MemoryStore::new().stats().await.unwrap(), ForgeStats::default());
    }

    #[tokio::test]
    async fn test_add_credits() {
        let store = seeded();
        assert!(store.add_credits(&"i-1".into(), 80));
        assert_eq!(store.issue(&"i-1".into()).unwrap().credits, 800);
        assert!(!store.add_credits(&"missing".into(), 1));
    }

    #[tokio::test]
    async fn test_add_credits_rejected_once_reserved() {
        let store = seeded();
        let id = IssueId::from("i-1");
        store.apply_forge(&id, 2, 720).await.unwrap();
        assert!(!store.add_credits(&id, 80));
        store.set_settlement_marker(&id, "0x01").await.unwrap();
        assert!(!store.add_credits(&id, 80));
        assert_eq!(store.issue(&id).unwrap().credits, 0);
    }

    #[tokio::test]
    async fn test_add_reward() {
        let store = seeded();
        assert!(store.add_reward(&"alice".into(), 3).await.unwrap());
        assert!(store.add_reward(&"alice".into(), 2).await.unwrap());
        assert!(!store.add_reward(&"ghost".into(), 2).await.unwrap());
        assert_eq!(store.user(&"alice".into()).unwrap().reward_balance, 5);
    }

    #[tokio::test]
    async fn test_galaxy_space_upsert_and_list() {
        let store = seeded();
        let galaxy = GalaxyId::from("g-1");
        let mut alice = store.user(&"alice".into()).unwrap();

        store
            .upsert_user_star(UserStarSnapshot::of(galaxy.clone(), &alice))
            .await
            .unwrap();
        alice.reward_balance = 9;
        store
            .upsert_user_star(UserStarSnapshot::of(galaxy.clone(), &alice))
            .await
            .unwrap();
        store
            .upsert_user_star(UserStarSnapshot::of(
                "g-2".into(),
                &User::new("bob".into(), "Bob"),
            ))
            .await
            .unwrap();

        let space = store.galaxy_space(&galaxy).await.unwrap();
        assert_eq!(space.len(), 1);
        assert_eq!(space[0].reward_balance, 9);

        let star = store
            .get_user_star(&galaxy, &"alice".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(star.nickname, "Alice");
        assert!(store
            .get_user_star(&galaxy, &"bob".into())
            .await
            .unwrap()
            .is_none());
    }
}
