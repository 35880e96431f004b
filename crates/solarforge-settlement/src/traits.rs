use async_trait::async_trait;
use chrono::{DateTime, Utc};
use solarforge_core::{
    ForgeStats, Galaxy, GalaxyId, Issue, IssueId, User, UserId, UserStarSnapshot, Version, VersionId,
};
use std::sync::Arc;

use crate::error::{GatewayError, StoreError};
use crate::types::{ForgeReply, ForgeRequest};

/// Issue records with their credit counter and settlement marker.
#[async_trait]
pub trait IssueStore: Send + Sync {
    async fn get_issue(&self, id: &IssueId) -> Result<Option<Issue>, StoreError>;

    async fn has_settlement_marker(&self, id: &IssueId) -> Result<bool, StoreError>;

    /// Atomically zero the credits, add `reward_delta` to the issue's rewards
    /// and reserve the issue for settlement.
    ///
    /// Matches only when the issue holds exactly `expected_prior_credits`
    /// and is neither settled nor reserved. Returns `false` on no match.
    async fn apply_forge(
        &self,
        id: &IssueId,
        reward_delta: u64,
        expected_prior_credits: u64,
    ) -> Result<bool, StoreError>;

    /// Record the settlement transaction hash if no marker is set yet.
    async fn set_settlement_marker(&self, id: &IssueId, tx_hash: &str)
        -> Result<bool, StoreError>;

    /// Undo a reservation taken by [`IssueStore::apply_forge`].
    async fn revert_forge(
        &self,
        id: &IssueId,
        reward_delta: u64,
        restored_credits: u64,
    ) -> Result<bool, StoreError>;
    /// Undo every reservation taken at or before `cutoff` with the amounts
    /// it recorded. Returns the released issues.
    async fn release_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<IssueId>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Increase a user's reward balance. Returns `false` if no user matched.
    async fn add_reward(&self, user_id: &UserId, amount: u64) -> Result<bool, StoreError>;

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait GalaxyStore: Send + Sync {
    async fn get_galaxy(&self, id: &GalaxyId) -> Result<Option<Galaxy>, StoreError>;
}

#[async_trait]
pub trait VersionStore: Send + Sync {
    async fn get_version(&self, id: &VersionId) -> Result<Option<Version>, StoreError>;
}

/// Denormalized per-galaxy display records.
#[async_trait]
pub trait GalaxySpaceStore: Send + Sync {
    async fn upsert_user_star(&self, snapshot: UserStarSnapshot) -> Result<(), StoreError>;

    async fn get_user_star(
        &self,
        galaxy_id: &GalaxyId,
        user_id: &UserId,
    ) -> Result<Option<UserStarSnapshot>, StoreError>;

    async fn galaxy_space(&self, galaxy_id: &GalaxyId)
        -> Result<Vec<UserStarSnapshot>, StoreError>;
}

/// Platform-wide totals.
#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn stats(&self) -> Result<ForgeStats, StoreError>;
}

/// External service that finalizes a forge on the settlement ledger.
///
/// Each call carries one batch and yields exactly one reply.
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    async fn submit(&self, request: ForgeRequest) -> Result<ForgeReply, GatewayError>;

    /// Unique identifier of this gateway (e.g. "gw-http").
    fn gateway_id(&self) -> &str;
}

/// Every store the forge and rollup engines read or write.
#[derive(Clone)]
pub struct ForgeStores {
    pub issues: Arc<dyn IssueStore>,
    pub users: Arc<dyn UserStore>,
    pub galaxies: Arc<dyn GalaxyStore>,
    pub versions: Arc<dyn VersionStore>,
    pub space: Arc<dyn GalaxySpaceStore>,
}

impl ForgeStores {
    /// Use one backend for every store.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: IssueStore + UserStore + GalaxyStore + VersionStore + GalaxySpaceStore + 'static,
    {
        Self {
            issues: store.clone(),
            users: store.clone(),
            galaxies: store.clone(),
            versions: store.clone(),
            space: store,
        }
    }
}
