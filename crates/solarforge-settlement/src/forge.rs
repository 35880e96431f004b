//! Per-issue forge: converts an issue's sunshines into stars and settles
//! them on the ledger.
//!
//! The flow is reserve → settle → apply. The issue's credits are reserved
//! with one conditional write, the gateway is asked to settle, and user
//! balances move only after the gateway confirmed. A failure between
//! reservation and confirmation releases the reservation.

use chrono::{DateTime, Utc};
use solarforge_core::{
    per_role_share, ConversionPolicy, ForgeReceipt, GalaxyId, Issue, IssueForgeState, IssueId,
    LinearConversion, StakeholderContribution, UserStarSnapshot,
};
use solarforge_crypto::AddressDeriver;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::ForgeError;
use crate::traits::{ForgeStores, IssueStore, SettlementGateway};
use crate::types::{ForgeReply, ForgeRequest};

const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

/// Split `reward_total` among the populated roles of `issue`, one entry per
/// distinct user in first-encountered order.
pub fn split_stakeholders(issue: &Issue, reward_total: u64) -> Vec<StakeholderContribution> {
    let share = per_role_share(reward_total);
    let mut contributions: Vec<StakeholderContribution> = Vec::new();
    for (role, user_id) in issue.stakeholders() {
        match contributions.iter_mut().find(|c| c.user_id == user_id) {
            Some(existing) => {
                if !existing.roles.contains(&role) {
                    existing.roles.push(role);
                }
                existing.reward_share = existing.reward_share.saturating_add(share);
            }
            None => contributions.push(StakeholderContribution::new(user_id, role, share)),
        }
    }
    contributions
}

/// Credits held back while the gateway settles.
struct Reservation {
    issue_id: IssueId,
    reward_total: u64,
    credits: u64,
}

/// Runs the per-issue forge against the configured collaborators.
pub struct ForgeEngine {
    stores: ForgeStores,
    gateway: Arc<dyn SettlementGateway>,
    deriver: Arc<dyn AddressDeriver>,
    policy: Arc<dyn ConversionPolicy>,
    gateway_timeout: Duration,
}

impl ForgeEngine {
    /// Create an engine with the default 360:1 conversion and a 30 s
    /// gateway timeout.
    pub fn new(
        stores: ForgeStores,
        gateway: Arc<dyn SettlementGateway>,
        deriver: Arc<dyn AddressDeriver>,
    ) -> Self {
        Self {
            stores,
            gateway,
            deriver,
            policy: Arc::new(LinearConversion::default()),
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn ConversionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &Arc<dyn ConversionPolicy> {
        &self.policy
    }

    pub fn stores(&self) -> &ForgeStores {
        &self.stores
    }

    fn issues(&self) -> &dyn IssueStore {
        self.stores.issues.as_ref()
    }

    /// Age past which a reservation can no longer belong to a live forge:
    /// twice the gateway timeout.
    pub fn stale_reservation_age(&self) -> Duration {
        self.gateway_timeout.saturating_mul(2)
    }

    /// Give back the credits of every reservation older than `max_age`.
    ///
    /// A forge whose task is dropped between reservation and confirmation
    /// leaves its reservation behind; this puts such issues back in the
    /// open state so they can be forged again.
    pub async fn release_stale(&self, max_age: Duration) -> Result<Vec<IssueId>, ForgeError> {
        let now = Utc::now();
        let cutoff = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let released = self.issues().release_stale(cutoff).await?;
        for issue_id in &released {
            tracing::warn!(issue_id = %issue_id, "released stale forge reservation");
        }
        Ok(released)
    }

    /// Forge one issue.
    pub async fn forge_issue(&self, issue_id: &IssueId) -> Result<ForgeReceipt, ForgeError> {
        let forge_id = Uuid::now_v7();
        let span = tracing::info_span!("forge_issue", issue_id = %issue_id, forge_id = %forge_id);
        async {
            let result = self.run(issue_id).await;
            match &result {
                Ok(receipt) => tracing::info!(
                    tx_hash = %receipt.transaction_hash,
                    participants = receipt.participants.len(),
                    reward_total = receipt.reward_total,
                    "forge completed"
                ),
                Err(ForgeError::DuplicateForge) => tracing::info!("issue already forged"),
                Err(e) => tracing::warn!(error = %e, kind = e.kind(), "forge failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, issue_id: &IssueId) -> Result<ForgeReceipt, ForgeError> {
        if self.issues().has_settlement_marker(issue_id).await? {
            return Err(ForgeError::DuplicateForge);
        }

        let issue = self
            .issues()
            .get_issue(issue_id)
            .await?
            .ok_or(ForgeError::NotFound)?;

        if issue.forge_state() != IssueForgeState::Open {
            return Err(ForgeError::DuplicateForge);
        }
        if issue.credits == 0 {
            return Err(ForgeError::NoCredits);
        }

        let reward_total = self.policy.reward_for(issue.credits);
        let stakeholders = split_stakeholders(&issue, reward_total);
        let paid: u64 = stakeholders.iter().map(|s| s.reward_share).sum();
        tracing::debug!(
            credits = issue.credits,
            reward_total,
            stakeholders = stakeholders.len(),
            unassigned = reward_total.saturating_sub(paid),
            "computed forge split"
        );

        let reservation = self.reserve(&issue, reward_total).await?;

        match self.settle(&issue, &stakeholders, reward_total).await {
            Ok((participants, transaction_hash)) => {
                self.apply(&issue, &participants, &transaction_hash).await;
                Ok(ForgeReceipt {
                    issue_id: issue.id.clone(),
                    participants,
                    transaction_hash,
                    reward_total,
                    settled_at: Utc::now(),
                })
            }
            Err(e) => {
                self.release(&reservation).await;
                Err(e)
            }
        }
    }

    async fn reserve(&self, issue: &Issue, reward_total: u64) -> Result<Reservation, ForgeError> {
        let reserved = self
            .issues()
            .apply_forge(&issue.id, reward_total, issue.credits)
            .await?;

        if !reserved {
            // Someone else may have reserved or settled it since we read it.
            let current = self.issues().get_issue(&issue.id).await?;
            return match current {
                Some(current) if current.forge_state() != IssueForgeState::Open => {
                    Err(ForgeError::DuplicateForge)
                }
                _ => Err(ForgeError::UpdateFailed),
            };
        }

        tracing::debug!(credits = issue.credits, reward_total, "issue reserved");
        Ok(Reservation {
            issue_id: issue.id.clone(),
            reward_total,
            credits: issue.credits,
        })
    }

    /// Derive addresses, resolve the namespace and ask the gateway to settle.
    /// Nothing here mutates local state.
    async fn settle(
        &self,
        issue: &Issue,
        stakeholders: &[StakeholderContribution],
        reward_total: u64,
    ) -> Result<(Vec<StakeholderContribution>, String), ForgeError> {
        let mut participants = Vec::with_capacity(stakeholders.len());
        let mut addresses = Vec::with_capacity(stakeholders.len());

        for stakeholder in stakeholders {
            if let Some(address) = self.address_of(stakeholder).await {
                participants.push(stakeholder.clone());
                addresses.push(address);
            }
        }

        if addresses.is_empty() {
            return Err(ForgeError::NoAddresses);
        }

        let namespace = self.namespace_of(issue).await?;

        let request = ForgeRequest {
            namespace,
            issue_id: issue.id.clone(),
            participant_addresses: addresses,
            reward_total,
        };
        tracing::info!(
            gateway = self.gateway.gateway_id(),
            namespace = %request.namespace,
            participants = request.participant_addresses.len(),
            reward_total,
            "submitting forge to gateway"
        );

        let reply = tokio::time::timeout(self.gateway_timeout, self.gateway.submit(request))
            .await
            .map_err(|_| {
                ForgeError::GatewayError(format!(
                    "no reply within {}s",
                    self.gateway_timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| ForgeError::GatewayError(e.to_string()))?;

        match reply {
            ForgeReply::Settled { transaction_hash } if !transaction_hash.trim().is_empty() => {
                Ok((participants, transaction_hash))
            }
            ForgeReply::Settled { .. } => Err(ForgeError::GatewayError(
                "reply carried an empty transaction hash".into(),
            )),
            ForgeReply::Rejected { error_message } => Err(ForgeError::GatewayError(error_message)),
        }
    }

    /// Settlement address of a stakeholder; `None` excludes them.
    async fn address_of(&self, stakeholder: &StakeholderContribution) -> Option<String> {
        let user_id = &stakeholder.user_id;
        let user = match self.stores.users.get_user(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!(user_id = %user_id, "stakeholder not found, excluded");
                return None;
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "stakeholder read failed, excluded");
                return None;
            }
        };

        let Some(credential) = user.credential() else {
            tracing::warn!(user_id = %user_id, "stakeholder has no signing credential, excluded");
            return None;
        };

        match self.deriver.derive(credential.expose()) {
            Ok(address) => {
                tracing::debug!(user_id = %user_id, %address, "derived settlement address");
                Some(address)
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "address derivation failed, excluded");
                None
            }
        }
    }

    async fn namespace_of(&self, issue: &Issue) -> Result<String, ForgeError> {
        let galaxy_id = issue.galaxy.as_ref().ok_or(ForgeError::NamespaceMissing)?;
        let galaxy = self
            .stores
            .galaxies
            .get_galaxy(galaxy_id)
            .await?
            .ok_or(ForgeError::NamespaceMissing)?;
        galaxy
            .namespace()
            .map(str::to_string)
            .ok_or(ForgeError::NamespaceMissing)
    }

    /// Record the marker and pay participants. The settlement is already
    /// final, so failures here are logged and never change the outcome.
    async fn apply(
        &self,
        issue: &Issue,
        participants: &[StakeholderContribution],
        transaction_hash: &str,
    ) {
        match self
            .issues()
            .set_settlement_marker(&issue.id, transaction_hash)
            .await
        {
            Ok(true) => tracing::debug!(tx_hash = %transaction_hash, "settlement marker recorded"),
            Ok(false) => {
                tracing::error!(tx_hash = %transaction_hash, "settlement marker rejected by store")
            }
            Err(e) => {
                tracing::error!(tx_hash = %transaction_hash, error = %e, "failed to record settlement marker")
            }
        }

        for participant in participants {
            let user_id = &participant.user_id;
            match self
                .stores
                .users
                .add_reward(user_id, participant.reward_share)
                .await
            {
                Ok(true) => {}
                Ok(false) => tracing::warn!(user_id = %user_id, "reward update matched no user"),
                Err(e) => tracing::warn!(user_id = %user_id, error = %e, "reward update failed"),
            }
        }

        if let Some(galaxy_id) = &issue.galaxy {
            for participant in participants {
                self.refresh_user_star(galaxy_id, participant).await;
            }
        }
    }

    async fn refresh_user_star(
        &self,
        galaxy_id: &GalaxyId,
        participant: &StakeholderContribution,
    ) {
        let user = match self.stores.users.get_user(&participant.user_id).await {
            Ok(Some(user)) => user,
            _ => return,
        };
        if let Err(e) = self
            .stores
            .space
            .upsert_user_star(UserStarSnapshot::of(galaxy_id.clone(), &user))
            .await
        {
            tracing::debug!(user_id = %user.id, error = %e, "user star snapshot not updated");
        }
    }

    async fn release(&self, reservation: &Reservation) {
        match self
            .issues()
            .revert_forge(
                &reservation.issue_id,
                reservation.reward_total,
                reservation.credits,
            )
            .await
        {
            Ok(true) => tracing::info!(credits = reservation.credits, "reservation released"),
            Ok(false) => tracing::error!("reservation release matched no pending forge"),
            Err(e) => tracing::error!(error = %e, "failed to release reservation"),
        }
    }
}
