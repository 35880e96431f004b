use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::CoreError;
use crate::forge_state::IssueForgeState;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create an identifier, rejecting blank values.
            pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(CoreError::InvalidId(format!("{} id must not be empty", $label)));
                }
                Ok(Self(id))
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of an issue.
    IssueId,
    "issue"
);
string_id!(
    /// Identifier of a user.
    UserId,
    "user"
);
string_id!(
    /// Identifier of a galaxy (a project workspace).
    GalaxyId,
    "galaxy"
);
string_id!(
    /// Identifier of a roadmap version.
    VersionId,
    "version"
);

/// Stakeholder role on an issue.
///
/// Declaration order is the canonical order used when building stakeholder
/// lists and when printing role sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Author,
    Contributor,
    Maintainer,
}

impl Role {
    /// All roles, in canonical order.
    pub const ALL: [Role; 3] = [Role::Author, Role::Contributor, Role::Maintainer];

    /// Fixed role cardinality used as the reward divisor.
    pub const COUNT: u64 = 3;
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Author => write!(f, "author"),
            Self::Contributor => write!(f, "contributor"),
            Self::Maintainer => write!(f, "maintainer"),
        }
    }
}

/// An issue that funders attach sunshines to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    /// Unspent sunshines.
    #[serde(default)]
    pub credits: u64,
    /// Stars forged from this issue so far.
    #[serde(default)]
    pub rewards: u64,
    #[serde(default)]
    pub author: Option<UserId>,
    #[serde(default)]
    pub contributor: Option<UserId>,
    #[serde(default)]
    pub maintainer: Option<UserId>,
    #[serde(default)]
    pub galaxy: Option<GalaxyId>,
    /// Transaction hash of the settlement that forged this issue.
    #[serde(default)]
    pub settlement_marker: Option<String>,
    /// Held while a forge is settling this issue.
    #[serde(default)]
    pub reservation: Option<IssueReservation>,
}

/// Credits and rewards moved by a forge that has not settled yet.
///
/// Carries enough to undo the move if the forge never comes back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueReservation {
    /// Credits taken off the issue.
    pub credits: u64,
    /// Stars added to the issue's rewards.
    pub reward_delta: u64,
    pub reserved_at: DateTime<Utc>,
}

impl IssueReservation {
    /// Whether the reservation was taken at or before `cutoff`.
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.reserved_at <= cutoff
    }
}

impl Issue {
    /// A fresh issue with no stakeholders and no credits.
    pub fn new(id: IssueId) -> Self {
        Self {
            id,
            credits: 0,
            rewards: 0,
            author: None,
            contributor: None,
            maintainer: None,
            galaxy: None,
            settlement_marker: None,
            reservation: None,
        }
    }

    /// The user holding `role`, if any.
    pub fn holder(&self, role: Role) -> Option<&UserId> {
        let holder = match role {
            Role::Author => self.author.as_ref(),
            Role::Contributor => self.contributor.as_ref(),
            Role::Maintainer => self.maintainer.as_ref(),
        };
        holder.filter(|id| !id.0.is_empty())
    }

    /// Populated roles with their holders, in canonical order.
    pub fn stakeholders(&self) -> Vec<(Role, UserId)> {
        Role::ALL
            .iter()
            .filter_map(|role| self.holder(*role).map(|id| (*role, id.clone())))
            .collect()
    }

    /// Current position in the forge lifecycle.
    pub fn forge_state(&self) -> IssueForgeState {
        if self.settlement_marker.is_some() {
            IssueForgeState::Settled
        } else if self.reservation.is_some() {
            IssueForgeState::Reserved
        } else {
            IssueForgeState::Open
        }
    }
}

/// Secret material a user's settlement address is derived from.
///
/// Zeroized on drop and never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SigningCredential(Zeroizing<String>);

impl SigningCredential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    /// Expose the secret to a derivation routine.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningCredential(<redacted>)")
    }
}

/// A platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Cumulative stars. Only ever increases.
    #[serde(default)]
    pub reward_balance: u64,
    /// Spendable sunshines.
    #[serde(default)]
    pub credit_balance: u64,
    #[serde(default)]
    pub signing_credential: Option<SigningCredential>,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

impl User {
    pub fn new(id: UserId, nickname: impl Into<String>) -> Self {
        Self {
            id,
            reward_balance: 0,
            credit_balance: 0,
            signing_credential: None,
            nickname: nickname.into(),
            src: None,
            alt: None,
            role: None,
            uri: None,
        }
    }

    /// The usable signing credential, ignoring blank ones.
    pub fn credential(&self) -> Option<&SigningCredential> {
        self.signing_credential.as_ref().filter(|c| !c.is_empty())
    }
}

/// A project workspace mapped to an external-ledger namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Galaxy {
    pub id: GalaxyId,
    #[serde(default)]
    pub name: String,
    /// Namespace id of the galaxy on the settlement ledger.
    #[serde(default)]
    pub chain_namespace_id: Option<String>,
}

impl Galaxy {
    /// The namespace, ignoring blank values.
    pub fn namespace(&self) -> Option<&str> {
        self.chain_namespace_id
            .as_deref()
            .filter(|ns| !ns.trim().is_empty())
    }
}

/// Reference from a version to one of its issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub issue_id: IssueId,
}

/// A roadmap version grouping issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: VersionId,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub patches: Vec<Patch>,
}

/// One user's share of a forge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeholderContribution {
    pub user_id: UserId,
    /// Roles held, deduplicated, in first-seen order.
    pub roles: Vec<Role>,
    pub reward_share: u64,
}

impl StakeholderContribution {
    pub fn new(user_id: UserId, role: Role, reward_share: u64) -> Self {
        Self {
            user_id,
            roles: vec![role],
            reward_share,
        }
    }

    /// Fold another contribution of the same user into this one.
    pub fn absorb(&mut self, other: &StakeholderContribution) {
        for role in &other.roles {
            if !self.roles.contains(role) {
                self.roles.push(*role);
            }
        }
        self.reward_share = self.reward_share.saturating_add(other.reward_share);
    }
}

/// Proof that an issue was forged and settled.
///
/// `reward_total` is what the issue's rewards grew by. Each participant is
/// paid `reward_total / 3` per role held, so the division remainder and the
/// share of an empty role go to nobody: 720 sunshines forge 2 stars and pay
/// 0 to each participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeReceipt {
    pub issue_id: IssueId,
    pub participants: Vec<StakeholderContribution>,
    pub transaction_hash: String,
    pub reward_total: u64,
    pub settled_at: DateTime<Utc>,
}

/// Aggregate result of forging every issue of a version.
///
/// `reward_total` sums the issues' reward totals, so it can exceed the sum
/// of participant shares by the unpaid remainders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRollup {
    /// Sorted by reward share, descending.
    pub participants: Vec<StakeholderContribution>,
    pub issues_processed: u64,
    pub credits_total: u64,
    pub reward_total: u64,
}

/// Platform-wide totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeStats {
    pub total_galaxies: u64,
    /// Sum of every user's reward balance.
    pub total_stars: u64,
    pub total_users: u64,
    /// Unspent sunshines still attached to issues.
    pub total_sunshines: u64,
}

/// Denormalized display record of a user inside a galaxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStarSnapshot {
    pub galaxy_id: GalaxyId,
    pub user_id: UserId,
    pub nickname: String,
    pub src: Option<String>,
    pub alt: Option<String>,
    pub reward_balance: u64,
    pub credit_balance: u64,
    pub role: Option<String>,
    pub uri: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl UserStarSnapshot {
    /// Snapshot a user's display fields for a galaxy.
    pub fn of(galaxy_id: GalaxyId, user: &User) -> Self {
        Self {
            galaxy_id,
            user_id: user.id.clone(),
            nickname: user.nickname.clone(),
            src: user.src.clone(),
            alt: user.alt.clone(),
            reward_balance: user.reward_balance,
            credit_balance: user.credit_balance,
            role: user.role.clone(),
            uri: user.uri.clone(),
            updated_at: Utc::now(),
        }
    }
}
