//! Sunshine → star conversion.

use crate::error::CoreError;
use crate::types::Role;

/// Sunshines needed for one star unless configured otherwise.
pub const DEFAULT_CREDITS_PER_REWARD: u64 = 360;

/// Policy that converts an issue's sunshines into stars.
///
/// Implementations must be deterministic and monotonic in `credits`.
pub trait ConversionPolicy: Send + Sync {
    /// Stars forged from `credits` sunshines.
    fn reward_for(&self, credits: u64) -> u64;
}

/// `floor(credits / credits_per_reward)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearConversion {
    credits_per_reward: u64,
}

impl LinearConversion {
    pub fn new(credits_per_reward: u64) -> Result<Self, CoreError> {
        if credits_per_reward == 0 {
            return Err(CoreError::InvalidPolicy(
                "credits_per_reward must be greater than zero".into(),
            ));
        }
        Ok(Self { credits_per_reward })
    }

    pub fn credits_per_reward(&self) -> u64 {
        self.credits_per_reward
    }
}

impl Default for LinearConversion {
    fn default() -> Self {
        Self {
            credits_per_reward: DEFAULT_CREDITS_PER_REWARD,
        }
    }
}

impl ConversionPolicy for LinearConversion {
    fn reward_for(&self, credits: u64) -> u64 {
        credits / self.credits_per_reward
    }
}

/// Share of a forge owed to each populated role.
///
/// Always divides by the fixed role cardinality; the remainder and the
/// shares of absent roles are not redistributed.
pub fn per_role_share(reward_total: u64) -> u64 {
    reward_total / Role::COUNT
}
