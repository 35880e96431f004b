use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::conversion::{LinearConversion, DEFAULT_CREDITS_PER_REWARD};
use crate::error::CoreError;

/// Tuning for the forge engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeConfig {
    /// Sunshines required for one star.
    #[serde(default = "default_credits_per_reward")]
    pub credits_per_reward: u64,
    /// Upper bound on one gateway round trip, in seconds.
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,
}

fn default_credits_per_reward() -> u64 {
    DEFAULT_CREDITS_PER_REWARD
}
fn default_gateway_timeout_secs() -> u64 {
    30
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            credits_per_reward: default_credits_per_reward(),
            gateway_timeout_secs: default_gateway_timeout_secs(),
        }
    }
}

impl ForgeConfig {
    /// The configured conversion policy.
    pub fn conversion(&self) -> Result<LinearConversion, CoreError> {
        LinearConversion::new(self.credits_per_reward)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }
}
