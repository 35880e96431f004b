//! Gateway wire types.

use serde::{Deserialize, Serialize};
use solarforge_core::IssueId;

/// Gateway command name for a forge batch.
pub const SOLAR_FORGE_COMMAND: &str = "solarForge";

/// One forge to settle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForgeRequest {
    pub namespace: String,
    pub issue_id: IssueId,
    pub participant_addresses: Vec<String>,
    pub reward_total: u64,
}

impl ForgeRequest {
    /// Wrap the request in the gateway's command envelope.
    pub fn to_envelope(&self) -> GatewayCommand {
        GatewayCommand {
            command: SOLAR_FORGE_COMMAND.to_string(),
            params: SolarForgeParams {
                namespace: self.namespace.clone(),
                models: vec![SolarForgeModel {
                    issue_id: self.issue_id.to_string(),
                    kind: SolarForgeKind::Issue,
                    participant_addresses: self.participant_addresses.clone(),
                    reward_total: self.reward_total,
                }],
            },
        }
    }
}

/// `{"command":"solarForge","params":{...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayCommand {
    pub command: String,
    pub params: SolarForgeParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolarForgeParams {
    pub namespace: String,
    pub models: Vec<SolarForgeModel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolarForgeModel {
    pub issue_id: String,
    pub kind: SolarForgeKind,
    pub participant_addresses: Vec<String>,
    pub reward_total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolarForgeKind {
    Issue,
}

/// The gateway's single reply to a forge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForgeReply {
    Settled { transaction_hash: String },
    Rejected { error_message: String },
}

/// Raw reply body: `{"error": "..."}` or `{"params": {"transactionHash": "..."}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GatewayReply {
    Error { error: String },
    Success { params: SettledParams },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettledParams {
    pub transaction_hash: String,
}

impl From<GatewayReply> for ForgeReply {
    fn from(reply: GatewayReply) -> Self {
        match reply {
            GatewayReply::Error { error } => Self::Rejected {
                error_message: error,
            },
            GatewayReply::Success { params } => Self::Settled {
                transaction_hash: params.transaction_hash,
            },
        }
    }
}

impl From<ForgeReply> for GatewayReply {
    fn from(reply: ForgeReply) -> Self {
        match reply {
            ForgeReply::Rejected { error_message } => Self::Error {
                error: error_message,
            },
            ForgeReply::Settled { transaction_hash } => Self::Success {
                params: SettledParams { transaction_hash },
            },
        }
    }
}
