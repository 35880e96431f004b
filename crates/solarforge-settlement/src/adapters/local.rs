use async_trait::async_trait;
use dashmap::DashMap;
use solarforge_core::IssueId;
use solarforge_crypto::keccak256_hex;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::GatewayError;
use crate::traits::SettlementGateway;
use crate::types::{ForgeReply, ForgeRequest};

/// In-process settlement gateway.
///
/// Settles every request with `keccak256(envelope)` as the transaction hash,
/// unless a rejection is scripted for the issue. Keeps a log of everything
/// it was asked to settle.
pub struct LocalGateway {
    submitted: Mutex<Vec<ForgeRequest>>,
    rejections: DashMap<IssueId, String>,
    reject_all: Option<String>,
    latency: Duration,
}

impl LocalGateway {
    pub fn new() -> Self {
        Self {
            submitted: Mutex::new(Vec::new()),
            rejections: DashMap::new(),
            reject_all: None,
            latency: Duration::ZERO,
        }
    }

    /// A gateway that rejects every request with `message`.
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self {
            reject_all: Some(message.into()),
            ..Self::new()
        }
    }

    /// Delay every reply by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Reject forges of one issue with `message`.
    pub fn reject_issue(&self, issue_id: IssueId, message: impl Into<String>) {
        self.rejections.insert(issue_id, message.into());
    }

    /// Requests received so far, in arrival order.
    pub fn submitted(&self) -> Vec<ForgeRequest> {
        self.submitted
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    pub fn submission_count(&self) -> usize {
        self.submitted.lock().map(|log| log.len()).unwrap_or(0)
    }
}

impl Default for LocalGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettlementGateway for LocalGateway {
    async fn submit(&self, request: ForgeRequest) -> Result<ForgeReply, GatewayError> {
        if let Ok(mut log) = self.submitted.lock() {
            log.push(request.clone());
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(message) = &self.reject_all {
            return Ok(ForgeReply::Rejected {
                error_message: message.clone(),
            });
        }
        if let Some(message) = self.rejections.get(&request.issue_id) {
            return Ok(ForgeReply::Rejected {
                error_message: message.value().clone(),
            });
        }

        let body = serde_json::to_vec(&request.to_envelope())
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let transaction_hash = keccak256_hex(&body);
        tracing::info!(
            issue_id = %request.issue_id,
            tx_hash = %transaction_hash,
            participants = request.participant_addresses.len(),
            "local gateway settled forge"
        );
        Ok(ForgeReply::Settled { transaction_hash })
    }

    fn gateway_id(&self) -> &str {
        "gw-local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(issue: &str) -> ForgeRequest {
        ForgeRequest {
            namespace: "ns".into(),
            issue_id: issue.into(),
            participant_addresses: vec!["0xaa".into()],
            reward_total: 1,
        }
    }

    #[tokio::test]
    async fn test_settles_deterministically() {
        let gw = LocalGateway::new();
        let a = gw.submit(request("i-1")).await.unwrap();
        let b = gw.submit(request("i-1")).await.unwrap();
        assert_eq!(a, b);
        assert!(matches!(a, ForgeReply::Settled { ref transaction_hash } if transaction_hash.starts_with("0x")));
        assert_eq!(gw.submission_count(), 2);
    }

    #[tokio::test]
    async fn test_scripted_rejection() {
        let gw = LocalGateway::new();
        gw.reject_issue("i-2".into(), "namespace paused");
        let reply = gw.submit(request("i-2")).await.unwrap();
        assert_eq!(
            reply,
            ForgeReply::Rejected {
                error_message: "namespace paused".into()
            }
        );
        assert!(matches!(
            gw.submit(request("i-3")).await.unwrap(),
            ForgeReply::Settled { .. }
        ));
    }

    #[tokio::test]
    async fn test_rejecting_gateway_logs_request() {
        let gw = LocalGateway::rejecting("down");
        let reply = gw.submit(request("i-1")).await.unwrap();
        assert!(matches!(reply, ForgeReply::Rejected { .. }));
        assert_eq!(gw.submitted()[0].issue_id, IssueId::from("i-1"));
    }

    #[test]
    fn test_gateway_id() {
        assert_eq!(LocalGateway::new().gateway_id(), "gw-local");
    }
}
