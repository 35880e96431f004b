use async_trait::async_trait;
use std::time::Duration;

use crate::error::GatewayError;
use crate::traits::SettlementGateway;
use crate::types::{ForgeReply, ForgeRequest, GatewayReply};

/// Gateway reached over HTTP: the command envelope is POSTed as JSON and the
/// response body is the reply.
pub struct HttpGateway {
    client: reqwest::Client,
    url: String,
}

impl HttpGateway {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SettlementGateway for HttpGateway {
    async fn submit(&self, request: ForgeRequest) -> Result<ForgeReply, GatewayError> {
        let envelope = request.to_envelope();
        tracing::debug!(url = %self.url, issue_id = %request.issue_id, "posting forge to gateway");

        let resp = self
            .client
            .post(&self.url)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        // Error replies may come with a non-2xx status; the body decides.
        match serde_json::from_str::<GatewayReply>(&body) {
            Ok(reply) => Ok(reply.into()),
            Err(e) if status.is_success() => Err(GatewayError::MalformedReply(e.to_string())),
            Err(_) => Err(GatewayError::Transport(format!("gateway returned HTTP {}", status))),
        }
    }

    fn gateway_id(&self) -> &str {
        "gw-http"
    }
}
