//! Commands dispatched from the HTTP API to the node event loop.

use solarforge_core::{ForgeReceipt, IssueId, VersionId, VersionRollup};
use solarforge_settlement::ForgeError;
use tokio::sync::oneshot;

/// A command sent from the HTTP API to the node's main event loop.
pub enum NodeCommand {
    /// Forge one issue.
    ForgeIssue {
        issue_id: IssueId,
        reply: oneshot::Sender<Result<ForgeReceipt, ForgeError>>,
    },
    /// Forge every issue of a version and aggregate the result.
    ForgeVersion {
        version_id: VersionId,
        reply: oneshot::Sender<VersionRollup>,
    },
}

impl NodeCommand {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ForgeIssue { .. } => "forge_issue",
            Self::ForgeVersion { .. } => "forge_version",
        }
    }
}
