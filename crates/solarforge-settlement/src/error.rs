/// Errors raised by store collaborators.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("record encoding error: {0}")]
    Encoding(String),
}

/// Errors raised while talking to the settlement gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway transport error: {0}")]
    Transport(String),

    #[error("malformed gateway reply: {0}")]
    MalformedReply(String),
}

/// Outcome of a failed forge.
///
/// `DuplicateForge` is not a real failure: the issue is already settled or a
/// settlement is in flight.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForgeError {
    #[error("issue already forged")]
    DuplicateForge,

    #[error("issue not found")]
    NotFound,

    #[error("issue has no sunshines")]
    NoCredits,

    #[error("failed to update issue")]
    UpdateFailed,

    #[error("no valid participant addresses for settlement")]
    NoAddresses,

    #[error("galaxy not found or missing chain namespace")]
    NamespaceMissing,

    #[error("gateway error: {0}")]
    GatewayError(String),

    #[error("store error: {0}")]
    Store(String),
}

impl ForgeError {
    /// Stable machine-readable tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateForge => "duplicate_forge",
            Self::NotFound => "not_found",
            Self::NoCredits => "no_credits",
            Self::UpdateFailed => "update_failed",
            Self::NoAddresses => "no_addresses",
            Self::NamespaceMissing => "namespace_missing",
            Self::GatewayError(_) => "gateway_error",
            Self::Store(_) => "store_error",
        }
    }
}

impl From<StoreError> for ForgeError {
    fn from(e: StoreError) -> Self {
        Self::Store(e.to_string())
    }
}
