//! SolarForge Core — domain types, the forge lifecycle state machine, the
//! sunshine → star conversion policy and engine configuration.

pub mod config;
pub mod conversion;
pub mod error;
pub mod forge_state;
pub mod types;

pub use config::ForgeConfig;
pub use conversion::{per_role_share, ConversionPolicy, LinearConversion};
pub use error::CoreError;
pub use forge_state::{ForgeEvent, ForgeStateMachine, IssueForgeState};
pub use types::{
    ForgeReceipt, ForgeStats, Galaxy, GalaxyId, Issue, IssueId, IssueReservation, Patch, Role, SigningCredential,
    StakeholderContribution, User, UserId, UserStarSnapshot, Version, VersionId, VersionRollup,
};
