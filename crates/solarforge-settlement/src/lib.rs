//! SolarForge settlement layer
//!
//! Provides the per-issue forge engine, the version rollup, the store and
//! gateway interfaces they run against, and pluggable adapters (in-memory
//! stores, an in-process gateway, and an HTTP gateway).

pub mod adapters;
pub mod error;
pub mod forge;
pub mod ledger;
pub mod rollup;
pub mod traits;
pub mod types;

pub use error::{ForgeError, GatewayError, StoreError};
pub use forge::{split_stakeholders, ForgeEngine};
pub use rollup::{RollupAccumulator, RollupEngine};
pub use traits::{
    ForgeStores, GalaxySpaceStore, GalaxyStore, IssueStore, SettlementGateway, StatsStore,
    UserStore, VersionStore,
};
pub use types::{ForgeReply, ForgeRequest, GatewayCommand, GatewayReply};
