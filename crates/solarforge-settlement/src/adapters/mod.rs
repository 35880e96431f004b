//! Store and gateway implementations.

pub mod http;
pub mod local;
pub mod memory;

pub use http::HttpGateway;
pub use local::LocalGateway;
pub use memory::MemoryStore;
