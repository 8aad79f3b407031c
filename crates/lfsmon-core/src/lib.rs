#![warn(missing_docs)]

//! Lustre monitor core: resource graph, transition availability, paginated
//! event/alert/log queries, syslog annotation and agent plugin relay.

pub mod annotate;
pub mod error;
pub mod model;
pub mod plugin;
pub mod query;
pub mod service;
pub mod state;
pub mod store;
pub mod topology;
pub mod types;

pub use error::{MonitorError, MonitorResult};
pub use service::{MonitorService, ServiceSettings};
pub use store::{Inventory, MemoryStore, MonitorStore};
pub use topology::ResourceGraph;
pub use types::{FilesystemId, HostId, ResourceKind, ResourceRef, TargetId};
