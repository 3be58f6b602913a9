//! Adhoc Chat Runtime
//!
//! Runs one chat session on a single tokio task. Transport callbacks and UI
//! commands are queued on bounded channels and applied in order by
//! `SessionTask`, which owns the `SessionCoordinator` and with it the
//! transcript log.

pub mod builder;
pub mod coordinator;
pub mod memory;
pub mod observer;
pub mod resource_store;
pub mod task;
pub mod transfers;

pub use builder::{SessionBuilder, SessionHandle};
pub use coordinator::{SessionCoordinator, NO_CONNECTED_PEERS};
pub use memory::{MemoryNetwork, MemoryTransport, MemoryTransportConfig};
pub use observer::{AppEventForwarder, ObserverSet, TranscriptObserver};
pub use resource_store::ResourceStore;
pub use task::SessionTask;
pub use transfers::{TransferOutcome, TransferTracker};
