//! linkup-services — the LinkUp service layer.
//!
//! Everything between the shared types in `linkup-core` and the consumer
//! surfaces (daemon, HTTP API, tests): local store, directory client,
//! transport, presence pulse, discovery reconciliation, and the per-login
//! session controller that wires them together.

pub mod assistant;
pub mod directory;
pub mod discovery;
pub mod documents;
pub mod pulse;
pub mod relay;
pub mod session;
pub mod store;
pub mod switchboard;
pub mod transport;

pub use assistant::{Assistant, StaticAssistant};
pub use directory::DirectoryClient;
pub use discovery::{DiscoveryFeed, SearchOutcome};
pub use documents::{DocumentError, DocumentStore, HttpDocumentStore, MemoryDocumentStore};
pub use relay::RelaySwitchboard;
pub use session::{SessionController, SessionEvent};
pub use store::{AccountRecord, LocalStore, StoreError};
pub use switchboard::{Channel, Claim, LocalSwitchboard, Switchboard, SwitchboardError};
pub use transport::{LinkInfo, LinkState, Subscription, Transport};
