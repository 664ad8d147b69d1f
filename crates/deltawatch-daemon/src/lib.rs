//! Hot reload delivery for deltawatch.
//!
//! This crate owns the watcher side of the delta protocol: the local channel
//! to the target process, the delta applier variants, the compilation
//! handler and the orchestrator that chains them. It also provides the
//! client used by the companion agent inside the target.

pub mod agent_client;
pub mod applier;
pub mod channel;
pub mod compilation;
pub mod orchestrator;

// Re-export commonly used types
pub use agent_client::AgentClient;
pub use applier::{select_applier, AgentDeltaApplier, BrowserDeltaApplier};
pub use channel::{ChannelListener, ChannelName};
pub use compilation::CompilationHandler;
pub use orchestrator::{ApplierFactory, HotReloadOrchestrator};
