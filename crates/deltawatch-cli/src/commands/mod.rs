//! CLI command implementations

pub mod agent;
pub mod info;
pub mod push;

pub use agent::execute as execute_agent;
pub use info::execute as execute_info;
pub use push::{execute as execute_push, PushRequest};
