//! Core types and traits for deltawatch hot reload.
//!
//! This crate provides the data model for module deltas, the browser notice
//! shapes, session and configuration state, and the capability traits that
//! the delta appliers and orchestrator are built on.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod error;
pub mod notices;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use crate::config::WatchConfig;
pub use crate::error::{HotReloadError, HotReloadResult};
pub use crate::notices::BrowserNotice;
pub use crate::session::{LaunchProfile, ProcessLaunchConfig, WatchSession, STARTUP_HOOKS_VAR};
pub use crate::types::{ApplyResult, ChangedFile, ModuleUpdate, ModuleUpdateBatch, UpdatePayload};

/// Pushes delta batches into a running target process.
///
/// Calls against one instance are issued serially; concurrent `apply` calls
/// are not supported.
#[async_trait]
pub trait DeltaApplier: Send + Sync {
    /// (Re)create the channel to the target for a new run iteration.
    ///
    /// Must not block on the target connecting.
    async fn initialize(
        &self,
        session: &mut WatchSession,
        cancel: &CancellationToken,
    ) -> HotReloadResult<()>;

    /// Send one batch and report whether the target applied it in place
    async fn apply(
        &self,
        session: &WatchSession,
        changed_file: &ChangedFile,
        updates: &ModuleUpdateBatch,
        cancel: &CancellationToken,
    ) -> bool;

    /// Forward compiler diagnostics to the browser, if one is attached
    async fn report_diagnostics(
        &self,
        session: &WatchSession,
        diagnostics: &[String],
        cancel: &CancellationToken,
    );
}

/// Handles changes that need no compilation, e.g. copying a static asset
#[async_trait]
pub trait StaticFileHandler: Send + Sync {
    /// Returns true when the change was fully handled
    async fn try_handle(
        &self,
        session: &WatchSession,
        changed_file: &ChangedFile,
        cancel: &CancellationToken,
    ) -> bool;
}

/// Output of compiling one changed file into deltas
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOutput {
    pub updates: ModuleUpdateBatch,
    pub diagnostics: Vec<String>,
}

impl CompileOutput {
    pub fn updates(updates: ModuleUpdateBatch) -> Self {
        Self {
            updates,
            diagnostics: Vec::new(),
        }
    }

    pub fn diagnostics(diagnostics: Vec<String>) -> Self {
        Self {
            updates: ModuleUpdateBatch::new(),
            diagnostics,
        }
    }
}

/// Turns a changed source file into module deltas
#[async_trait]
pub trait DeltaCompiler: Send + Sync {
    async fn compile(
        &self,
        session: &WatchSession,
        changed_file: &ChangedFile,
        cancel: &CancellationToken,
    ) -> HotReloadResult<CompileOutput>;
}

/// Transport to connected browsers
#[async_trait]
pub trait BrowserRefresh: Send + Sync {
    /// Issue a full page reload directive
    async fn reload(&self, cancel: &CancellationToken) -> HotReloadResult<()>;

    /// Send a JSON notice
    async fn send(&self, notice: &BrowserNotice, cancel: &CancellationToken) -> HotReloadResult<()>;

    /// Wait for the browser to report the outcome of a delta it was sent
    async fn receive_apply_result(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Option<ApplyResult>;
}
