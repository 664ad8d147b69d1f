//! Compiles a changed file into deltas and hands them to the delta applier.

use std::sync::Arc;

use deltawatch_core::{ChangedFile, DeltaApplier, DeltaCompiler, HotReloadResult, WatchSession};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Wraps an external compiler and exactly one delta applier
pub struct CompilationHandler {
    compiler: Arc<dyn DeltaCompiler>,
    applier: Arc<dyn DeltaApplier>,
    pending_diagnostics: Mutex<Option<JoinHandle<()>>>,
}

impl CompilationHandler {
    pub fn new(compiler: Arc<dyn DeltaCompiler>, applier: Arc<dyn DeltaApplier>) -> Self {
        Self {
            compiler,
            applier,
            pending_diagnostics: Mutex::new(None),
        }
    }

    /// Prepare the applier for a new run iteration
    pub async fn initialize(
        &self,
        session: &mut WatchSession,
        cancel: &CancellationToken,
    ) -> HotReloadResult<()> {
        self.settle_diagnostics().await;
        self.applier.initialize(session, cancel).await
    }

    /// Wait for the last diagnostics report to finish sending
    pub async fn settle_diagnostics(&self) {
        if let Some(report) = self.pending_diagnostics.lock().await.take() {
            if let Err(e) = report.await {
                warn!("Diagnostics report task failed: {}", e);
            }
        }
    }

    /// Compile the change and apply the resulting deltas.
    ///
    /// Returns false when the change could not be applied in place.
    pub async fn try_handle(
        &self,
        session: &WatchSession,
        changed_file: &ChangedFile,
        cancel: &CancellationToken,
    ) -> bool {
        self.settle_diagnostics().await;

        let output = match self.compiler.compile(session, changed_file, cancel).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Failed to compute deltas for {}: {}", changed_file, e);
                return false;
            }
        };

        if !output.diagnostics.is_empty() {
            self.report_diagnostics(session, output.diagnostics.clone(), cancel).await;
        }

        if output.updates.is_empty() {
            // Nothing to push; handled unless the compiler reported problems.
            debug!("No deltas produced for {}", changed_file);
            return output.diagnostics.is_empty();
        }

        self.applier.apply(session, changed_file, &output.updates, cancel).await
    }

    async fn report_diagnostics(
        &self,
        session: &WatchSession,
        diagnostics: Vec<String>,
        cancel: &CancellationToken,
    ) {
        let applier = Arc::clone(&self.applier);
        let session = session.clone();
        let cancel = cancel.clone();
        let report = tokio::spawn(async move {
            applier.report_diagnostics(&session, &diagnostics, &cancel).await;
        });
        *self.pending_diagnostics.lock().await = Some(report);
    }
}
