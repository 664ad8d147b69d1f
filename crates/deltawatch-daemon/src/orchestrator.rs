//! Per-change fallback chain: static file handling first, then compilation.

use std::sync::Arc;

use deltawatch_core::{
    BrowserRefresh, ChangedFile, DeltaApplier, DeltaCompiler, HotReloadResult, StaticFileHandler,
    WatchSession,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::applier::select_applier;
use crate::compilation::CompilationHandler;

/// Builds the delta applier for a session
pub type ApplierFactory = Box<
    dyn Fn(&WatchSession, Option<Arc<dyn BrowserRefresh>>) -> Arc<dyn DeltaApplier> + Send + Sync,
>;

/// Decides, per change, whether an in-place update succeeded
pub struct HotReloadOrchestrator {
    static_files: Arc<dyn StaticFileHandler>,
    compiler: Arc<dyn DeltaCompiler>,
    browser: Option<Arc<dyn BrowserRefresh>>,
    applier_factory: ApplierFactory,
    compilation: Option<CompilationHandler>,
}

impl HotReloadOrchestrator {
    pub fn new(
        static_files: Arc<dyn StaticFileHandler>,
        compiler: Arc<dyn DeltaCompiler>,
        browser: Option<Arc<dyn BrowserRefresh>>,
    ) -> Self {
        Self {
            static_files,
            compiler,
            browser,
            applier_factory: Box::new(select_applier),
            compilation: None,
        }
    }

    /// Replace how the delta applier is chosen
    pub fn with_applier_factory(mut self, factory: ApplierFactory) -> Self {
        self.applier_factory = factory;
        self
    }

    pub fn compilation(&self) -> Option<&CompilationHandler> {
        self.compilation.as_ref()
    }

    /// Prepare for a run iteration.
    ///
    /// The applier is selected once, from the session's launch profile, on
    /// the first call; later calls re-initialize the same applier.
    pub async fn initialize(
        &mut self,
        session: &mut WatchSession,
        cancel: &CancellationToken,
    ) -> HotReloadResult<()> {
        if self.compilation.is_none() {
            info!(profile = %session.launch_profile(), "Selecting delta applier");
            let applier = (self.applier_factory)(session, self.browser.clone());
            self.compilation = Some(CompilationHandler::new(Arc::clone(&self.compiler), applier));
        }

        match &self.compilation {
            Some(compilation) => compilation.initialize(session, cancel).await,
            None => Ok(()),
        }
    }

    /// Try to apply a change without restarting the target.
    ///
    /// A false result means the caller needs another way out, such as a
    /// full restart.
    pub async fn try_handle_file_change(
        &self,
        session: &WatchSession,
        changed_file: &ChangedFile,
        cancel: &CancellationToken,
    ) -> bool {
        if self.static_files.try_handle(session, changed_file, cancel).await {
            debug!("Static file handler handled {}", changed_file);
            return true;
        }

        let Some(compilation) = &self.compilation else {
            warn!("Hot reload not initialized; cannot handle {}", changed_file);
            return false;
        };

        let handled = compilation.try_handle(session, changed_file, cancel).await;
        if handled {
            info!("Hot reload succeeded for {}", changed_file);
        } else {
            debug!("Hot reload could not apply {}", changed_file);
        }
        handled
    }
}
