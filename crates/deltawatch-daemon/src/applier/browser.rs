//! Delta applier for targets hosted in the browser.
//!
//! Deltas travel over the browser refresh transport instead of a local
//! channel, and the browser reports the apply result itself.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deltawatch_core::{
    ApplyResult, BrowserNotice, BrowserRefresh, ChangedFile, DeltaApplier, HotReloadResult,
    ModuleUpdateBatch, UpdatePayload, WatchSession,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{notify_applied, send_diagnostics};

/// Applies deltas through the browser refresh channel
pub struct BrowserDeltaApplier {
    ack_timeout: Duration,
    browser: Option<Arc<dyn BrowserRefresh>>,
}

impl BrowserDeltaApplier {
    pub fn new(ack_timeout: Duration, browser: Option<Arc<dyn BrowserRefresh>>) -> Self {
        Self { ack_timeout, browser }
    }
}

#[async_trait]
impl DeltaApplier for BrowserDeltaApplier {
    async fn initialize(
        &self,
        session: &mut WatchSession,
        _cancel: &CancellationToken,
    ) -> HotReloadResult<()> {
        if self.browser.is_none() {
            warn!("Browser-hosted target without a browser refresh channel; hot reload is off");
        }
        info!(
            iteration = session.iteration(),
            "Delivering deltas over the browser refresh channel"
        );
        Ok(())
    }

    async fn apply(
        &self,
        _session: &WatchSession,
        changed_file: &ChangedFile,
        updates: &ModuleUpdateBatch,
        cancel: &CancellationToken,
    ) -> bool {
        let Some(browser) = self.browser.as_deref() else {
            debug!("No browser attached; skipping update for {}", changed_file);
            return false;
        };

        let notice = BrowserNotice::Delta(UpdatePayload::new(changed_file, updates));
        if let Err(e) = browser.send(&notice, cancel).await {
            warn!("Failed to send update for {} to the browser: {}", changed_file, e);
            return false;
        }

        let result = browser
            .receive_apply_result(self.ack_timeout, cancel)
            .await
            .unwrap_or(ApplyResult::Failed);

        debug!(deltas = updates.len(), %result, "Browser replied for {}", changed_file);
        if !result.is_success() {
            return false;
        }

        notify_applied(Some(browser), result, cancel).await;
        true
    }

    async fn report_diagnostics(
        &self,
        _session: &WatchSession,
        diagnostics: &[String],
        cancel: &CancellationToken,
    ) {
        send_diagnostics(self.browser.as_deref(), diagnostics, cancel).await;
    }
}
