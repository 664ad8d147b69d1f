//! Delta applier variants and the selection between them.

mod agent;
mod browser;

use std::sync::Arc;

use deltawatch_core::{
    ApplyResult, BrowserNotice, BrowserRefresh, DeltaApplier, LaunchProfile, WatchSession,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::channel::ChannelName;

pub use agent::AgentDeltaApplier;
pub use browser::BrowserDeltaApplier;

/// Pick the delta applier for the session's declared launch profile
pub fn select_applier(
    session: &WatchSession,
    browser: Option<Arc<dyn BrowserRefresh>>,
) -> Arc<dyn DeltaApplier> {
    let config = session.config();
    match session.launch_profile() {
        LaunchProfile::Process => {
            debug!(channel = %config.channel_name, "Using in-process agent delta applier");
            Arc::new(AgentDeltaApplier::new(
                ChannelName::new(&config.channel_name),
                config.ack_timeout(),
                browser,
            ))
        }
        LaunchProfile::Browser => {
            debug!("Using browser-hosted delta applier");
            Arc::new(BrowserDeltaApplier::new(config.ack_timeout(), browser))
        }
    }
}

/// Tell the browser about a successfully applied update.
///
/// A refresh result issues exactly one reload directive, a plain success
/// exactly one applied notice; failures send nothing.
pub(crate) async fn notify_applied(
    browser: Option<&dyn BrowserRefresh>,
    result: ApplyResult,
    cancel: &CancellationToken,
) {
    let Some(browser) = browser else {
        return;
    };

    let sent = match result {
        ApplyResult::SuccessRefreshBrowser => browser.reload(cancel).await,
        ApplyResult::Success => browser.send(&BrowserNotice::applied(), cancel).await,
        ApplyResult::Failed => return,
    };

    if let Err(e) = sent {
        warn!("Failed to notify browser after hot reload: {}", e);
    }
}

pub(crate) async fn send_diagnostics(
    browser: Option<&dyn BrowserRefresh>,
    diagnostics: &[String],
    cancel: &CancellationToken,
) {
    let Some(browser) = browser else {
        return;
    };
    if diagnostics.is_empty() {
        return;
    }

    let notice = BrowserNotice::diagnostics(diagnostics.iter().cloned());
    if let Err(e) = browser.send(&notice, cancel).await {
        warn!("Failed to send diagnostics to browser: {}", e);
    }
}
