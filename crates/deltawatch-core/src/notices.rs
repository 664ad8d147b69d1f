//! Messages sent over the browser refresh channel.

use serde::{Deserialize, Serialize};

use crate::types::UpdatePayload;

/// JSON notice for connected browsers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BrowserNotice {
    /// An in-place update was applied to the running target
    HotReloadApplied,

    /// Diagnostics produced while computing deltas
    #[serde(rename = "HotReloadDiagnosticsv1")]
    Diagnostics { diagnostics: Vec<String> },

    /// Delta batch routed through the browser transport
    #[serde(rename = "HotReloadDeltav1")]
    Delta(UpdatePayload),
}

impl BrowserNotice {
    pub fn applied() -> Self {
        BrowserNotice::HotReloadApplied
    }

    pub fn diagnostics(diagnostics: impl IntoIterator<Item = impl Into<String>>) -> Self {
        BrowserNotice::Diagnostics {
            diagnostics: diagnostics.into_iter().map(Into::into).collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
