use std::path::{Path, PathBuf};
use std::time::Duration;

use deltawatch_core::{
    ChangedFile, DeltaApplier, HotReloadError, HotReloadResult, ModuleUpdate, ModuleUpdateBatch,
    WatchConfig, WatchSession,
};
use deltawatch_daemon::{AgentDeltaApplier, ChannelName};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

const CONNECT_POLL: Duration = Duration::from_millis(50);

/// One module delta read from disk
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub file: PathBuf,
    pub module_id: Uuid,
    pub il: PathBuf,
    pub metadata: PathBuf,
    pub methods: Vec<i32>,
    pub wait_ms: u64,
}

async fn read_delta(path: &Path) -> HotReloadResult<Vec<u8>> {
    fs::read(path)
        .await
        .map_err(|e| HotReloadError::other(format!("Failed to read {}: {}", path.display(), e)))
}

/// Execute the push command.
///
/// Opens the channel, waits for the agent to dial in, then sends a single
/// update. Returns whether the agent applied it.
pub async fn execute(config: &WatchConfig, request: PushRequest) -> HotReloadResult<bool> {
    let il_delta = read_delta(&request.il).await?;
    let metadata_delta = read_delta(&request.metadata).await?;

    let update = ModuleUpdate::new(request.module_id, il_delta, metadata_delta)
        .with_updated_methods(request.methods);
    let batch: ModuleUpdateBatch = vec![update].into();

    let mut session = WatchSession::new(config.clone());
    let cancel = CancellationToken::new();
    let applier = AgentDeltaApplier::new(
        ChannelName::new(config.channel_name.clone()),
        config.ack_timeout(),
        None,
    );
    applier.initialize(&mut session, &cancel).await?;
    println!("Waiting for agent on {}", applier.channel_name().endpoint().display());

    let deadline = tokio::time::Instant::now() + Duration::from_millis(request.wait_ms);
    while !applier.is_connected().await {
        if tokio::time::Instant::now() >= deadline {
            cancel.cancel();
            return Err(HotReloadError::channel(format!(
                "No agent connected to {} within {}ms",
                applier.channel_name(),
                request.wait_ms
            )));
        }
        tokio::time::sleep(CONNECT_POLL).await;
    }
    debug!("Agent connected");

    let changed_file = ChangedFile::new(request.file.clone());
    let applied = applier.apply(&session, &changed_file, &batch, &cancel).await;
    cancel.cancel();

    if applied {
        info!("Update for {} applied", changed_file);
        println!("Applied update for {}", changed_file);
    } else {
        println!("Update for {} was not applied", changed_file);
    }
    Ok(applied)
}
