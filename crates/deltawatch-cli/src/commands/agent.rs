use deltawatch_core::{ApplyResult, HotReloadResult, WatchConfig};
use deltawatch_daemon::{AgentClient, ChannelName};
use tracing::info;

/// Execute the agent command
pub async fn execute(
    config: &WatchConfig,
    channel: Option<String>,
    respond: ApplyResult,
) -> HotReloadResult<()> {
    let name = ChannelName::new(channel.unwrap_or_else(|| config.channel_name.clone()));
    let client = AgentClient::connect(&name).await?;

    let served = client
        .serve(|payload| {
            info!(
                changed_file = %payload.changed_file,
                modules = payload.deltas.len(),
                "Received update"
            );
            respond
        })
        .await?;

    println!("Served {} update(s) on {}", served, name);
    Ok(())
}
