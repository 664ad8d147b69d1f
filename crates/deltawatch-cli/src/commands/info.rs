use deltawatch_core::{HotReloadResult, WatchConfig};
use deltawatch_daemon::ChannelName;

/// Execute the info command
pub fn execute(config: &WatchConfig) -> HotReloadResult<()> {
    let channel = ChannelName::new(config.channel_name.clone());

    println!("Launch profile:  {}", config.launch_profile);
    println!("Channel:         {}", channel);
    println!("Endpoint:        {}", channel.endpoint().display());
    println!("Ack timeout:     {}ms", config.ack_timeout_ms);
    match &config.agent_path {
        Some(path) => println!("Agent:           {}", path.display()),
        None => println!("Agent:           (none)"),
    }

    Ok(())
}
