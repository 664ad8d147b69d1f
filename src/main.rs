use anyhow::Result;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let result = deltawatch_cli::run().await;
    debug!("deltawatch {} exiting", deltawatch::VERSION);
    result
}
