//! Command-line interface for deltawatch hot reload.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use once_cell::sync::OnceCell;
use tracing_subscriber::fmt::format::FmtSpan;
use uuid::Uuid;

use deltawatch_core::{ApplyResult, WatchConfig};

pub mod commands;

static LOGGING: OnceCell<()> = OnceCell::new();

/// Initialize logging once; verbose output enables debug events
pub fn init_logging(verbose: bool) {
    let _ = LOGGING.get_or_init(|| {
        let level = if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };
        let builder = tracing_subscriber::fmt().with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        );

        let builder = if verbose {
            builder
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::ACTIVE)
        } else {
            builder
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_span_events(FmtSpan::NONE)
        };

        let _ = builder.try_init();
    });
}

/// CLI arguments parser
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path (defaults to ./deltawatch.toml when present)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Reply the reference agent gives to every update
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AgentResponse {
    Success,
    Refresh,
    Fail,
}

impl From<AgentResponse> for ApplyResult {
    fn from(response: AgentResponse) -> Self {
        match response {
            AgentResponse::Success => ApplyResult::Success,
            AgentResponse::Refresh => ApplyResult::SuccessRefreshBrowser,
            AgentResponse::Fail => ApplyResult::Failed,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a reference hot reload agent that answers every update
    Agent {
        /// Channel to dial (defaults to the configured channel)
        #[arg(long)]
        channel: Option<String>,

        /// Result reported for each update
        #[arg(long, value_enum, default_value_t = AgentResponse::Success)]
        respond: AgentResponse,
    },

    /// Push one module delta to a connected agent
    Push {
        /// Changed source file the delta was compiled from
        file: PathBuf,

        /// Module identifier (random when omitted)
        #[arg(long)]
        module_id: Option<Uuid>,

        /// File holding the bytecode delta
        #[arg(long, value_name = "PATH")]
        il: PathBuf,

        /// File holding the metadata delta
        #[arg(long, value_name = "PATH")]
        metadata: PathBuf,

        /// Updated method token (repeatable)
        #[arg(long = "method")]
        methods: Vec<i32>,

        /// How long to wait for the agent to connect
        #[arg(long, default_value_t = 5000)]
        wait_ms: u64,
    },

    /// Show the resolved configuration and channel endpoint
    Info,
}

fn load_config(path: Option<PathBuf>) -> Result<WatchConfig> {
    let config = match path {
        Some(path) => WatchConfig::from_file(path)?,
        None => WatchConfig::discover(std::env::current_dir()?)?,
    };
    Ok(config)
}

/// Run the CLI application
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Agent { channel, respond } => {
            commands::execute_agent(&config, channel, respond.into()).await?;
        }
        Commands::Push {
            file,
            module_id,
            il,
            metadata,
            methods,
            wait_ms,
        } => {
            let request = commands::PushRequest {
                file,
                module_id: module_id.unwrap_or_else(Uuid::new_v4),
                il,
                metadata,
                methods,
                wait_ms,
            };
            if !commands::execute_push(&config, request).await? {
                anyhow::bail!("Hot reload update was not applied");
            }
        }
        Commands::Info => {
            commands::execute_info(&config)?;
        }
    }

    Ok(())
}
