//! agentweave CLI: thin bootstrap around the orchestration core.
//!
//! Commands:
//! - `chat`: run one turn against the configured model and print the final view
//! - `config`: print the default configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "agentweave",
    about = "agentweave: multi-agent conversation orchestration",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message to an agent and print the conversation view
    Chat {
        /// The message to send
        #[arg(short, long)]
        message: String,

        /// Name of the agent answering
        #[arg(short, long, default_value = "assistant")]
        agent: String,

        /// Reuse a conversation id instead of starting a new one
        #[arg(long, env = "AGENTWEAVE_CONVERSATION")]
        conversation: Option<String>,
    },

    /// Print the default configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat { message, agent, conversation } => {
            commands::chat::run(message, agent, conversation).await?
        }
        Commands::Config => commands::config_cmd::print_default(),
    }

    Ok(())
}
