//! deepresearch CLI, the main entry point.
//!
//! Commands:
//! - `init`    Write a default config file
//! - `run`     Clarify and research one query in the terminal
//! - `serve`   Start the HTTP gateway
//! - `doctor`  Diagnose configuration and provider health

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "deepresearch",
    about = "deepresearch: clarify, plan, search, write and email research reports",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "DEEPRESEARCH_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Research a query interactively in the terminal
    Run {
        /// The research query; prompted for when omitted
        #[arg(short, long)]
        query: Option<String>,

        /// Skip emailing the finished report
        #[arg(long)]
        no_email: bool,

        /// Also write the finished report to this file
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind address
        #[arg(long)]
        host: Option<String>,

        /// Skip emailing finished reports
        #[arg(long)]
        no_email: bool,
    },

    /// Diagnose configuration and provider health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    // Logs go to stderr so a report printed on stdout stays clean.
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Init { force } => commands::init::run(force).await?,
        Commands::Run {
            query,
            no_email,
            output,
        } => commands::run::run(query, no_email, output).await?,
        Commands::Serve {
            port,
            host,
            no_email,
        } => commands::serve::run(port, host, no_email).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
