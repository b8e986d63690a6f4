//! apds: Apache+PHP Development Server manager
//!
//! Parses command-line arguments, loads the preferences file, and drives
//! the per-port server containers through the runtime CLI. Each invocation
//! is independent; all server state lives in the runtime.

use apds::config::Config;
use apds::server::{self, ServerError};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "apds",
    version,
    about = "Apache+PHP Development Server",
    disable_help_subcommand = true
)]
struct Cli {
    /// Port the server is bound to (defaults to the configured port)
    #[arg(short, long, global = true)]
    port: Option<u16>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start a server on the port
    Start {
        /// Directory holding the files to be served
        #[arg(short = 'd', long, default_value = ".")]
        document_root: PathBuf,
    },
    /// Stop the server on the port
    Stop,
    /// Restart the server on the port
    Restart,
    /// Run a command inside the server container
    Run {
        /// Command and arguments, as available inside the container
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },
    /// Show the PHP error log
    Logs {
        /// Keep printing log lines as they appear
        #[arg(short, long)]
        follow: bool,
        /// Clear the log file instead of printing it
        #[arg(short, long)]
        clear: bool,
    },
    /// List running servers
    List,
}

async fn run(cli: Cli) -> Result<(), ServerError> {
    let config = Config::load_or_create()?;
    let port = cli.port.unwrap_or(config.default_port);

    match cli.command {
        Commands::Start { document_root } => {
            server::start(&config, port, &document_root).await?;
            println!("Server started on port {}", port);
        }
        Commands::Stop => {
            server::stop(&config, port).await?;
            println!("Server on port {} stopped", port);
        }
        Commands::Restart => {
            server::restart(&config, port).await?;
            println!("Server on port {} restarted", port);
        }
        Commands::Run { command } => {
            server::exec_command(&config, port, &command).await?;
        }
        Commands::Logs { follow, clear } => {
            server::logs(&config, port, follow, clear).await?;
            if clear {
                println!("PHP error log cleared");
            }
        }
        Commands::List => {
            let servers = server::list(&config).await?;
            print!("{}", server::format_server_table(&servers));
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
