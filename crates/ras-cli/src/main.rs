//! RAS CLI - drive the resource acquisition registry from a terminal

mod session;

use clap::{Parser, Subcommand};
use ras_core::acquisition::{LockTimeout, ResourceAcquisitionService};
use ras_core::config::Config;
use session::{OutputFormat, Session};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

#[derive(Parser)]
#[command(name = "ras")]
#[command(author, version, about = "Resource acquisition registry with timed auto-unlock", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run statements against a fresh registry, one per argument
    Exec {
        /// Auto-unlock timeout (e.g. 500ms, 30s, never); defaults to config
        #[arg(short, long)]
        timeout: Option<LockTimeout>,
        /// Statements such as "lock U1 R1", "unlock U1 R1", "list", "sleep 1s"
        #[arg(required = true)]
        statements: Vec<String>,
    },

    /// Read statements from stdin until EOF or `exit`
    Shell {
        /// Auto-unlock timeout (e.g. 500ms, 30s, never); defaults to config
        #[arg(short, long)]
        timeout: Option<LockTimeout>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays parseable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("ras=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Exec {
            timeout,
            statements,
        } => cmd_exec(timeout, &statements, cli.format).await,
        Commands::Shell { timeout } => cmd_shell(timeout, cli.format, cli.quiet).await,
        Commands::Config { action } => cmd_config(action, cli.quiet),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn build_service(
    timeout: Option<LockTimeout>,
) -> anyhow::Result<ResourceAcquisitionService<String>> {
    let mut config = Config::load()?.acquisition;
    if let Some(timeout) = timeout {
        config.unlock_timeout = timeout;
    }
    config.validate()?;

    debug!(unlock_timeout = %config.unlock_timeout, "Starting registry");
    Ok(ResourceAcquisitionService::new(config)?)
}

async fn cmd_exec(
    timeout: Option<LockTimeout>,
    statements: &[String],
    format: OutputFormat,
) -> anyhow::Result<()> {
    let session = Session::new(build_service(timeout)?, format);

    for statement in statements {
        if let Some(output) = session.execute(statement).await? {
            println!("{}", output);
        }
    }

    session.service().release_all();
    Ok(())
}

async fn cmd_shell(
    timeout: Option<LockTimeout>,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let session = Session::new(build_service(timeout)?, format);

    if !quiet {
        println!(
            "RAS shell (unlock timeout {}). Type `exit` to quit.",
            session.service().unlock_timeout()
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
            break;
        }

        match session.execute(trimmed).await {
            Ok(Some(output)) => println!("{}", output),
            Ok(None) => {}
            Err(e) => eprintln!("Error: {:#}", e),
        }
    }

    session.service().release_all();
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
