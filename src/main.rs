use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fxbest::core::log::init_logging;
use fxbest::wire::WireFormat;
use fxbest::{AppCommand, CommandStatus};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for AppCommand {
    fn from(cmd: Commands) -> AppCommand {
        match cmd {
            Commands::Quote {
                from,
                to,
                amount,
                deadline_ms,
            } => AppCommand::Quote {
                from,
                to,
                amount,
                deadline: deadline_ms.map(Duration::from_millis),
            },
            Commands::Convert { format, body } => AppCommand::Convert { format, body },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Find the best quote for converting AMOUNT of FROM into TO
    Quote {
        /// Source currency, e.g. USD
        from: String,
        /// Target currency, e.g. EUR
        to: String,
        /// Amount of the source currency
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
        /// Give up on providers that have not answered after this many milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,
    },
    /// Answer one encoded request read from a file or stdin
    Convert {
        /// Encoding of the request and of the reply
        #[arg(short, long, value_enum)]
        format: WireFormat,
        /// File holding the request body; stdin when omitted
        #[arg(short, long)]
        body: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => fxbest::cli::setup::setup().map(|()| CommandStatus::Succeeded),
        Some(cmd) => fxbest::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(CommandStatus::Succeeded)
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    Ok(match result? {
        CommandStatus::Succeeded => ExitCode::SUCCESS,
        CommandStatus::Failed => ExitCode::FAILURE,
    })
}
