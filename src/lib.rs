pub mod cli;
pub mod core;
pub mod providers;
pub mod wire;

use crate::core::config::AppConfig;
use crate::core::{AggregatorConfig, ConversionRequest, QuoteAggregator};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use wire::WireFormat;

pub enum AppCommand {
    Quote {
        from: String,
        to: String,
        amount: Decimal,
        deadline: Option<Duration>,
    },
    Convert {
        format: WireFormat,
        body: Option<PathBuf>,
    },
}

/// Whether a command produced a usable answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Succeeded,
    Failed,
}

pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    match config_path {
        Some(path) => AppConfig::load_from_path(path),
        None => AppConfig::load(),
    }
}

/// Registers every configured provider, in configuration order.
pub fn build_aggregator(config: &AppConfig) -> Result<QuoteAggregator> {
    let providers = providers::build_providers(&config.providers)
        .context("Failed to initialise providers")?;
    Ok(QuoteAggregator::new(
        providers,
        AggregatorConfig {
            provider_timeout: config.provider_timeout(),
        },
    ))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<CommandStatus> {
    let config = load_config(config_path)?;
    debug!("Loaded config: {config:#?}");

    let aggregator = build_aggregator(&config)?;
    info!(providers = ?aggregator.provider_names(), "Providers registered");

    match command {
        AppCommand::Quote {
            from,
            to,
            amount,
            deadline,
        } => {
            let request = ConversionRequest::new(from, to, amount);
            let result = cli::quote::run_quote(&aggregator, &request, deadline).await?;
            Ok(if result.status.is_success() {
                CommandStatus::Succeeded
            } else {
                CommandStatus::Failed
            })
        }
        AppCommand::Convert { format, body } => {
            let response = cli::quote::run_convert(&aggregator, format, body.as_deref()).await?;
            Ok(if response.status_code == 200 {
                CommandStatus::Succeeded
            } else {
                CommandStatus::Failed
            })
        }
    }
}
