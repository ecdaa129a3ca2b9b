use super::ui::{StyleType, amount_cell, header_cell, na_cell, new_spinner, new_styled_table, style_text};
use crate::core::{AggregationResult, ConversionRequest, QuoteAggregator};
use crate::wire::{self, WireFormat, WireResponse};
use anyhow::{Context, Result};
use comfy_table::{Cell, Color, Table};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Runs one aggregation and prints every provider outcome plus the winner.
///
/// # Parameters
/// - `aggregator`: Registered providers to query
/// - `request`: The conversion to quote
/// - `deadline`: Cancels all outstanding provider calls once elapsed
///
/// # Returns
/// The aggregation result, whatever its status
pub async fn run_quote(
    aggregator: &QuoteAggregator,
    request: &ConversionRequest,
    deadline: Option<Duration>,
) -> Result<AggregationResult> {
    let cancel = CancellationToken::new();
    let _stop_watcher = cancel.clone().drop_guard();
    cancel_on_interrupt(cancel.clone(), deadline);

    let spinner = new_spinner(format!(
        "Querying {} providers for {} {} -> {}",
        aggregator.provider_names().len(),
        request.amount,
        request.source_currency,
        request.target_currency
    ));
    let result = aggregator.get_best_quote(request, &cancel).await;
    spinner.finish_and_clear();

    if !result.outcomes.is_empty() {
        println!("{}", render_outcomes(&result));
    }
    println!("{}", summary_line(&result));

    Ok(result)
}

/// Reads one encoded request, aggregates it and prints the encoded reply.
///
/// The body comes from `body_path` when given, stdin otherwise.
pub async fn run_convert(
    aggregator: &QuoteAggregator,
    format: WireFormat,
    body_path: Option<&Path>,
) -> Result<WireResponse> {
    let body = match body_path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read request body from {}", path.display()))?,
        None => {
            let mut body = String::new();
            tokio::io::stdin()
                .read_to_string(&mut body)
                .await
                .context("Failed to read request body from stdin")?;
            body
        }
    };
    debug!(%format, bytes = body.len(), "Read request body");

    let cancel = CancellationToken::new();
    let _stop_watcher = cancel.clone().drop_guard();
    cancel_on_interrupt(cancel.clone(), None);

    let response = wire::handle(format, &body, aggregator, &cancel)
        .await
        .context("Failed to produce a response")?;

    let status = format!("status {}", response.status_code);
    let status = if response.status_code == 200 {
        style_text(&status, StyleType::Subtle)
    } else {
        style_text(&status, StyleType::Error)
    };
    eprintln!("{status}");
    println!("{}", response.body);

    Ok(response)
}

/// Cancels `cancel` on Ctrl-C or once `deadline` elapses. The watcher exits
/// on its own when `cancel` fires for any other reason.
fn cancel_on_interrupt(cancel: CancellationToken, deadline: Option<Duration>) {
    tokio::spawn(async move {
        let deadline_elapsed = async {
            match deadline {
                Some(deadline) => tokio::time::sleep(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => {}
            Ok(()) = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling outstanding provider calls");
                cancel.cancel();
            }
            _ = deadline_elapsed => {
                warn!(?deadline, "Deadline reached, cancelling outstanding provider calls");
                cancel.cancel();
            }
        }
    });
}

/// One row per provider, in registration order, with the winner highlighted.
pub fn render_outcomes(result: &AggregationResult) -> Table {
    let mut table = new_styled_table();
    table.set_header(vec![
        header_cell("Provider"),
        header_cell("Converted"),
        header_cell("Status"),
    ]);

    let mut winner_marked = false;
    for outcome in &result.outcomes {
        let is_winner = !winner_marked
            && result.best.as_ref().is_some_and(|best| {
                best.provider == outcome.provider
                    && outcome.converted_amount() == Some(best.converted_amount)
            });
        winner_marked |= is_winner;

        let (amount, status) = match &outcome.result {
            Ok(amount) if is_winner => (
                amount_cell(amount.to_string(), true),
                Cell::new("best").fg(Color::Green),
            ),
            Ok(amount) => (amount_cell(amount.to_string(), false), Cell::new("ok")),
            Err(reason) => (na_cell(true), Cell::new(reason.to_string()).fg(Color::Red)),
        };
        table.add_row(vec![Cell::new(&outcome.provider), amount, status]);
    }

    table
}

fn summary_line(result: &AggregationResult) -> String {
    match &result.best {
        Some(best) => format!(
            "{} {} {} = {} {} via {} (rate {}) {}",
            style_text("Best:", StyleType::TotalLabel),
            best.amount,
            best.source_currency,
            style_text(&best.converted_amount.to_string(), StyleType::TotalValue),
            best.target_currency,
            best.provider,
            best.rate.normalize(),
            style_text(
                &result.produced_at.format("at %H:%M:%S UTC").to_string(),
                StyleType::Subtle
            )
        ),
        None => style_text(
            &format!("{}: {}", result.status, result.message),
            StyleType::Error,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SimulatedProviderConfig;
    use crate::core::{
        BestQuote, ProviderFailure, ProviderOutcome, QuoteProvider, QuoteStatus,
    };
    use crate::providers::SimulatedProvider;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn simulated(name: &str, latency_ms: u64, rate: Decimal) -> Arc<dyn QuoteProvider> {
        Arc::new(SimulatedProvider::new(&SimulatedProviderConfig {
            name: name.to_string(),
            latency_ms,
            variation: Decimal::ZERO,
            rates: BTreeMap::from([("USD/EUR".to_string(), rate)]),
        }))
    }

    #[test]
    fn test_render_outcomes_lists_every_provider() {
        let result = AggregationResult::success(
            BestQuote {
                source_currency: "USD".to_string(),
                target_currency: "EUR".to_string(),
                amount: dec!(100),
                converted_amount: dec!(86.2),
                rate: dec!(0.862),
                provider: "Provider2".to_string(),
            },
            vec![
                ProviderOutcome::failure(
                    "Provider1",
                    ProviderFailure::Status("503 Service Unavailable".to_string()),
                ),
                ProviderOutcome::success("Provider2", dec!(86.2)),
                ProviderOutcome::success("Provider3", dec!(84.8)),
            ],
        );

        let rendered = render_outcomes(&result).to_string();
        for expected in [
            "Provider1",
            "Provider2",
            "Provider3",
            "86.2",
            "84.8",
            "best",
            "503 Service Unavailable",
        ] {
            assert!(rendered.contains(expected), "missing {expected}:\n{rendered}");
        }
        assert_eq!(rendered.matches("best").count(), 1);
    }

    #[test]
    fn test_summary_line_reports_failure() {
        let line = summary_line(&AggregationResult::all_failed(Vec::new()));
        assert!(line.contains("All exchange rate providers failed or are unavailable"));
    }

    #[tokio::test]
    async fn test_run_quote_picks_best() {
        let aggregator = QuoteAggregator::with_defaults(vec![
            simulated("Low", 0, dec!(0.84)),
            simulated("High", 0, dec!(0.86)),
        ]);

        let result = run_quote(
            &aggregator,
            &ConversionRequest::new("USD", "EUR", dec!(100)),
            None,
        )
        .await
        .unwrap();

        assert_eq!(result.status, QuoteStatus::Success);
        assert_eq!(result.best.unwrap().provider, "High");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_quote_deadline_cancels_providers() {
        let aggregator = QuoteAggregator::with_defaults(vec![
            simulated("Slow1", 60_000, dec!(0.84)),
            simulated("Slow2", 60_000, dec!(0.86)),
        ]);

        let result = run_quote(
            &aggregator,
            &ConversionRequest::new("USD", "EUR", dec!(100)),
            Some(Duration::from_millis(50)),
        )
        .await
        .unwrap();

        assert_eq!(result.status, QuoteStatus::AllProvidersFailed);
        assert!(
            result
                .outcomes
                .iter()
                .all(|o| o.failure_reason() == Some(&ProviderFailure::Cancelled))
        );
    }

    #[tokio::test]
    async fn test_run_convert_reads_body_file() -> Result<()> {
        let aggregator = QuoteAggregator::with_defaults(vec![simulated("Offline", 0, dec!(0.85))]);
        let body = tempfile::NamedTempFile::new()?;
        std::fs::write(
            body.path(),
            "<XML><From>USD</From><To>EUR</To><Amount>100</Amount></XML>",
        )?;

        let response = run_convert(&aggregator, WireFormat::Xml, Some(body.path())).await?;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "<XML><Result>85</Result></XML>");
        Ok(())
    }

    #[tokio::test]
    async fn test_run_convert_missing_file() {
        let aggregator = QuoteAggregator::with_defaults(Vec::new());
        let err = run_convert(
            &aggregator,
            WireFormat::Json,
            Some(Path::new("/definitely/not/here.json")),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Failed to read request body"));
    }
}
