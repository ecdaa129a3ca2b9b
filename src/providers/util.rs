use crate::core::ProviderFailure;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const USER_AGENT: &str = concat!("fxbest/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client a provider keeps for its whole lifetime.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().user_agent(USER_AGENT).build()
}

/// Joins `base_url` and `endpoint` with exactly one slash between them.
pub fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), endpoint)
}

/// Sends `request` once and returns the body of a successful response
///
/// # Parameters
/// - `request`: Fully built request, sent exactly once
/// - `cancel`: Dropping the in-flight request when this fires
///
/// # Returns
/// The response text, or the failure describing why there is none
pub async fn fetch_body(
    request: reqwest::RequestBuilder,
    cancel: &CancellationToken,
) -> Result<String, ProviderFailure> {
    let exchange = async {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, body = %body, "Upstream returned error status");
            return Err(ProviderFailure::Status(status.to_string()));
        }

        response
            .text()
            .await
            .map_err(|e| ProviderFailure::Transport(e.to_string()))
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderFailure::Cancelled),
        result = exchange => result,
    }
}

/// Rejects converted amounts no caller could use.
pub fn positive_amount(amount: Decimal) -> Result<Decimal, ProviderFailure> {
    if amount > Decimal::ZERO {
        Ok(amount)
    } else {
        Err(ProviderFailure::InvalidResponse(format!(
            "non-positive converted amount {amount}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_endpoint_url_joins_cleanly() {
        assert_eq!(endpoint_url("http://a/", "rate"), "http://a/rate");
        assert_eq!(endpoint_url("http://a", "rate"), "http://a/rate");
    }

    #[test]
    fn test_positive_amount() {
        assert_eq!(positive_amount(dec!(1.5)), Ok(dec!(1.5)));
        assert!(positive_amount(dec!(0)).is_err());
        assert!(positive_amount(dec!(-3)).is_err());
    }

    #[tokio::test]
    async fn test_fetch_body_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .expect(1)
            .mount(&server)
            .await;

        let client = http_client().unwrap();
        let body = fetch_body(
            client.get(endpoint_url(&server.uri(), "ok")),
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(body.as_deref(), Ok("hello"));
    }

    #[tokio::test]
    async fn test_fetch_body_reports_status_without_retrying() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .expect(1)
            .mount(&server)
            .await;

        let client = http_client().unwrap();
        let result = fetch_body(
            client.get(endpoint_url(&server.uri(), "down")),
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(
            result,
            Err(ProviderFailure::Status("503 Service Unavailable".to_string()))
        );
    }

    #[tokio::test]
    async fn test_fetch_body_stops_on_cancellation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;

        let client = http_client().unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = fetch_body(client.get(endpoint_url(&server.uri(), "slow")), &cancel).await;
        assert_eq!(result, Err(ProviderFailure::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
