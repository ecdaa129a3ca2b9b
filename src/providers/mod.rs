pub mod exchange_api;
pub mod json_api;
pub mod simulated;
pub mod util;
pub mod xml_api;

use crate::core::QuoteProvider;
use crate::core::config::ProviderConfig;
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

pub use exchange_api::ExchangeApiProvider;
pub use json_api::JsonApiProvider;
pub use simulated::SimulatedProvider;
pub use xml_api::XmlApiProvider;

/// Instantiates every configured provider, keeping configuration order as the
/// registration order.
pub fn build_providers(configs: &[ProviderConfig]) -> Result<Vec<Arc<dyn QuoteProvider>>> {
    configs
        .iter()
        .map(|config| {
            debug!(provider = config.name(), "Registering provider");
            let provider: Arc<dyn QuoteProvider> = match config {
                ProviderConfig::Json(c) => Arc::new(JsonApiProvider::new(c)?),
                ProviderConfig::Xml(c) => Arc::new(XmlApiProvider::new(c)?),
                ProviderConfig::Exchange(c) => Arc::new(ExchangeApiProvider::new(c)?),
                ProviderConfig::Simulated(c) => Arc::new(SimulatedProvider::new(c)),
            };
            Ok(provider)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{AppConfig, HttpProviderConfig};

    #[tokio::test]
    async fn test_build_providers_keeps_order() {
        let mut configs = AppConfig::default().providers;
        configs.insert(
            0,
            ProviderConfig::Xml(HttpProviderConfig {
                name: "XmlAPI".to_string(),
                base_url: "http://localhost:5001".to_string(),
                api_key: None,
            }),
        );

        let providers = build_providers(&configs).unwrap();
        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, ["XmlAPI", "MockJsonAPI", "MockXmlAPI", "MockJsonAPI2"]);
    }

    #[test]
    fn test_build_no_providers() {
        assert!(build_providers(&[]).unwrap().is_empty());
    }
}
