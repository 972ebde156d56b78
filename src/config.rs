//! Gate configuration.
//!
//! A [`GateConfig`] is plain data, loaded from JSON or the environment. Nothing
//! here is validated beyond its JSON shape; [`Gate::from_config`] does the
//! full check before the server starts.
//!
//! ```json
//! {
//!   "payTo": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
//!   "facilitatorUrl": "https://x402.org/facilitator",
//!   "routes": {
//!     "GET /weather": { "price": "$0.001", "network": "base-sepolia" },
//!     "/premium/*": {
//!       "price": {
//!         "amount": "100000",
//!         "asset": { "address": "0x036CbD53842c5426634e7929541eC2318f3dCF7e", "decimals": 6 }
//!       },
//!       "network": "base-sepolia"
//!     }
//!   }
//! }
//! ```
//!
//! [`Gate::from_config`]: crate::gate::Gate::from_config

use crate::errors::{Result, X402Error};
use crate::facilitator::FacilitatorClient;
use crate::network::{Eip712Domain, Network, PayTo};
use crate::price::{AssetRef, PriceSpec};
use crate::routes::{RouteConfig, RouteTable};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Facilitator used when none is configured.
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";

/// One priced route, keyed in [`GateConfig::routes`] by `"METHOD /path"` or `"/path"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RouteEntryConfig {
    pub price: PriceSpec,
    pub network: Network,
    #[serde(default)]
    pub max_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl RouteEntryConfig {
    pub fn new(price: PriceSpec, network: Network) -> Self {
        Self {
            price,
            network,
            max_timeout_seconds: None,
            description: None,
            mime_type: None,
        }
    }

    fn into_route(self, key: &str) -> Result<RouteConfig> {
        let mut route = RouteConfig::new(key.parse()?, self.price, self.network);
        route.max_timeout_seconds = self.max_timeout_seconds;
        route.description = self.description;
        route.mime_type = self.mime_type;
        Ok(route)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateConfig {
    /// Recipient of every payment
    #[serde(default)]
    pub pay_to: String,

    #[serde(default = "default_facilitator_url")]
    pub facilitator_url: String,

    /// Public origin, optionally with a path prefix, used in `resource` URLs
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub facilitator_timeout_seconds: Option<u64>,

    /// Extra headers for every facilitator request
    #[serde(default)]
    pub facilitator_headers: BTreeMap<String, String>,

    #[serde(default)]
    pub routes: BTreeMap<String, RouteEntryConfig>,
}

fn default_facilitator_url() -> String {
    DEFAULT_FACILITATOR_URL.to_string()
}

impl GateConfig {
    pub fn new(pay_to: impl Into<String>, facilitator_url: impl Into<String>) -> Self {
        Self {
            pay_to: pay_to.into(),
            facilitator_url: facilitator_url.into(),
            base_url: None,
            facilitator_timeout_seconds: None,
            facilitator_headers: BTreeMap::new(),
            routes: BTreeMap::new(),
        }
    }

    pub fn with_route(mut self, key: impl Into<String>, entry: RouteEntryConfig) -> Self {
        self.routes.insert(key.into(), entry);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Reads the configuration from environment variables.
    ///
    /// `PAY_TO` is required. `FACILITATOR_URL`, `BASE_URL` and
    /// `FACILITATOR_TIMEOUT_SECONDS` are optional. Routes come from the JSON
    /// object in `ROUTES_FILE`, or from [`GateConfig::demo_routes`] when unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let pay_to = lookup("PAY_TO")
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| X402Error::ConfigError("PAY_TO is not set".to_string()))?;
        let mut config = Self::new(
            pay_to,
            lookup("FACILITATOR_URL").unwrap_or_else(default_facilitator_url),
        );
        config.base_url = lookup("BASE_URL");
        config.facilitator_timeout_seconds = lookup("FACILITATOR_TIMEOUT_SECONDS")
            .map(|value| {
                value.parse::<u64>().map_err(|e| {
                    X402Error::ConfigError(format!("FACILITATOR_TIMEOUT_SECONDS={value}: {e}"))
                })
            })
            .transpose()?;
        config.routes = match lookup("ROUTES_FILE") {
            Some(path) => {
                let contents = std::fs::read_to_string(&path)?;
                serde_json::from_str(&contents)?
            }
            None => Self::demo_routes()?,
        };
        Ok(config)
    }

    /// `GET /weather` for $0.001 and `GET /premium/*` for 0.1 USDC, both on Base Sepolia.
    pub fn demo_routes() -> Result<BTreeMap<String, RouteEntryConfig>> {
        let usdc = AssetRef::Evm {
            address: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".to_string(),
            decimals: 6,
            eip712: Some(Eip712Domain {
                name: "USDC".to_string(),
                version: "2".to_string(),
            }),
        };
        let mut weather = RouteEntryConfig::new(PriceSpec::dollar("$0.001")?, Network::BaseSepolia);
        weather.description = Some("Current weather report".to_string());
        let mut premium =
            RouteEntryConfig::new(PriceSpec::atomic("100000", usdc)?, Network::BaseSepolia);
        premium.description = Some("Premium content".to_string());

        Ok(BTreeMap::from([
            ("GET /weather".to_string(), weather),
            ("GET /premium/*".to_string(), premium),
        ]))
    }

    pub fn pay_to(&self) -> Result<PayTo> {
        PayTo::parse(&self.pay_to)
    }

    pub fn base_url(&self) -> Result<Option<Url>> {
        Ok(self.base_url.as_deref().map(Url::parse).transpose()?)
    }

    /// Parses every route key and builds the matcher.
    pub fn route_table(&self) -> Result<RouteTable> {
        let routes = self
            .routes
            .iter()
            .map(|(key, entry)| entry.clone().into_route(key))
            .collect::<Result<Vec<_>>>()?;
        RouteTable::new(routes)
    }

    pub fn facilitator_client(&self) -> Result<FacilitatorClient> {
        let mut client = FacilitatorClient::try_new(&self.facilitator_url)?;
        if let Some(seconds) = self.facilitator_timeout_seconds {
            client = client.with_timeout(Duration::from_secs(seconds));
        }
        if !self.facilitator_headers.is_empty() {
            let mut headers = HeaderMap::new();
            for (name, value) in &self.facilitator_headers {
                let header_name = HeaderName::try_from(name.as_str()).map_err(|e| {
                    X402Error::ConfigError(format!("facilitator header {name}: {e}"))
                })?;
                let header_value = HeaderValue::try_from(value.as_str()).map_err(|e| {
                    X402Error::ConfigError(format!("facilitator header {name}: {e}"))
                })?;
                headers.insert(header_name, header_value);
            }
            client = client.with_headers(headers);
        }
        Ok(client)
    }
}
