//! Requirement resolver.
//!
//! Turns a matched [`RouteConfig`] into the wire-visible
//! [`PaymentRequirements`] for one request. Resolution is pure: the same route
//! and resource URL always give the same record.

use crate::errors::{Result, X402Error};
use crate::network::{AssetRegistry, PayTo};
use crate::price::{AssetRef, PriceSpec};
use crate::routes::RouteConfig;
use crate::types::{PaymentRequirements, DEFAULT_MIME_TYPE, EXACT_SCHEME};
use serde_json::json;
use url::Url;

/// `maxTimeoutSeconds` used when a route does not override it.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub struct RequirementResolver {
    pay_to: PayTo,
    assets: AssetRegistry,
}

impl RequirementResolver {
    pub fn new(pay_to: PayTo, assets: AssetRegistry) -> Self {
        Self { pay_to, assets }
    }

    pub fn pay_to(&self) -> &PayTo {
        &self.pay_to
    }

    /// Validates a route against the recipient and the asset registry.
    ///
    /// Called once per route at startup so that [`resolve`](Self::resolve)
    /// cannot fail on configuration grounds at request time.
    pub fn check(&self, route: &RouteConfig) -> Result<()> {
        let network = route.network;
        self.pay_to.check_network(network).map_err(|e| {
            X402Error::ConfigError(format!("route {}: {e}", route.pattern))
        })?;

        if route.max_timeout_seconds == Some(0) {
            return Err(X402Error::ConfigError(format!(
                "route {}: maxTimeoutSeconds must be positive",
                route.pattern
            )));
        }

        match &route.price {
            PriceSpec::Dollar(amount) => {
                let token = self.assets.default_for(network).ok_or_else(|| {
                    X402Error::ConfigError(format!(
                        "route {}: dollar price on {network} without a registered default asset",
                        route.pattern
                    ))
                })?;
                amount.to_atomic(token.decimals).map_err(|e| {
                    X402Error::ConfigError(format!("route {}: {e}", route.pattern))
                })?;
            }
            PriceSpec::Atomic { asset, .. } => {
                if asset.family() != network.family() {
                    return Err(X402Error::ConfigError(format!(
                        "route {}: asset {} is a {} asset but {network} is a {} network",
                        route.pattern,
                        asset.address(),
                        asset.family(),
                        network.family()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Builds the payment requirement for `route`, served at `resource`.
    pub fn resolve(&self, route: &RouteConfig, resource: &Url) -> Result<PaymentRequirements> {
        let (max_amount_required, asset) = match &route.price {
            PriceSpec::Dollar(amount) => {
                let token = self.assets.default_for(route.network).ok_or_else(|| {
                    X402Error::ConfigError(format!("no default asset for {}", route.network))
                })?;
                (amount.to_atomic(token.decimals)?, AssetRef::from(token))
            }
            PriceSpec::Atomic { amount, asset } => (amount.clone(), asset.clone()),
        };

        let mut resource = resource.clone();
        resource.set_query(None);
        resource.set_fragment(None);

        Ok(PaymentRequirements {
            scheme: EXACT_SCHEME.to_string(),
            network: route.network,
            max_amount_required,
            resource: resource.to_string(),
            description: route.description.clone(),
            mime_type: route
                .mime_type
                .clone()
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
            pay_to: self.pay_to.to_string(),
            max_timeout_seconds: route
                .max_timeout_seconds
                .unwrap_or(DEFAULT_MAX_TIMEOUT_SECONDS),
            asset: asset.address().to_string(),
            extra: asset
                .eip712()
                .map(|domain| json!({ "name": domain.name, "version": domain.version })),
        })
    }
}
