//! Route prices.
//!
//! A route is priced either in dollars (`"$0.001"`), converted to atomic units of
//! the network's default stablecoin, or directly in atomic units of an explicit
//! asset. Both forms are parsed and validated when the configuration is loaded.

use crate::errors::{Result, X402Error};
use crate::network::{ChainFamily, Eip712Domain, TokenDeployment};
use ethers::types::U256;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A non-negative dollar amount, parsed from a `$`-prefixed decimal literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoneyAmount(Decimal);

impl MoneyAmount {
    /// Parses `"$0.001"`-style input. The `$` is mandatory.
    pub fn parse(input: &str) -> Result<Self> {
        let digits = input
            .trim()
            .strip_prefix('$')
            .ok_or_else(|| X402Error::InvalidAmount(format!("{input}: expected a leading '$'")))?;
        let well_formed = !digits.is_empty()
            && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
            && digits.chars().filter(|c| *c == '.').count() <= 1
            && digits.chars().any(|c| c.is_ascii_digit());
        if !well_formed {
            return Err(X402Error::InvalidAmount(format!(
                "{input}: not a non-negative decimal literal"
            )));
        }
        let decimal = Decimal::from_str(digits)
            .map_err(|e| X402Error::InvalidAmount(format!("{input}: {e}")))?;
        Ok(MoneyAmount(decimal))
    }

    /// Number of decimal places in the original input.
    pub fn scale(&self) -> u32 {
        self.0.scale()
    }

    /// The value without its decimal point, e.g. `12.34` gives `1234`.
    pub fn mantissa(&self) -> u128 {
        self.0.mantissa().unsigned_abs()
    }

    /// Converts to the smallest unit of a token with `decimals` places.
    ///
    /// Fails when the amount is more precise than the token can represent.
    pub fn to_atomic(&self, decimals: u8) -> Result<String> {
        let decimals = u32::from(decimals);
        if self.scale() > decimals {
            return Err(X402Error::InvalidAmount(format!(
                "${} has {} decimal places but the token only supports {}",
                self, self.scale(), decimals
            )));
        }
        U256::from(10u8)
            .checked_pow(U256::from(decimals - self.scale()))
            .and_then(|factor| U256::from(self.mantissa()).checked_mul(factor))
            .map(|value| value.to_string())
            .ok_or_else(|| {
                X402Error::InvalidAmount(format!(
                    "${self} with {decimals} decimals overflows uint256"
                ))
            })
    }
}

impl Display for MoneyAmount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl FromStr for MoneyAmount {
    type Err = X402Error;

    fn from_str(s: &str) -> Result<Self> {
        MoneyAmount::parse(s)
    }
}

/// Validates an atomic amount: a non-negative integer literal that fits in a uint256.
pub fn parse_atomic_amount(amount: &str) -> Result<U256> {
    if amount.is_empty() || !amount.chars().all(|c| c.is_ascii_digit()) {
        return Err(X402Error::InvalidAmount(format!(
            "'{amount}' is not a non-negative integer literal"
        )));
    }
    U256::from_dec_str(amount)
        .map_err(|e| X402Error::InvalidAmount(format!("'{amount}' does not fit in uint256: {e}")))
}

/// The token an atomic price is denominated in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AssetRef {
    /// An ERC-20 style contract.
    Evm {
        address: String,
        decimals: u8,
        #[serde(default)]
        eip712: Option<Eip712Domain>,
    },
    /// A bare mint or token identifier on a non-EVM chain.
    Mint(String),
}

impl AssetRef {
    pub fn family(&self) -> ChainFamily {
        match self {
            AssetRef::Evm { .. } => ChainFamily::Evm,
            AssetRef::Mint(_) => ChainFamily::Solana,
        }
    }

    pub fn address(&self) -> &str {
        match self {
            AssetRef::Evm { address, .. } => address,
            AssetRef::Mint(mint) => mint,
        }
    }

    pub fn eip712(&self) -> Option<&Eip712Domain> {
        match self {
            AssetRef::Evm { eip712, .. } => eip712.as_ref(),
            AssetRef::Mint(_) => None,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            AssetRef::Evm { address, .. } => {
                let hex = address
                    .strip_prefix("0x")
                    .or_else(|| address.strip_prefix("0X"))
                    .unwrap_or_default();
                if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(X402Error::InvalidAddress(format!(
                        "asset {address}: expected a 0x-prefixed hex contract address"
                    )));
                }
                Ok(())
            }
            AssetRef::Mint(mint) if mint.trim().is_empty() => {
                Err(X402Error::MissingField("asset".to_string()))
            }
            AssetRef::Mint(_) => Ok(()),
        }
    }
}

impl From<&TokenDeployment> for AssetRef {
    fn from(token: &TokenDeployment) -> Self {
        if token.address.starts_with("0x") {
            AssetRef::Evm {
                address: token.address.clone(),
                decimals: token.decimals,
                eip712: token.eip712.clone(),
            }
        } else {
            AssetRef::Mint(token.address.clone())
        }
    }
}

/// Price of a route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawPrice")]
pub enum PriceSpec {
    /// Dollar-denominated, settled in the network's default stablecoin.
    Dollar(MoneyAmount),
    /// Atomic units of an explicit asset, passed through unchanged.
    Atomic { amount: String, asset: AssetRef },
}

impl PriceSpec {
    /// Builds a dollar price from a `"$0.01"` literal.
    pub fn dollar(amount: &str) -> Result<Self> {
        Ok(PriceSpec::Dollar(MoneyAmount::parse(amount)?))
    }

    /// Builds an atomic price, validating the amount and the asset reference.
    pub fn atomic(amount: impl Into<String>, asset: AssetRef) -> Result<Self> {
        let amount = amount.into();
        parse_atomic_amount(&amount)?;
        asset.validate()?;
        Ok(PriceSpec::Atomic { amount, asset })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPrice {
    Dollar(String),
    Atomic { amount: String, asset: AssetRef },
}

impl TryFrom<RawPrice> for PriceSpec {
    type Error = X402Error;

    fn try_from(raw: RawPrice) -> Result<Self> {
        match raw {
            RawPrice::Dollar(amount) => PriceSpec::dollar(&amount),
            RawPrice::Atomic { amount, asset } => PriceSpec::atomic(amount, asset),
        }
    }
}
