//! Supported networks, recipient addresses and default stablecoin deployments.
//!
//! Networks form a fixed set of testnet/mainnet pairs per chain family. Every
//! network knows its [`ChainFamily`], which is what recipient addresses and
//! asset references are checked against when a gate is built.

use crate::errors::{Result, X402Error};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Chain family a network belongs to. Decides which address format is valid.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub enum ChainFamily {
    /// EVM-compatible chains: 20-byte hex addresses with a `0x` prefix.
    Evm,
    /// Solana: base58-encoded 32-byte public keys.
    Solana,
}

impl Display for ChainFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainFamily::Evm => write!(f, "evm"),
            ChainFamily::Solana => write!(f, "solana"),
        }
    }
}

/// Supported networks.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    /// Base mainnet (chain ID 8453).
    #[serde(rename = "base")]
    Base,
    /// Base Sepolia testnet (chain ID 84532).
    #[serde(rename = "base-sepolia")]
    BaseSepolia,
    /// Avalanche C-Chain mainnet (chain ID 43114).
    #[serde(rename = "avalanche")]
    Avalanche,
    /// Avalanche Fuji testnet (chain ID 43113).
    #[serde(rename = "avalanche-fuji")]
    AvalancheFuji,
    /// Polygon mainnet (chain ID 137).
    #[serde(rename = "polygon")]
    Polygon,
    /// Polygon Amoy testnet (chain ID 80002).
    #[serde(rename = "polygon-amoy")]
    PolygonAmoy,
    /// Sei mainnet (chain ID 1329).
    #[serde(rename = "sei")]
    Sei,
    /// Sei testnet (chain ID 1328).
    #[serde(rename = "sei-testnet")]
    SeiTestnet,
    /// Solana mainnet.
    #[serde(rename = "solana")]
    Solana,
    /// Solana devnet.
    #[serde(rename = "solana-devnet")]
    SolanaDevnet,
}

impl Network {
    /// Return all known [`Network`] variants.
    pub fn variants() -> &'static [Network] {
        &[
            Network::Base,
            Network::BaseSepolia,
            Network::Avalanche,
            Network::AvalancheFuji,
            Network::Polygon,
            Network::PolygonAmoy,
            Network::Sei,
            Network::SeiTestnet,
            Network::Solana,
            Network::SolanaDevnet,
        ]
    }

    /// Wire name of the network, as it appears in payment requirements.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Base => "base",
            Network::BaseSepolia => "base-sepolia",
            Network::Avalanche => "avalanche",
            Network::AvalancheFuji => "avalanche-fuji",
            Network::Polygon => "polygon",
            Network::PolygonAmoy => "polygon-amoy",
            Network::Sei => "sei",
            Network::SeiTestnet => "sei-testnet",
            Network::Solana => "solana",
            Network::SolanaDevnet => "solana-devnet",
        }
    }

    pub fn family(&self) -> ChainFamily {
        match self {
            Network::Solana | Network::SolanaDevnet => ChainFamily::Solana,
            _ => ChainFamily::Evm,
        }
    }

    pub fn is_testnet(&self) -> bool {
        matches!(
            self,
            Network::BaseSepolia
                | Network::AvalancheFuji
                | Network::PolygonAmoy
                | Network::SeiTestnet
                | Network::SolanaDevnet
        )
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = X402Error;

    fn from_str(s: &str) -> Result<Self> {
        Network::variants()
            .iter()
            .find(|network| network.as_str() == s)
            .copied()
            .ok_or_else(|| X402Error::UnsupportedNetwork(s.to_string()))
    }
}

/// A recipient address tagged with the chain family it belongs to.
///
/// The textual form is kept exactly as configured so that it round-trips into
/// the `payTo` field unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PayTo {
    Evm(String),
    Solana(String),
}

impl PayTo {
    /// Parses an address, inferring the chain family from its shape.
    ///
    /// `0x`-prefixed values must be valid 20-byte EVM addresses; anything else
    /// must be a base58-encoded 32-byte Solana public key.
    pub fn parse(addr: &str) -> Result<Self> {
        let addr = addr.trim();
        if addr.is_empty() {
            return Err(X402Error::MissingField("payTo".to_string()));
        }
        if addr.starts_with("0x") || addr.starts_with("0X") {
            parse_evm_address(addr)?;
            Ok(PayTo::Evm(addr.to_string()))
        } else {
            parse_solana_address(addr)?;
            Ok(PayTo::Solana(addr.to_string()))
        }
    }

    pub fn family(&self) -> ChainFamily {
        match self {
            PayTo::Evm(_) => ChainFamily::Evm,
            PayTo::Solana(_) => ChainFamily::Solana,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PayTo::Evm(addr) | PayTo::Solana(addr) => addr,
        }
    }

    /// Ensures the recipient can receive payments on `network`.
    pub fn check_network(&self, network: Network) -> Result<()> {
        if self.family() == network.family() {
            Ok(())
        } else {
            Err(X402Error::InvalidAddress(format!(
                "{} is a {} address but network {} belongs to the {} family",
                self.as_str(),
                self.family(),
                network,
                network.family()
            )))
        }
    }
}

impl Display for PayTo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayTo {
    type Err = X402Error;

    fn from_str(s: &str) -> Result<Self> {
        PayTo::parse(s)
    }
}

impl Serialize for PayTo {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PayTo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PayTo::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Validates a `0x`-prefixed 20-byte EVM address.
pub fn parse_evm_address(addr: &str) -> Result<ethers::types::Address> {
    if !(addr.starts_with("0x") || addr.starts_with("0X")) {
        return Err(X402Error::InvalidAddress(format!("{addr}: missing 0x prefix")));
    }
    ethers::types::Address::from_str(addr)
        .map_err(|e| X402Error::InvalidAddress(format!("{addr}: {e}")))
}

/// Validates a base58-encoded 32-byte Solana public key.
pub fn parse_solana_address(addr: &str) -> Result<[u8; 32]> {
    let bytes = bs58::decode(addr)
        .into_vec()
        .map_err(|e| X402Error::InvalidAddress(format!("{addr}: {e}")))?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
        X402Error::InvalidAddress(format!(
            "{addr}: expected 32 bytes, got {}",
            bytes.len()
        ))
    })
}

/// EIP-712 domain of a token, passed through to the requirement's `extra` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
}

/// A token deployed on a specific network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDeployment {
    /// Contract address (EVM) or mint (Solana)
    pub address: String,
    pub decimals: u8,
    pub eip712: Option<Eip712Domain>,
}

impl TokenDeployment {
    fn usdc(address: &str, eip712_name: Option<&str>) -> Self {
        Self {
            address: address.to_string(),
            decimals: 6,
            eip712: eip712_name.map(|name| Eip712Domain {
                name: name.to_string(),
                version: "2".to_string(),
            }),
        }
    }
}

/// Default stablecoin per network, used to price `$`-denominated routes.
///
/// Constructed once at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    defaults: HashMap<Network, TokenDeployment>,
}

impl AssetRegistry {
    /// A registry with no defaults. Dollar-priced routes will be rejected at startup.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Known USDC deployments on every supported network.
    pub fn usdc() -> Self {
        let defaults = HashMap::from([
            (
                Network::Base,
                TokenDeployment::usdc(
                    "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
                    Some("USD Coin"),
                ),
            ),
            (
                Network::BaseSepolia,
                TokenDeployment::usdc("0x036CbD53842c5426634e7929541eC2318f3dCF7e", Some("USDC")),
            ),
            (
                Network::Avalanche,
                TokenDeployment::usdc(
                    "0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E",
                    Some("USD Coin"),
                ),
            ),
            (
                Network::AvalancheFuji,
                TokenDeployment::usdc(
                    "0x5425890298aed601595a70AB815c96711a31Bc65",
                    Some("USD Coin"),
                ),
            ),
            (
                Network::Polygon,
                TokenDeployment::usdc("0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359", Some("USDC")),
            ),
            (
                Network::PolygonAmoy,
                TokenDeployment::usdc("0x41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582", Some("USDC")),
            ),
            (
                Network::Sei,
                TokenDeployment::usdc("0xe15fC38F6D8c56aF07bbCBe3BAf5708A2Bf42392", Some("USDC")),
            ),
            (
                Network::SeiTestnet,
                TokenDeployment::usdc("0x4fCF1784B31630811181f670Aea7A7bEF803eaED", Some("USDC")),
            ),
            (
                Network::Solana,
                TokenDeployment::usdc("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", None),
            ),
            (
                Network::SolanaDevnet,
                TokenDeployment::usdc("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU", None),
            ),
        ]);
        Self { defaults }
    }

    /// Registers (or replaces) the default asset for a network.
    pub fn with_default(mut self, network: Network, token: TokenDeployment) -> Self {
        self.defaults.insert(network, token);
        self
    }

    /// Removes the default asset for a network.
    pub fn without_default(mut self, network: Network) -> Self {
        self.defaults.remove(&network);
        self
    }

    pub fn default_for(&self, network: Network) -> Option<&TokenDeployment> {
        self.defaults.get(&network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVM_ADDR: &str = "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEbb";
    const SOLANA_ADDR: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    #[test]
    fn test_network_names_round_trip() {
        for network in Network::variants() {
            let parsed: Network = network.as_str().parse().unwrap();
            assert_eq!(parsed, *network);
            let json = serde_json::to_string(network).unwrap();
            assert_eq!(json, format!("\"{}\"", network.as_str()));
        }
        assert!("ethereum-goerli".parse::<Network>().is_err());
    }

    #[test]
    fn test_network_families() {
        assert_eq!(Network::BaseSepolia.family(), ChainFamily::Evm);
        assert_eq!(Network::SolanaDevnet.family(), ChainFamily::Solana);
        assert!(Network::BaseSepolia.is_testnet());
        assert!(!Network::Base.is_testnet());
    }

    #[test]
    fn test_pay_to_parsing() {
        let evm = PayTo::parse(EVM_ADDR).unwrap();
        assert_eq!(evm.family(), ChainFamily::Evm);
        assert_eq!(evm.as_str(), EVM_ADDR);

        let solana = PayTo::parse(SOLANA_ADDR).unwrap();
        assert_eq!(solana.family(), ChainFamily::Solana);

        assert!(PayTo::parse("0x1234").is_err());
        assert!(PayTo::parse("not-an-address").is_err());
        assert!(matches!(
            PayTo::parse("  "),
            Err(X402Error::MissingField(_))
        ));
    }

    #[test]
    fn test_pay_to_network_mismatch() {
        let evm = PayTo::parse(EVM_ADDR).unwrap();
        assert!(evm.check_network(Network::Base).is_ok());
        assert!(matches!(
            evm.check_network(Network::Solana),
            Err(X402Error::InvalidAddress(_))
        ));

        let solana = PayTo::parse(SOLANA_ADDR).unwrap();
        assert!(solana.check_network(Network::SolanaDevnet).is_ok());
        assert!(solana.check_network(Network::BaseSepolia).is_err());
    }

    #[test]
    fn test_usdc_registry_covers_every_network() {
        let registry = AssetRegistry::usdc();
        for network in Network::variants() {
            let token = registry.default_for(*network).unwrap();
            assert_eq!(token.decimals, 6);
        }
        let base_sepolia = registry.default_for(Network::BaseSepolia).unwrap();
        assert_eq!(base_sepolia.eip712.as_ref().unwrap().name, "USDC");
        assert!(registry.default_for(Network::Solana).unwrap().eip712.is_none());
    }

    #[test]
    fn test_registry_overrides() {
        let registry = AssetRegistry::usdc().without_default(Network::Polygon);
        assert!(registry.default_for(Network::Polygon).is_none());

        let registry = AssetRegistry::empty().with_default(
            Network::Base,
            TokenDeployment {
                address: "0x0000000000000000000000000000000000000001".to_string(),
                decimals: 18,
                eip712: None,
            },
        );
        assert_eq!(registry.default_for(Network::Base).unwrap().decimals, 18);
        assert!(registry.default_for(Network::BaseSepolia).is_none());
    }
}
