use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainParseError {
    #[error("invalid chain id: {0}")]
    Invalid(String),
}

/// Networks with a known block explorer front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chain {
    Ethereum,
    Bsc,
    Polygon,
    Arbitrum,
    Optimism,
    Avalanche,
    Fantom,
}

impl Chain {
    pub const ALL: [Chain; 7] = [
        Chain::Ethereum,
        Chain::Bsc,
        Chain::Polygon,
        Chain::Arbitrum,
        Chain::Optimism,
        Chain::Avalanche,
        Chain::Fantom,
    ];

    /// Map a numeric chain id to a known chain. Unknown ids yield `None`.
    pub fn from_id(id: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.id() == id)
    }

    pub fn id(self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Bsc => 56,
            Chain::Polygon => 137,
            Chain::Arbitrum => 42161,
            Chain::Optimism => 10,
            Chain::Avalanche => 43114,
            Chain::Fantom => 250,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Chain::Ethereum => "ethereum",
            Chain::Bsc => "bsc",
            Chain::Polygon => "polygon",
            Chain::Arbitrum => "arbitrum",
            Chain::Optimism => "optimism",
            Chain::Avalanche => "avalanche",
            Chain::Fantom => "fantom",
        };
        write!(f, "{name}")
    }
}

/// Parse a chain id given as decimal (`"137"`) or hex (`"0x89"`).
pub fn parse_chain_id(raw: &str) -> Result<u64, ChainParseError> {
    let trimmed = raw.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => trimmed.parse::<u64>(),
    };
    parsed.map_err(|_| ChainParseError::Invalid(raw.to_string()))
}

impl FromStr for Chain {
    type Err = ChainParseError;

    /// Parses a numeric id; an id that is well-formed but unknown is also an error here.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = parse_chain_id(s)?;
        Chain::from_id(id).ok_or_else(|| ChainParseError::Invalid(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for chain in Chain::ALL {
            assert_eq!(Chain::from_id(chain.id()), Some(chain));
        }
    }

    #[test]
    fn unknown_id_is_none() {
        assert_eq!(Chain::from_id(11297108109), None);
    }

    #[test]
    fn parses_hex_and_decimal() {
        assert_eq!(parse_chain_id("0x1"), Ok(1));
        assert_eq!(parse_chain_id("0x89"), Ok(137));
        assert_eq!(parse_chain_id(" 42161 "), Ok(42161));
        assert!(parse_chain_id("mainnet").is_err());
        assert_eq!("0xa".parse::<Chain>(), Ok(Chain::Optimism));
        assert!("0x2".parse::<Chain>().is_err());
    }
}
