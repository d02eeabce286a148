//! Primitive account and asset types

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Token amounts (base units).
pub type Amount = u128;

/// 20-byte account address, rendered as `0x`-prefixed hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address. Balance movements with a zero endpoint are mints or burns.
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn repeat_byte(b: u8) -> Self {
        Address([b; 20])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressParseError(pub String);

impl fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid address: {}", self.0)
    }
}

impl std::error::Error for AddressParseError {}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)
            .map_err(|e| AddressParseError(format!("{}: {}", s, e)))?;
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| AddressParseError(format!("{}: expected 20 bytes", s)))?;
        Ok(Address(arr))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Asset held in custody: the chain's native currency or a token contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Asset {
    Native,
    Token(Address),
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => f.write_str("native"),
            Asset::Token(addr) => write!(f, "{}", addr),
        }
    }
}

impl FromStr for Asset {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("native") {
            Ok(Asset::Native)
        } else {
            Ok(Asset::Token(s.parse()?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_and_display() {
        let addr: Address = "0x0101010101010101010101010101010101010101".parse().unwrap();
        assert_eq!(addr, Address::repeat_byte(1));
        assert_eq!(addr.to_string(), "0x0101010101010101010101010101010101010101");

        // Prefix is optional
        let bare: Address = "0101010101010101010101010101010101010101".parse().unwrap();
        assert_eq!(bare, addr);
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        assert!("0x0102".parse::<Address>().is_err());
        assert!("0xzz".parse::<Address>().is_err());
    }

    #[test]
    fn test_zero_address() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address::repeat_byte(7).is_zero());
    }

    #[test]
    fn test_asset_parse() {
        assert_eq!("native".parse::<Asset>().unwrap(), Asset::Native);
        assert_eq!("NATIVE".parse::<Asset>().unwrap(), Asset::Native);
        let token: Asset = Address::repeat_byte(9).to_hex().parse().unwrap();
        assert_eq!(token, Asset::Token(Address::repeat_byte(9)));
    }

    #[test]
    fn test_address_serde_as_hex_string() {
        let json = serde_json::to_string(&Address::repeat_byte(0xab)).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(20)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Address::repeat_byte(0xab));
    }
}
