//! # Decentralized Identifiers
//!
//! A [`Did`] names an identity by its genesis state. The identifier body is
//! 31 bytes:
//!
//! ```text
//! type (2) || genesis_state[0..27] || checksum (2, little-endian)
//! ```
//!
//! `type` encodes the method in the first byte and the blockchain/network
//! pair in the second. The checksum is the wrapping byte sum of the first 29
//! bytes. The textual form is
//! `did:<method>:<blockchain>:<network>:<hex(id)>`.
//!
//! Because the genesis bytes are embedded, a verifier can check a claimed
//! state against the identifier itself when the identity has never
//! published a state on chain. See [`Did::matches_genesis`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::digest::Hash256;
use crate::error::DidError;

const ID_LEN: usize = 31;
const GENESIS_LEN: usize = 27;

/// DID method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DidMethod {
    /// `did:iden3`
    Iden3,
    /// `did:polygonid`
    #[serde(rename = "polygonid")]
    PolygonId,
}

impl DidMethod {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iden3 => "iden3",
            Self::PolygonId => "polygonid",
        }
    }

    fn type_byte(self) -> u8 {
        match self {
            Self::Iden3 => 0x01,
            Self::PolygonId => 0x02,
        }
    }

    fn from_type_byte(b: u8) -> Option<Self> {
        [Self::Iden3, Self::PolygonId]
            .into_iter()
            .find(|m| m.type_byte() == b)
    }
}

impl FromStr for DidMethod {
    type Err = DidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iden3" => Ok(Self::Iden3),
            "polygonid" => Ok(Self::PolygonId),
            other => Err(DidError::Unsupported {
                component: "method",
                value: other.to_string(),
            }),
        }
    }
}

/// Anchoring blockchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Blockchain {
    /// Ethereum.
    #[serde(rename = "eth")]
    Ethereum,
    /// Polygon PoS.
    Polygon,
}

impl Blockchain {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ethereum => "eth",
            Self::Polygon => "polygon",
        }
    }

    fn type_bits(self) -> u8 {
        match self {
            Self::Ethereum => 0x10,
            Self::Polygon => 0x20,
        }
    }

    fn from_type_bits(b: u8) -> Option<Self> {
        [Self::Ethereum, Self::Polygon]
            .into_iter()
            .find(|c| c.type_bits() == b & 0xf0)
    }
}

impl FromStr for Blockchain {
    type Err = DidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eth" => Ok(Self::Ethereum),
            "polygon" => Ok(Self::Polygon),
            other => Err(DidError::Unsupported {
                component: "blockchain",
                value: other.to_string(),
            }),
        }
    }
}

/// Network within a blockchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    /// Mainnet.
    Main,
    /// Polygon Amoy testnet.
    Amoy,
    /// Ethereum Sepolia testnet.
    Sepolia,
}

impl NetworkId {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Amoy => "amoy",
            Self::Sepolia => "sepolia",
        }
    }

    fn type_bits(self) -> u8 {
        match self {
            Self::Main => 0x01,
            Self::Amoy => 0x03,
            Self::Sepolia => 0x04,
        }
    }

    fn from_type_bits(b: u8) -> Option<Self> {
        [Self::Main, Self::Amoy, Self::Sepolia]
            .into_iter()
            .find(|n| n.type_bits() == b & 0x0f)
    }

    /// EVM chain id for a blockchain/network pair, if the pair exists.
    pub fn chain_id(self, blockchain: Blockchain) -> Option<u64> {
        match (blockchain, self) {
            (Blockchain::Ethereum, Self::Main) => Some(1),
            (Blockchain::Ethereum, Self::Sepolia) => Some(11_155_111),
            (Blockchain::Polygon, Self::Main) => Some(137),
            (Blockchain::Polygon, Self::Amoy) => Some(80_002),
            _ => None,
        }
    }

    /// Inverse of [`NetworkId::chain_id`].
    pub fn from_chain_id(chain_id: u64) -> Option<(Blockchain, NetworkId)> {
        match chain_id {
            1 => Some((Blockchain::Ethereum, Self::Main)),
            11_155_111 => Some((Blockchain::Ethereum, Self::Sepolia)),
            137 => Some((Blockchain::Polygon, Self::Main)),
            80_002 => Some((Blockchain::Polygon, Self::Amoy)),
            _ => None,
        }
    }
}

impl FromStr for NetworkId {
    type Err = DidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(Self::Main),
            "amoy" => Ok(Self::Amoy),
            "sepolia" => Ok(Self::Sepolia),
            other => Err(DidError::Unsupported {
                component: "network",
                value: other.to_string(),
            }),
        }
    }
}

/// A decentralized identifier derived from an identity's genesis state.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Did {
    method: DidMethod,
    blockchain: Blockchain,
    network: NetworkId,
    id: [u8; ID_LEN],
}

impl Did {
    /// Derive the identifier for a genesis state root.
    ///
    /// Fails if the network does not exist on the blockchain.
    pub fn from_genesis(
        method: DidMethod,
        blockchain: Blockchain,
        network: NetworkId,
        genesis_state: &Hash256,
    ) -> Result<Self, DidError> {
        if network.chain_id(blockchain).is_none() {
            return Err(DidError::Unsupported {
                component: "network",
                value: format!("{}:{}", blockchain.as_str(), network.as_str()),
            });
        }
        let mut id = [0u8; ID_LEN];
        id[0] = method.type_byte();
        id[1] = blockchain.type_bits() | network.type_bits();
        id[2..2 + GENESIS_LEN].copy_from_slice(&genesis_state.as_bytes()[..GENESIS_LEN]);
        let sum = checksum(&id[..2 + GENESIS_LEN]);
        id[2 + GENESIS_LEN..].copy_from_slice(&sum.to_le_bytes());
        Ok(Self {
            method,
            blockchain,
            network,
            id,
        })
    }

    /// DID method.
    pub fn method(&self) -> DidMethod {
        self.method
    }

    /// Anchoring blockchain.
    pub fn blockchain(&self) -> Blockchain {
        self.blockchain
    }

    /// Network within the blockchain.
    pub fn network(&self) -> NetworkId {
        self.network
    }

    /// The 31-byte identifier body.
    pub fn id_bytes(&self) -> &[u8; ID_LEN] {
        &self.id
    }

    /// The identifier body left-padded to digest width. This is the value an
    /// identity contributes to circuit public signals.
    pub fn id_hash(&self) -> Hash256 {
        let mut bytes = [0u8; 32];
        bytes[32 - ID_LEN..].copy_from_slice(&self.id);
        Hash256::from_bytes(bytes)
    }

    /// Inverse of [`Did::id_hash`]: recover the identifier a circuit signal
    /// names. Method, blockchain and network come from the type bytes.
    pub fn from_id_hash(signal: &Hash256) -> Result<Self, DidError> {
        let malformed = || DidError::Malformed(signal.to_hex());
        let (padding, body) = signal.as_bytes().split_at(32 - ID_LEN);
        if padding.iter().any(|b| *b != 0) {
            return Err(malformed());
        }
        let mut id = [0u8; ID_LEN];
        id.copy_from_slice(body);
        if id[2 + GENESIS_LEN..] != checksum(&id[..2 + GENESIS_LEN]).to_le_bytes() {
            return Err(DidError::Checksum);
        }
        let method = DidMethod::from_type_byte(id[0]).ok_or_else(malformed)?;
        let blockchain = Blockchain::from_type_bits(id[1]).ok_or_else(malformed)?;
        let network = NetworkId::from_type_bits(id[1]).ok_or_else(malformed)?;
        if network.chain_id(blockchain).is_none() {
            return Err(malformed());
        }
        Ok(Self {
            method,
            blockchain,
            network,
            id,
        })
    }

    /// Whether `state` is the genesis state this identifier was derived from.
    pub fn matches_genesis(&self, state: &Hash256) -> bool {
        self.id[2..2 + GENESIS_LEN] == state.as_bytes()[..GENESIS_LEN]
    }

    /// Parse the textual form.
    pub fn parse(s: &str) -> Result<Self, DidError> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 5 || parts[0] != "did" {
            return Err(DidError::Malformed(s.to_string()));
        }
        let method: DidMethod = parts[1].parse()?;
        let blockchain: Blockchain = parts[2].parse()?;
        let network: NetworkId = parts[3].parse()?;
        let raw = hex::decode(parts[4]).map_err(|_| DidError::Malformed(s.to_string()))?;
        let id: [u8; ID_LEN] = raw
            .try_into()
            .map_err(|_| DidError::Malformed(s.to_string()))?;

        let expected = checksum(&id[..2 + GENESIS_LEN]).to_le_bytes();
        if id[2 + GENESIS_LEN..] != expected {
            return Err(DidError::Checksum);
        }
        if id[0] != method.type_byte() || id[1] != blockchain.type_bits() | network.type_bits() {
            return Err(DidError::TypeMismatch(s.to_string()));
        }
        Ok(Self {
            method,
            blockchain,
            network,
            id,
        })
    }
}

fn checksum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |acc, b| acc.wrapping_add(u16::from(*b)))
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "did:{}:{}:{}:{}",
            self.method.as_str(),
            self.blockchain.as_str(),
            self.network.as_str(),
            hex::encode(self.id)
        )
    }
}

impl fmt::Debug for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Did({self})")
    }
}

impl FromStr for Did {
    type Err = DidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Did {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Did {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
