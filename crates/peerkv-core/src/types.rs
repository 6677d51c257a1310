//! Strong type definitions for peerkv.
//!
//! Peer and value descriptors travel as JSON, so their field names follow
//! the wire format rather than Rust conventions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A 32-byte node identifier.
///
/// Stamped as `originPeer` on every value this node puts.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub [u8; 32]);

impl NodeId {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a random node ID.
    pub fn random() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for NodeId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Descriptor of a reachable peer.
///
/// Two records describe the same peer when their `address` matches; the
/// other fields are informational and never compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerRecord {
    /// Dialable endpoint.
    pub address: String,
    /// Advertised HTTP endpoint.
    pub http: String,
    /// Advertised gRPC endpoint.
    pub grpc: String,
}

impl PeerRecord {
    pub fn new(
        address: impl Into<String>,
        http: impl Into<String>,
        grpc: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            http: http.into(),
            grpc: grpc.into(),
        }
    }

    /// A record with only a dialable address.
    pub fn with_address(address: impl Into<String>) -> Self {
        Self::new(address, String::new(), String::new())
    }
}

/// One member of a key's value set.
///
/// Ordering is by `(origin_peer, data)`, which keeps value sets and the
/// `getDHT` responses built from them deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueRecord {
    /// The peer that claims to have written the value. Not verified.
    #[serde(rename = "originPeer")]
    pub origin_peer: String,
    /// The stored value.
    pub data: String,
}

impl ValueRecord {
    pub fn new(origin_peer: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            origin_peer: origin_peer.into(),
            data: data.into(),
        }
    }

    /// Serialize to the string form carried in `getDHT` responses.
    pub fn to_wire(&self) -> String {
        // Two plain string fields cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse the string form carried in `getDHT` responses.
    pub fn from_wire(s: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(s)?)
    }
}

/// Stream protocols negotiated when a stream opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Peer-list exchange.
    Bootstrap,
    /// Fire-and-forget value replication.
    PutDht,
    /// Value set lookup.
    GetDht,
}

impl Protocol {
    /// All protocols a node serves.
    pub const ALL: [Protocol; 3] = [Protocol::Bootstrap, Protocol::PutDht, Protocol::GetDht];

    /// The protocol identifier on the wire.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Protocol::Bootstrap => "bootstrap",
            Protocol::PutDht => "putDHT",
            Protocol::GetDht => "getDHT",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Protocol::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| CoreError::UnknownProtocol(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_hex_roundtrip() {
        let id = NodeId::from_bytes([0x42; 32]);
        let recovered: NodeId = id.to_hex().parse().unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_node_id_rejects_short_hex() {
        assert!(NodeId::from_hex("abcd").is_err());
        assert!(NodeId::from_hex("zz").is_err());
    }

    #[test]
    fn test_node_id_debug() {
        let id = NodeId::from_bytes([0xcd; 32]);
        assert_eq!(format!("{:?}", id), "NodeId(cdcdcdcdcdcdcdcd)");
    }

    #[test]
    fn test_value_record_wire_field_names() {
        let value = ValueRecord::new("A", "red");
        assert_eq!(value.to_wire(), r#"{"originPeer":"A","data":"red"}"#);
        assert_eq!(ValueRecord::from_wire(&value.to_wire()).unwrap(), value);
    }

    #[test]
    fn test_value_record_from_wire_ignores_field_order() {
        let value = ValueRecord::from_wire(r#"{"data":"red","originPeer":"A"}"#).unwrap();
        assert_eq!(value, ValueRecord::new("A", "red"));
    }

    #[test]
    fn test_value_record_from_wire_rejects_missing_field() {
        assert!(ValueRecord::from_wire(r#"{"data":"red"}"#).is_err());
    }

    #[test]
    fn test_protocol_ids() {
        assert_eq!(Protocol::Bootstrap.as_str(), "bootstrap");
        assert_eq!(Protocol::PutDht.as_str(), "putDHT");
        assert_eq!(Protocol::GetDht.as_str(), "getDHT");
        for p in Protocol::ALL {
            assert_eq!(p.as_str().parse::<Protocol>().unwrap(), p);
        }
        assert!("putdht".parse::<Protocol>().is_err());
    }
}
