//! Wire messages exchanged on the peerkv stream protocols.
//!
//! | Protocol    | Message                                  |
//! |-------------|------------------------------------------|
//! | `bootstrap` | [`PeerList`], both directions            |
//! | `putDHT`    | [`PutRequest`], no response              |
//! | `getDHT`    | [`GetRequest`] answered by [`GetResponse`] |

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::{PeerRecord, ValueRecord};

/// Message size limits.
pub mod limits {
    /// Max key length in bytes.
    pub const MAX_KEY_LEN: usize = 1024;
    /// Max records in one bootstrap peer list.
    pub const MAX_PEER_LIST: usize = 1024;
}

/// Peer list sent in each direction of a bootstrap exchange.
pub type PeerList = Vec<PeerRecord>;

/// A JSON message carried in exactly one frame.
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Check if this message respects size limits.
    fn validate_limits(&self) -> std::result::Result<(), &'static str> {
        Ok(())
    }

    /// Encode as a JSON document.
    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from a JSON document, enforcing limits.
    fn from_json(json: &str) -> Result<Self> {
        let message: Self = serde_json::from_str(json)?;
        message
            .validate_limits()
            .map_err(CoreError::LimitExceeded)?;
        Ok(message)
    }
}

fn check_key(key: &str) -> std::result::Result<(), &'static str> {
    if key.len() > limits::MAX_KEY_LEN {
        return Err("key too long");
    }
    Ok(())
}

/// `putDHT` request: replicate one value under a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutRequest {
    pub key: String,
    pub val: ValueRecord,
}

impl WireMessage for PutRequest {
    fn validate_limits(&self) -> std::result::Result<(), &'static str> {
        check_key(&self.key)
    }
}

/// `getDHT` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRequest {
    pub key: String,
}

impl WireMessage for GetRequest {
    fn validate_limits(&self) -> std::result::Result<(), &'static str> {
        check_key(&self.key)
    }
}

/// `getDHT` response: the responder's value set, each member serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetResponse {
    pub key: String,
    pub val: Vec<String>,
}

impl GetResponse {
    /// Build a response from a value set.
    pub fn from_values<'a>(
        key: impl Into<String>,
        values: impl IntoIterator<Item = &'a ValueRecord>,
    ) -> Self {
        Self {
            key: key.into(),
            val: values.into_iter().map(ValueRecord::to_wire).collect(),
        }
    }

    /// Parse every member back into a [`ValueRecord`].
    ///
    /// A single malformed member rejects the whole response.
    pub fn values(&self) -> Result<Vec<ValueRecord>> {
        self.val.iter().map(|s| ValueRecord::from_wire(s)).collect()
    }
}

impl WireMessage for GetResponse {
    fn validate_limits(&self) -> std::result::Result<(), &'static str> {
        check_key(&self.key)
    }
}

impl WireMessage for PeerList {
    fn validate_limits(&self) -> std::result::Result<(), &'static str> {
        if self.len() > limits::MAX_PEER_LIST {
            return Err("too many peer records");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_request_wire_shape() {
        let msg = PutRequest {
            key: "color".into(),
            val: ValueRecord::new("A", "red"),
        };
        assert_eq!(
            msg.to_json().unwrap(),
            r#"{"key":"color","val":{"originPeer":"A","data":"red"}}"#
        );
        assert_eq!(PutRequest::from_json(&msg.to_json().unwrap()).unwrap(), msg);
    }

    #[test]
    fn test_get_response_values() {
        let values = [ValueRecord::new("A", "red"), ValueRecord::new("B", "blue")];
        let response = GetResponse::from_values("color", &values);
        assert_eq!(response.val.len(), 2);
        assert_eq!(response.values().unwrap(), values.to_vec());
    }

    #[test]
    fn test_get_response_rejects_malformed_member() {
        let response = GetResponse {
            key: "color".into(),
            val: vec!["not json".into()],
        };
        assert!(response.values().is_err());
    }

    #[test]
    fn test_peer_list_wire_shape() {
        let list: PeerList = vec![PeerRecord::new("/ip4/1.2.3.4/tcp/1", "h", "g")];
        assert_eq!(
            list.to_json().unwrap(),
            r#"[{"address":"/ip4/1.2.3.4/tcp/1","http":"h","grpc":"g"}]"#
        );
    }

    #[test]
    fn test_missing_field_is_rejected() {
        assert!(matches!(
            PutRequest::from_json(r#"{"key":"k"}"#),
            Err(CoreError::Json(_))
        ));
        assert!(GetRequest::from_json("[]").is_err());
    }

    #[test]
    fn test_key_limit() {
        let msg = GetRequest {
            key: "k".repeat(limits::MAX_KEY_LEN + 1),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(matches!(
            GetRequest::from_json(&json),
            Err(CoreError::LimitExceeded(_))
        ));
    }

    #[test]
    fn test_peer_list_limit() {
        let list: PeerList = (0..=limits::MAX_PEER_LIST)
            .map(|i| PeerRecord::with_address(format!("peer-{i}")))
            .collect();
        let json = serde_json::to_string(&list).unwrap();
        assert!(PeerList::from_json(&json).is_err());
    }
}
