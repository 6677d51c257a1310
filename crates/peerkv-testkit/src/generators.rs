//! Proptest generators for property-based testing.

use proptest::prelude::*;

use peerkv::core::{limits, GetResponse, PeerList};
use peerkv::{NodeId, PeerRecord, ValueRecord};

/// Generate a random NodeId.
pub fn node_id() -> impl Strategy<Value = NodeId> {
    any::<[u8; 32]>().prop_map(NodeId::from_bytes)
}

/// Generate a key within the wire limit, unicode included.
pub fn key() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-z0-9_-]{0,15}".prop_map(String::from),
        ".{1,32}".prop_map(String::from),
    ]
    .prop_filter("key within limit", |k| k.len() <= limits::MAX_KEY_LEN)
}

/// Generate a value record with a short origin and arbitrary data.
pub fn value_record() -> impl Strategy<Value = ValueRecord> {
    ("[a-f0-9]{1,8}", ".{0,48}").prop_map(|(origin, data)| ValueRecord::new(origin, data))
}

/// Generate a peer record.
pub fn peer_record() -> impl Strategy<Value = PeerRecord> {
    ("[a-z0-9.:/-]{1,24}", "[a-z0-9.:]{0,16}", "[a-z0-9.:]{0,16}")
        .prop_map(|(address, http, grpc)| PeerRecord::new(address, http, grpc))
}

/// Generate a bootstrap peer list of up to `max_len` records.
pub fn peer_list(max_len: usize) -> impl Strategy<Value = PeerList> {
    prop::collection::vec(peer_record(), 0..=max_len)
}

/// Generate a `getDHT` response with up to `max_values` members.
pub fn get_response(max_values: usize) -> impl Strategy<Value = GetResponse> {
    (key(), prop::collection::btree_set(value_record(), 0..=max_values))
        .prop_map(|(key, values)| GetResponse::from_values(key, &values))
}
