//! Property tests for local put/get semantics.

use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;

use peerkv::net::MemoryNetwork;
use peerkv::store::{MemoryStore, Store};
use peerkv::{Node, ValueRecord};
use peerkv_testkit::generators::{key, node_id};
use peerkv_testkit::{fast_config, TestCluster};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Sets hold exactly the distinct values put, however often each was put.
    #[test]
    fn puts_accumulate_as_a_set(
        ops in prop::collection::vec((key(), "[a-c]{1,2}"), 1..24)
    ) {
        runtime().block_on(async {
            let cluster = TestCluster::new(1, fast_config()).await;
            let node = cluster.node(0);
            let mut expected: HashMap<String, BTreeSet<String>> = HashMap::new();

            for (key, data) in &ops {
                node.put(key, data.clone()).await.unwrap();
                expected.entry(key.clone()).or_default().insert(data.clone());
            }

            let mut expected_keys: Vec<String> = expected.keys().cloned().collect();
            expected_keys.sort();
            prop_assert_eq!(node.store().keys().await.unwrap(), expected_keys);

            for (key, data) in expected {
                let set = node.get(&key).await.unwrap();
                let got: BTreeSet<String> = set.iter().map(|v| v.data.clone()).collect();
                prop_assert_eq!(got, data);
                prop_assert!(set.iter().all(|v| v.origin_peer == node.id().to_hex()));
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Local puts carry the owning node's id as their origin.
    #[test]
    fn puts_are_stamped_with_node_id(id in node_id(), key in key(), data in ".{0,16}") {
        runtime().block_on(async {
            let network = MemoryNetwork::new();
            let (transport, _incoming) = network.create_transport("mem://solo").await;
            let node = Node::new(id, MemoryStore::new(), transport, fast_config()).unwrap();

            node.put(&key, data.clone()).await.unwrap();

            let set = node.store().get(&key).await.unwrap().unwrap();
            prop_assert!(set.contains(&ValueRecord::new(id.to_hex(), data)));
            prop_assert_eq!(set.len(), 1);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
