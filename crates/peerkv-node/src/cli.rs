use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;

use peerkv::{NodeConfig, NodeId};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Socket address to accept peer streams on. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "127.0.0.1:0")]
    pub listen: String,

    /// Address peers should dial to reach this node. Required when
    /// `--listen` binds a wildcard address.
    #[arg(long, value_name = "ADDR")]
    pub advertise: Option<String>,

    /// Address of a peer to bootstrap against. Repeatable.
    #[arg(long = "bootstrap", value_name = "ADDR")]
    pub bootstrap: Vec<String>,

    /// HTTP endpoint advertised to peers.
    #[arg(long, default_value = "")]
    pub http: String,

    /// gRPC endpoint advertised to peers.
    #[arg(long, default_value = "")]
    pub grpc: String,

    /// Hex node id stamped on local puts. Random if omitted.
    #[arg(long)]
    pub node_id: Option<NodeId>,

    /// Per-peer fanout timeout, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    pub peer_timeout_ms: u64,

    /// How long a getDHT responder waits for a missing key, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    pub entry_wait_ms: u64,
}

impl Cli {
    pub fn node_config(&self) -> NodeConfig {
        NodeConfig {
            peer_timeout: Duration::from_millis(self.peer_timeout_ms),
            entry_wait_timeout: Duration::from_millis(self.entry_wait_ms),
            http: self.http.clone(),
            grpc: self.grpc.clone(),
            ..NodeConfig::default()
        }
    }

    /// The address to announce in bootstrap exchanges for a listener bound
    /// at `bound`.
    pub fn advertised_address(&self, bound: SocketAddr) -> Result<String> {
        match &self.advertise {
            Some(address) => Ok(address.clone()),
            None if bound.ip().is_unspecified() => bail!(
                "listening on wildcard address {bound}; pass --advertise with an address peers can dial"
            ),
            None => Ok(bound.to_string()),
        }
    }
}
