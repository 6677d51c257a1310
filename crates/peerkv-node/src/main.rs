use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use peerkv::net::TcpTransport;
use peerkv::store::MemoryStore;
use peerkv::{BootstrapState, Node, NodeId};

mod cli;
mod console;

use cli::Cli;

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = cli.node_config();
    let id = cli.node_id.unwrap_or_else(NodeId::random);

    let (transport, incoming) = TcpTransport::bind(&cli.listen)
        .await
        .with_context(|| format!("failed to listen on {}", cli.listen))?;
    let advertised = cli.advertised_address(transport.local_addr())?;
    let transport = transport.advertise(advertised);
    let node = Node::new(id, MemoryStore::new(), transport, config)?;
    let router = node.serve(incoming);

    println!("node id   {}", node.id());
    println!("listening {}", node.own_record().address);

    for (address, state) in node.bootstrap_all(&cli.bootstrap).await {
        match state {
            BootstrapState::Done { learned } => info!(%address, learned, "bootstrapped"),
            BootstrapState::Failed { reason } => warn!(%address, %reason, "bootstrap failed"),
            other => warn!(%address, state = ?other, "bootstrap did not finish"),
        }
    }
    info!(peers = node.peers().len(), "ready");
    println!("{}", console::HELP);

    console::run(&node).await?;
    router.abort();
    Ok(())
}
