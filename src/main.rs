use broker::Broker;
use config::ProtocolConfig;
use constants::{SIMULATED_DUPLICATE_RATE, SIMULATED_LOSS_RATE};
use log::{error, info};
use node::Node;
use protocol::NodeId;
use radio::RadioMedium;
use sensor::RandomSensor;
use session::Session;
use tokio::{signal, sync::watch, task::JoinSet};

pub(crate) mod broker;
pub(crate) mod config;
pub(crate) mod constants;
pub(crate) mod error;
pub(crate) mod inbox;
pub(crate) mod link;
pub(crate) mod messages;
pub(crate) mod node;
pub(crate) mod protocol;
pub(crate) mod radio;
pub(crate) mod retransmission;
pub(crate) mod sensor;
pub(crate) mod session;
pub(crate) mod topics;

#[cfg(test)]
mod scenario_tests;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = ProtocolConfig::default();
    let medium = RadioMedium::new(SIMULATED_LOSS_RATE, SIMULATED_DUPLICATE_RATE);
    let (shutdown_tx, shutdown) = watch::channel(false);

    info!(
        "Starting broker and {} nodes (loss {:.0}%, duplication {:.0}%)",
        NodeId::clients().count(),
        SIMULATED_LOSS_RATE * 100.0,
        SIMULATED_DUPLICATE_RATE * 100.0
    );

    let (link, frames) = medium.attach(NodeId::BROKER);
    let session = Session::new(NodeId::BROKER, link, frames, config.tick_period, shutdown.clone());
    let broker = tokio::spawn(session.run_broker(Broker::new(config.clone())));

    let mut nodes = JoinSet::new();
    for id in NodeId::clients() {
        let (link, frames) = medium.attach(id);
        let session = Session::new(id, link, frames, config.tick_period, shutdown.clone());
        let node = Node::new(id, config.clone());
        let sample_delay = config.sample_delay;
        let medium = medium.clone();

        nodes.spawn(async move {
            let result = session.run_node(node, RandomSensor::new(), sample_delay).await;
            if result.is_err() {
                medium.detach(id);
            }
            result
        });
    }

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result?;
                break;
            }
            Some(joined) = nodes.join_next() => {
                match joined {
                    Ok(Ok(node)) => info!("{} stopped in state {}", node.id(), node.state()),
                    Ok(Err(e)) => error!("{e:#}"),
                    Err(e) => error!("Node task failed: {e}"),
                }
                if nodes.is_empty() {
                    error!("All nodes have stopped");
                    break;
                }
            }
        }
    }

    info!("Shutting down");
    shutdown_tx.send(true)?;

    while let Some(joined) = nodes.join_next().await {
        match joined {
            Ok(Ok(node)) => {
                info!("{} stopped in state {} with {} pending", node.id(), node.state(), node.pending())
            }
            Ok(Err(e)) => error!("{e:#}"),
            Err(e) => error!("Node task failed: {e}"),
        }
    }

    let broker = broker.await??;
    for id in NodeId::clients() {
        info!(
            "{id}: {} ({} forwards pending, {} undelivered)",
            broker.session(id),
            broker.pending_for(id),
            broker.delivery_failures(id)
        );
    }

    Ok(())
}
