use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ultimate_matching::command_loop::CommandLoop;
use ultimate_matching::config::Config;
use ultimate_matching::transport::rabbit::{RabbitCommandSource, RabbitEventSink};
use ultimate_matching::{CommandDeduplicator, EngineRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load();
    info!(
        inbound_queue = %config.inbound_queue,
        outbound_exchange = %config.outbound_exchange,
        "starting matching engine command loop"
    );

    let source = RabbitCommandSource::connect(&config.inbound_amqp_url, &config.inbound_queue, &config.consumer_group).await?;
    let sink = RabbitEventSink::connect(&config.outbound_amqp_url, &config.outbound_exchange, &config.consumer_group).await?;

    let registry = EngineRegistry::new();
    let dedup = CommandDeduplicator::new(config.dedup_capacity);
    let loop_ = CommandLoop::new(source, sink, registry, dedup);

    let shutdown = Box::pin(async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    });

    match loop_.run(shutdown).await {
        Ok(()) => {
            info!("matching engine command loop stopped cleanly");
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "matching engine command loop exited with an error");
            Err(err)
        }
    }
}
