//! Entrypoint for the pokerd server: parse CLI args, load the config, and
//! run one session to completion.

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;

use pokerd::cli::ServerCli;
use pokerd::config::Config;
use pokerd::server::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = ServerCli::parse();

    // Initialize tracing; default level follows --debug unless RUST_LOG set.
    let default_level = if cli.debug { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .init();

    let mut cfg = Config::load_or_create(&cli.config)
        .with_context(|| format!("loading or creating config '{}'", cli.config.display()))?;
    cli.apply_to(&mut cfg);
    if cli.persist {
        cfg.save(&cli.config)
            .with_context(|| format!("saving updated config '{}'", cli.config.display()))?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping at the next safe boundary");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut session = Session::bind(cfg, shutdown_rx).await?;
    session.run().await
}
