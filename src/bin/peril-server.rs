// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use pubsub::{
    channel, configs::Configs, logging, routing, subscriber::subscribe_bincode,
    topology::declare_exchanges, Disposition, DurabilityClass,
};
use std::{error::Error, process::ExitCode};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cfg = match Configs::load() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&cfg.log_level);

    match run(&cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("peril server stopped: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: &Configs) -> Result<(), Box<dyn Error>> {
    let conn = channel::connect(cfg).await?;
    info!("connected to rabbitmq");

    declare_exchanges(&conn).await?;

    subscribe_bincode::<routing::GameLog, _>(
        &conn,
        routing::EXCHANGE_PERIL_TOPIC,
        routing::GAME_LOG_SLUG,
        &routing::any_player(routing::GAME_LOG_SLUG),
        DurabilityClass::Durable,
        |log: routing::GameLog| {
            info!(
                username = log.username.as_str(),
                message = log.message.as_str(),
                "game log"
            );
            Disposition::Accept
        },
    )
    .await?;

    info!("waiting for game logs, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    info!("shutting down");
    if let Err(err) = conn.close(200, "server shutdown").await {
        error!(error = err.to_string(), "failure to close connection");
    }

    Ok(())
}
