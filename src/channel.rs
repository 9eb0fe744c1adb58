// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Connection and Channel Management
//!
//! This module establishes the long-lived connection to RabbitMQ and opens the
//! channels that publishers and subscriptions work on. Every subscription gets
//! its own channel; the publisher channel belongs to the caller.

use crate::{configs::Configs, errors::AmqpError};
use lapin::{types::LongString, Channel, Connection, ConnectionProperties};
use std::sync::Arc;
use tracing::{debug, error};

/// Connects to the broker described by `cfg`.
///
/// The application name is sent as the connection name so the connection can
/// be identified in the management UI.
///
/// # Example
/// ```no_run
/// # async fn run() -> Result<(), pubsub::errors::AmqpError> {
/// let cfg = pubsub::configs::Configs::load()?;
/// let conn = pubsub::channel::connect(&cfg).await?;
/// # Ok(())
/// # }
/// ```
pub async fn connect(cfg: &Configs) -> Result<Arc<Connection>, AmqpError> {
    debug!("creating amqp connection...");
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(cfg.app.name.clone()));

    match Connection::connect(&cfg.amqp_uri(), options).await {
        Ok(conn) => {
            debug!("amqp connected");
            Ok(Arc::new(conn))
        }
        Err(err) => {
            error!(error = err.to_string(), "failure to connect");
            Err(AmqpError::ConnectionError(err.to_string()))
        }
    }
}

/// Opens a fresh channel on an existing connection.
pub async fn open_channel(conn: &Connection) -> Result<Arc<Channel>, AmqpError> {
    debug!("creating amqp channel...");
    match conn.create_channel().await {
        Ok(channel) => {
            debug!(channel = channel.id(), "channel created");
            Ok(Arc::new(channel))
        }
        Err(err) => {
            error!(error = err.to_string(), "error to create the channel");
            Err(AmqpError::ChannelError(err.to_string()))
        }
    }
}
