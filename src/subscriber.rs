// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Subscriptions
//!
//! A subscription declares and binds its queue on a dedicated channel, starts
//! a manually-acknowledged consumer on it and hands the delivery stream to a
//! background task. The task settles messages one at a time in the order the
//! broker delivers them and stops when the stream ends, i.e. when the channel
//! or the connection goes away. There is no reconnection here; a caller that
//! wants one has to subscribe again on a new connection.

use crate::{
    codec::{BincodeCodec, Codec, JsonCodec},
    consumer::{drain, Handler},
    errors::SubscribeError,
    queue::DurabilityClass,
    topology::declare_and_bind,
};
use lapin::{options::BasicConsumeOptions, types::FieldTable, Connection};
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use uuid::Uuid;

/// Subscribes `handler` to messages routed to `queue_name`.
///
/// Returns once the queue is bound and the consumer is registered; message
/// processing continues on a spawned task for as long as the channel lives.
///
/// # Parameters
/// * `conn` - Established broker connection
/// * `exchange` - Exchange the queue is bound to
/// * `queue_name` - Queue to declare and consume from
/// * `binding_key` - Key (or topic pattern) used for the binding
/// * `durability` - Lifetime class of the queue
/// * `codec` - Codec the publishers of this queue use
/// * `handler` - Decides the disposition of every decoded message
pub async fn subscribe<T, C, H>(
    conn: &Connection,
    exchange: &str,
    queue_name: &str,
    binding_key: &str,
    durability: DurabilityClass,
    codec: C,
    handler: H,
) -> Result<(), SubscribeError>
where
    T: DeserializeOwned + Send + 'static,
    C: Codec,
    H: Handler<T>,
{
    let (channel, queue) =
        declare_and_bind(conn, exchange, queue_name, binding_key, durability).await?;

    let queue_name = queue.name().as_str().to_owned();
    let consumer_tag = format!("{}-{}", queue_name, Uuid::new_v4());

    let consumer = match channel
        .basic_consume(
            &queue_name,
            &consumer_tag,
            BasicConsumeOptions {
                no_local: false,
                no_ack: false,
                exclusive: false,
                nowait: false,
            },
            FieldTable::default(),
        )
        .await
    {
        Err(err) => {
            error!(
                error = err.to_string(),
                queue = queue_name.as_str(),
                "error to create the consumer"
            );
            Err(SubscribeError::ConsumerDeclarationError(err.to_string()))
        }
        Ok(c) => Ok(c),
    }?;

    debug!(
        queue = queue_name.as_str(),
        consumer = consumer_tag.as_str(),
        "consumer started"
    );

    tokio::spawn(async move {
        drain::<T, C, H, _, _, _>(consumer, &queue_name, &codec, &handler).await;

        if let Err(err) = channel.close(200, "subscription finished").await {
            debug!(
                error = err.to_string(),
                queue = queue_name.as_str(),
                "channel already closed"
            );
        }
    });

    Ok(())
}

/// [`subscribe`] with [`JsonCodec`].
pub async fn subscribe_json<T, H>(
    conn: &Connection,
    exchange: &str,
    queue_name: &str,
    binding_key: &str,
    durability: DurabilityClass,
    handler: H,
) -> Result<(), SubscribeError>
where
    T: DeserializeOwned + Send + 'static,
    H: Handler<T>,
{
    subscribe(
        conn,
        exchange,
        queue_name,
        binding_key,
        durability,
        JsonCodec,
        handler,
    )
    .await
}

/// [`subscribe`] with [`BincodeCodec`].
pub async fn subscribe_bincode<T, H>(
    conn: &Connection,
    exchange: &str,
    queue_name: &str,
    binding_key: &str,
    durability: DurabilityClass,
    handler: H,
) -> Result<(), SubscribeError>
where
    T: DeserializeOwned + Send + 'static,
    H: Handler<T>,
{
    subscribe(
        conn,
        exchange,
        queue_name,
        binding_key,
        durability,
        BincodeCodec,
        handler,
    )
    .await
}
