// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Publisher
//!
//! Encodes typed values with a [`Codec`] and hands them to an exchange. The
//! publish is fire-and-forget: the message is neither `mandatory` nor
//! `immediate`, so an unroutable message is dropped by the broker, and no
//! publisher confirm is awaited. Only failures to send on the channel are
//! reported.

use crate::{
    codec::{BincodeCodec, Codec, JsonCodec},
    errors::PublishError,
    otel,
};
use lapin::{
    options::BasicPublishOptions,
    types::{FieldTable, ShortString},
    BasicProperties, Channel,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Publishes on a channel owned by the caller.
///
/// The channel may be reused for any number of publishes but must not also be
/// used for consuming.
#[derive(Clone)]
pub struct RabbitMQPublisher {
    channel: Arc<Channel>,
}

impl RabbitMQPublisher {
    pub fn new(channel: Arc<Channel>) -> RabbitMQPublisher {
        RabbitMQPublisher { channel }
    }

    /// Encodes `value` with `codec` and sends it to `exchange` with
    /// `routing_key`.
    ///
    /// The current trace context is propagated in the message headers.
    pub async fn publish<T, C>(
        &self,
        exchange: &str,
        routing_key: &str,
        value: &T,
        codec: &C,
    ) -> Result<(), PublishError>
    where
        T: Serialize + ?Sized,
        C: Codec,
    {
        let envelope = codec.encode(value).map_err(|err| {
            error!(error = err.to_string(), "error encoding message");
            err
        })?;

        let properties = message_properties(&envelope.content_type);

        match self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                &envelope.payload,
                properties,
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    exchange, routing_key, "error publishing message"
                );
                Err(PublishError::PublishingError(err.to_string()))
            }
            _ => {
                debug!(exchange, routing_key, "message published");
                Ok(())
            }
        }
    }

    /// Publishes `value` as JSON.
    pub async fn publish_json<T>(
        &self,
        exchange: &str,
        routing_key: &str,
        value: &T,
    ) -> Result<(), PublishError>
    where
        T: Serialize + ?Sized,
    {
        self.publish(exchange, routing_key, value, &JsonCodec).await
    }

    /// Publishes `value` in the compact binary encoding.
    pub async fn publish_bincode<T>(
        &self,
        exchange: &str,
        routing_key: &str,
        value: &T,
    ) -> Result<(), PublishError>
    where
        T: Serialize + ?Sized,
    {
        self.publish(exchange, routing_key, value, &BincodeCodec)
            .await
    }
}

/// Properties stamped on every outgoing message: the codec's content type, a
/// fresh message id and the current trace context.
pub(crate) fn message_properties(content_type: &str) -> BasicProperties {
    BasicProperties::default()
        .with_content_type(ShortString::from(content_type))
        .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
        .with_headers(FieldTable::from(otel::inject_current()))
}
