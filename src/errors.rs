// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the Publish/Subscribe Layer
//!
//! Each stage of the message path has its own error type so callers can tell
//! a setup failure (fatal to that subscription or publication) apart from a
//! per-message failure (resolved through a disposition and logged).

use thiserror::Error;

/// Errors raised while establishing the broker connection or loading the
/// settings needed to do so.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmqpError {
    /// Error establishing a connection to the RabbitMQ server
    #[error("failure to connect `{0}`")]
    ConnectionError(String),

    /// Error creating a channel from an established connection
    #[error("failure to create a channel `{0}`")]
    ChannelError(String),

    /// Error loading or deserializing the configuration
    #[error("failure to load configs `{0}`")]
    ConfigError(String),
}

/// Errors produced by the codecs.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// The value could not be serialized
    #[error("failure to encode payload `{0}`")]
    Encode(String),

    /// The payload is malformed or does not match the expected schema
    #[error("failure to decode payload `{0}`")]
    Decode(String),

    /// The envelope was produced by a different codec
    #[error("unexpected content type `{found}`, expected `{expected}`")]
    ContentTypeMismatch {
        expected: &'static str,
        found: String,
    },
}

/// Errors raised while declaring exchanges, queues and bindings.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TopologyError {
    /// Error opening the channel the topology is declared on
    #[error("failure to create a channel `{0}`")]
    ChannelError(String),

    /// Error declaring an exchange: name and broker error
    #[error("failure to declare an exchange `{0}`: {1}")]
    DeclareExchangeError(String, String),

    /// Error declaring a queue: name and broker error
    #[error("failure to declare a queue `{0}`: {1}")]
    DeclareQueueError(String, String),

    /// Error binding a queue to an exchange: exchange, queue and broker error
    #[error("failure to bind exchange `{0}` to queue `{1}`: {2}")]
    BindingExchangeToQueueError(String, String, String),
}

/// Errors surfaced synchronously to the caller of a publish.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PublishError {
    /// The value could not be encoded
    #[error(transparent)]
    Encode(#[from] CodecError),

    /// The channel refused the message
    #[error("failure to publish `{0}`")]
    PublishingError(String),
}

/// Errors raised while setting up a subscription.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SubscribeError {
    /// The queue or its binding could not be declared
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// The broker refused to start the consumer
    #[error("failure to declare consumer `{0}`")]
    ConsumerDeclarationError(String),
}

/// Errors finalizing a delivery.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AckError {
    /// Error acknowledging a message
    #[error("failure to ack message `{0}`")]
    AckMessageError(String),

    /// Error negative-acknowledging a message
    #[error("failure to nack message `{0}`")]
    NackMessageError(String),
}
