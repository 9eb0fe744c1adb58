// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Topology Management
//!
//! This module declares exchanges, queues and the bindings between them.
//!
//! The main components are:
//! - `Topology` trait: Interface for topology management
//! - `AmqpTopology`: Implementation of the Topology trait for RabbitMQ
//! - `declare_and_bind`: per-subscription queue setup on a dedicated channel
//! - `declare_exchanges`: one-off declaration of the well-known exchanges and
//!   the dead-letter queue

use crate::{
    channel::open_channel,
    errors::TopologyError,
    exchange::ExchangeDefinition,
    queue::{DurabilityClass, QueueBinding, QueueDefinition},
    routing::{
        EXCHANGE_PERIL_DEAD_LETTER, EXCHANGE_PERIL_DIRECT, EXCHANGE_PERIL_TOPIC,
        QUEUE_PERIL_DEAD_LETTER,
    },
};
use async_trait::async_trait;
use lapin::{
    options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::{AMQPValue, FieldTable, LongString, ShortString},
    Channel, Connection, Queue,
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, error};

/// Constant for the queue argument used to specify a dead letter exchange
pub const AMQP_HEADERS_DEAD_LETTER_EXCHANGE: &str = "x-dead-letter-exchange";

/// Trait defining the interface for topology management.
///
/// This trait provides methods for registering exchanges, queues, and bindings,
/// as well as installing the topology to the RabbitMQ server.
#[async_trait]
pub trait Topology<'tp> {
    /// Adds an exchange definition to the topology.
    fn exchange(self, def: &'tp ExchangeDefinition<'tp>) -> Self;

    /// Adds a queue definition to the topology.
    fn queue(self, def: &'tp QueueDefinition) -> Self;

    /// Adds a queue-to-exchange binding to the topology.
    fn queue_binding(self, binding: &'tp QueueBinding<'tp>) -> Self;

    /// Installs the topology to the RabbitMQ server.
    ///
    /// Returns the declared queues in registration order.
    async fn install(&self) -> Result<Vec<Queue>, TopologyError>;
}

/// RabbitMQ implementation of the Topology trait.
pub struct AmqpTopology<'tp> {
    channel: Arc<Channel>,
    pub(crate) queues: Vec<&'tp QueueDefinition>,
    pub(crate) queues_binding: Vec<&'tp QueueBinding<'tp>>,
    pub(crate) exchanges: Vec<&'tp ExchangeDefinition<'tp>>,
}

impl<'tp> AmqpTopology<'tp> {
    /// Creates a new AmqpTopology declaring on `channel`.
    pub fn new(channel: Arc<Channel>) -> AmqpTopology<'tp> {
        AmqpTopology {
            channel,
            queues: vec![],
            queues_binding: vec![],
            exchanges: vec![],
        }
    }
}

#[async_trait]
impl<'tp> Topology<'tp> for AmqpTopology<'tp> {
    fn exchange(mut self, def: &'tp ExchangeDefinition<'tp>) -> Self {
        self.exchanges.push(def);
        self
    }

    fn queue(mut self, def: &'tp QueueDefinition) -> Self {
        self.queues.push(def);
        self
    }

    fn queue_binding(mut self, binding: &'tp QueueBinding<'tp>) -> Self {
        self.queues_binding.push(binding);
        self
    }

    /// Installs the topology to the RabbitMQ server.
    ///
    /// This method performs the following operations in order:
    /// 1. Creates all exchanges
    /// 2. Creates all queues
    /// 3. Sets up queue-to-exchange bindings
    async fn install(&self) -> Result<Vec<Queue>, TopologyError> {
        self.install_exchange().await?;
        let queues = self.install_queue().await?;
        self.binding_queues().await?;
        Ok(queues)
    }
}

impl AmqpTopology<'_> {
    async fn install_exchange(&self) -> Result<(), TopologyError> {
        for exch in &self.exchanges {
            debug!("creating exchange: {}", exch.name);

            match self
                .channel
                .exchange_declare(
                    exch.name,
                    exch.kind.into(),
                    ExchangeDeclareOptions {
                        passive: false,
                        durable: exch.durable,
                        auto_delete: false,
                        internal: false,
                        nowait: false,
                    },
                    FieldTable::default(),
                )
                .await
            {
                Err(err) => {
                    error!(
                        error = err.to_string(),
                        name = exch.name,
                        "error to declare the exchange"
                    );
                    Err(TopologyError::DeclareExchangeError(
                        exch.name.to_owned(),
                        err.to_string(),
                    ))
                }
                _ => Ok(()),
            }?;

            debug!("exchange: {} was created", exch.name);
        }

        Ok(())
    }

    async fn install_queue(&self) -> Result<Vec<Queue>, TopologyError> {
        let mut declared = Vec::with_capacity(self.queues.len());

        for def in &self.queues {
            debug!("creating queue: {}", def.name);

            let flags = def.durability.flags();
            let queue = match self
                .channel
                .queue_declare(
                    &def.name,
                    QueueDeclareOptions {
                        passive: false,
                        durable: flags.durable,
                        exclusive: flags.exclusive,
                        auto_delete: flags.auto_delete,
                        nowait: false,
                    },
                    queue_arguments(def),
                )
                .await
            {
                Err(err) => {
                    error!(
                        error = err.to_string(),
                        name = def.name.as_str(),
                        "error to declare the queue"
                    );
                    Err(TopologyError::DeclareQueueError(
                        def.name.clone(),
                        err.to_string(),
                    ))
                }
                Ok(queue) => {
                    debug!("queue: {} was created", def.name);
                    Ok(queue)
                }
            }?;

            declared.push(queue);
        }

        Ok(declared)
    }

    async fn binding_queues(&self) -> Result<(), TopologyError> {
        for binding in &self.queues_binding {
            debug!(
                "binding queue: {} to the exchange: {} with the key: {}",
                binding.queue_name, binding.exchange_name, binding.routing_key
            );

            match self
                .channel
                .queue_bind(
                    binding.queue_name,
                    binding.exchange_name,
                    binding.routing_key,
                    QueueBindOptions { nowait: false },
                    FieldTable::default(),
                )
                .await
            {
                Err(err) => {
                    error!(error = err.to_string(), "error to bind queue to exchange");

                    Err(TopologyError::BindingExchangeToQueueError(
                        binding.exchange_name.to_owned(),
                        binding.queue_name.to_owned(),
                        err.to_string(),
                    ))
                }
                _ => Ok(()),
            }?;
        }

        Ok(())
    }
}

/// Builds the `x-` arguments a queue is declared with.
pub(crate) fn queue_arguments(def: &QueueDefinition) -> FieldTable {
    let mut args = BTreeMap::new();

    if let Some(dlx) = &def.dead_letter_exchange {
        args.insert(
            ShortString::from(AMQP_HEADERS_DEAD_LETTER_EXCHANGE),
            AMQPValue::LongString(LongString::from(dlx.as_str())),
        );
    }

    FieldTable::from(args)
}

/// Declares `queue_name` on a fresh channel and binds it to `exchange`.
///
/// The queue dead-letters into [`EXCHANGE_PERIL_DEAD_LETTER`]. Redeclaring an
/// identical queue is a no-op on the broker; redeclaring it with another
/// durability class fails. The returned channel is owned by the caller.
pub async fn declare_and_bind(
    conn: &Connection,
    exchange: &str,
    queue_name: &str,
    binding_key: &str,
    durability: DurabilityClass,
) -> Result<(Arc<Channel>, Queue), TopologyError> {
    let channel = open_channel(conn)
        .await
        .map_err(|err| TopologyError::ChannelError(err.to_string()))?;

    let queue_def = QueueDefinition::new(queue_name)
        .durability(durability)
        .dead_letter_exchange(EXCHANGE_PERIL_DEAD_LETTER);
    let binding = QueueBinding::new(queue_name)
        .exchange(exchange)
        .routing_key(binding_key);

    let mut queues = AmqpTopology::new(channel.clone())
        .queue(&queue_def)
        .queue_binding(&binding)
        .install()
        .await?;

    let queue = queues.pop().ok_or_else(|| {
        TopologyError::DeclareQueueError(queue_name.to_owned(), "no queue declared".to_owned())
    })?;

    Ok((channel, queue))
}

/// Declares the direct, topic and dead-letter exchanges, and the durable
/// queue collecting dead-lettered messages.
pub async fn declare_exchanges(conn: &Connection) -> Result<(), TopologyError> {
    let channel = open_channel(conn)
        .await
        .map_err(|err| TopologyError::ChannelError(err.to_string()))?;

    let direct = ExchangeDefinition::new(EXCHANGE_PERIL_DIRECT)
        .direct()
        .durable();
    let topic = ExchangeDefinition::new(EXCHANGE_PERIL_TOPIC)
        .topic()
        .durable();
    let dead_letter = ExchangeDefinition::new(EXCHANGE_PERIL_DEAD_LETTER)
        .fanout()
        .durable();
    let dlq = QueueDefinition::new(QUEUE_PERIL_DEAD_LETTER);
    let dlq_binding =
        QueueBinding::new(QUEUE_PERIL_DEAD_LETTER).exchange(EXCHANGE_PERIL_DEAD_LETTER);

    AmqpTopology::new(channel.clone())
        .exchange(&direct)
        .exchange(&topic)
        .exchange(&dead_letter)
        .queue(&dlq)
        .queue_binding(&dlq_binding)
        .install()
        .await?;

    if let Err(err) = channel.close(200, "topology installed").await {
        debug!(error = err.to_string(), "failure to close topology channel");
    }

    Ok(())
}
