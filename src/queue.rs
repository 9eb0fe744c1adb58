// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Management for RabbitMQ
//!
//! This module provides the queue definition builder and the queue-to-exchange
//! binding used by the topology. A queue's declaration flags are derived from
//! its [`DurabilityClass`], and a queue may name a dead-letter exchange that
//! receives every message it discards.

/// Lifetime class of a queue.
///
/// - Durable: survives a broker restart, shared between connections, never
///   auto-deleted.
/// - Transient: exclusive to the declaring connection and deleted with it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DurabilityClass {
    #[default]
    Durable,
    Transient,
}

/// Declaration flags computed from a [`DurabilityClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFlags {
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
}

impl DurabilityClass {
    pub fn flags(self) -> QueueFlags {
        match self {
            DurabilityClass::Durable => QueueFlags {
                durable: true,
                exclusive: false,
                auto_delete: false,
            },
            DurabilityClass::Transient => QueueFlags {
                durable: false,
                exclusive: true,
                auto_delete: true,
            },
        }
    }
}

/// Definition of a RabbitMQ queue with its configuration parameters.
///
/// This struct implements the builder pattern to create and configure queue
/// definitions.
#[derive(Debug, Clone, Default)]
pub struct QueueDefinition {
    pub(crate) name: String,
    pub(crate) durability: DurabilityClass,
    pub(crate) dead_letter_exchange: Option<String>,
}

impl QueueDefinition {
    /// Creates a new durable queue definition with the given name and no
    /// dead-letter exchange.
    pub fn new(name: &str) -> QueueDefinition {
        QueueDefinition {
            name: name.to_owned(),
            durability: DurabilityClass::Durable,
            dead_letter_exchange: None,
        }
    }

    /// Sets the durability class the queue is declared with.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn durability(mut self, durability: DurabilityClass) -> Self {
        self.durability = durability;
        self
    }

    /// Routes messages rejected without requeue to `exchange`.
    ///
    /// # Parameters
    /// * `exchange` - Name of the dead-letter exchange
    ///
    /// # Returns
    /// Self for method chaining
    pub fn dead_letter_exchange(mut self, exchange: &str) -> Self {
        self.dead_letter_exchange = Some(exchange.to_owned());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Configuration for binding a queue to an exchange.
///
/// Queue bindings define how messages flow from exchanges to queues based on
/// routing keys and exchange types.
#[derive(Debug, Clone)]
pub struct QueueBinding<'qeb> {
    pub(crate) queue_name: &'qeb str,
    pub(crate) exchange_name: &'qeb str,
    pub(crate) routing_key: &'qeb str,
}

impl<'qeb> QueueBinding<'qeb> {
    /// Creates a new queue binding for the given queue.
    ///
    /// By default, the exchange name and routing key are empty strings.
    /// These should be set using the `exchange` and `routing_key` methods.
    pub fn new(queue: &'qeb str) -> QueueBinding<'qeb> {
        QueueBinding {
            queue_name: queue,
            exchange_name: "",
            routing_key: "",
        }
    }

    /// Sets the exchange to bind the queue to.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn exchange(mut self, exchange: &'qeb str) -> Self {
        self.exchange_name = exchange;
        self
    }

    /// Sets the routing key for the binding.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn routing_key(mut self, key: &'qeb str) -> Self {
        self.routing_key = key;
        self
    }
}
